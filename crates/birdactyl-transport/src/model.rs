//! Panel resource models returned by the panel API.
//!
//! Every field defaults when absent so older panels that omit a field still
//! decode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub node_id: String,
    pub status: String,
    pub suspended: bool,
    pub memory: i32,
    pub cpu: i32,
    pub disk: i32,
    pub package_id: String,
    pub primary_allocation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStats {
    pub memory_bytes: i64,
    pub memory_limit: i64,
    pub cpu_percent: f64,
    pub disk_bytes: i64,
    pub network_rx: i64,
    pub network_tx: i64,
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_banned: bool,
    pub force_password_reset: bool,
    pub ram_limit: i32,
    pub cpu_limit: i32,
    pub disk_limit: i32,
    pub server_limit: i32,
    pub created_at: String,
}

/// Per-user resource caps. `None` leaves the current limit unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_limit: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_limit: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_limit: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub fqdn: String,
    pub port: i32,
    pub is_online: bool,
    pub last_heartbeat: String,
}

/// A freshly created node together with its one-time daemon token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeWithToken {
    pub node: Node,
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct File {
    pub name: String,
    pub size: i64,
    pub is_dir: bool,
    pub mod_time: String,
    pub mime: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseHost {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub username: String,
    pub max_databases: i32,
    pub databases_count: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backup {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub description: String,
    pub docker_image: String,
    pub startup_command: String,
    pub stop_command: String,
    pub config_files: String,
    pub default_memory: i32,
    pub default_cpu: i32,
    pub default_disk: i32,
    pub is_public: bool,
}

/// Fields accepted when creating a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPackage {
    pub name: String,
    pub description: String,
    pub docker_image: String,
    pub startup_command: String,
    pub stop_command: String,
    pub config_files: String,
    pub default_memory: i32,
    pub default_cpu: i32,
    pub default_disk: i32,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpBan {
    pub id: String,
    pub ip: String,
    pub reason: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subuser {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub registration_enabled: bool,
    pub server_creation_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityLog {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub action: String,
    pub description: String,
    pub ip: String,
    pub is_admin: bool,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_default() {
        let server: Server = serde_json::from_value(json!({ "id": "s1", "suspended": true })).unwrap();
        assert_eq!(server.id, "s1");
        assert!(server.suspended);
        assert_eq!(server.memory, 0);
        assert!(server.name.is_empty());
    }

    #[test]
    fn test_resource_limits_skip_unset() {
        let limits = ResourceLimits {
            ram_limit: Some(2048),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(limits).unwrap(), json!({ "ram_limit": 2048 }));
    }
}
