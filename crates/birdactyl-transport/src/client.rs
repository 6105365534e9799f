//! Outbound panel API client.
//!
//! Every call is a `POST {panel}/plugin-api/{method}` with a JSON parameter
//! object and the `x-plugin-id` header. The response body is the JSON
//! result; an empty body or `null` decodes as unit (or `None`).
//!
//! Two front ends share one catalog:
//!
//! | Client | Use from |
//! |--------|----------|
//! | [`PanelClient`] | async code (startup tasks, console consumers) |
//! | [`BlockingPanelClient`] | handler bodies, which run on the blocking pool |
//!
//! ```rust,ignore
//! let panel = PanelClient::new("http://localhost:50050", "my-plugin", Duration::from_secs(30))?;
//! let servers = panel.list_servers().await?;
//! panel.send_command(&servers[0].id, "say hello").await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::model::{
    ActivityLog, Backup, Database, DatabaseHost, File, IpBan, NewPackage, Node, NodeWithToken,
    Package, ResourceLimits, Server, ServerStats, Settings, Subuser, User,
};

/// Header identifying the calling plugin on every panel request.
pub const PLUGIN_ID_HEADER: &str = "x-plugin-id";

/// Path segment under which the panel exposes its plugin API.
pub const API_PREFIX: &str = "plugin-api";

// =============================================================================
// PanelClient
// =============================================================================

/// Async client for the panel API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct PanelClient {
    http: Client,
    base: String,
    plugin_id: String,
    timeout: Duration,
}

impl PanelClient {
    /// Creates a client for the panel at `address`.
    ///
    /// `timeout` bounds each API call. Console streams are not bounded by it.
    pub fn new(address: &str, plugin_id: &str, timeout: Duration) -> TransportResult<Self> {
        let http = ClientBuilder::new().connect_timeout(timeout).build()?;
        Ok(Self {
            http,
            base: address.trim_end_matches('/').to_string(),
            plugin_id: plugin_id.to_string(),
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.base
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Starts a request for `method` carrying the plugin header.
    pub(crate) fn request(&self, method: &str) -> RequestBuilder {
        self.http
            .post(format!("{}/{API_PREFIX}/{method}", self.base))
            .header(PLUGIN_ID_HEADER, &self.plugin_id)
    }

    /// Calls an arbitrary panel API method.
    ///
    /// # Errors
    /// [`TransportError::Status`] for non-2xx answers, [`TransportError::Decode`]
    /// when the body does not match `T`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> TransportResult<T> {
        debug!(method = %method, "Calling panel API");

        let resp = self
            .request(method)
            .timeout(self.timeout)
            .json(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::status(status.as_u16(), body));
        }

        let bytes = resp.bytes().await?;
        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &bytes
        };
        serde_json::from_slice(body).map_err(|e| TransportError::decode(method, e))
    }

    /// Reads a file from a server's volume.
    pub async fn read_file(&self, server_id: &str, path: &str) -> TransportResult<Vec<u8>> {
        let content: FileContent = self
            .call("read_file", json!({ "server_id": server_id, "path": path }))
            .await?;
        STANDARD
            .decode(content.content.as_bytes())
            .map_err(|e| TransportError::decode("read_file", serde::de::Error::custom(e)))
    }

    /// Writes a file to a server's volume, replacing it if present.
    pub async fn write_file(&self, server_id: &str, path: &str, content: &[u8]) -> TransportResult<()> {
        self.call(
            "write_file",
            json!({ "server_id": server_id, "path": path, "content": STANDARD.encode(content) }),
        )
        .await
    }
}

#[derive(Deserialize)]
struct FileContent {
    #[serde(default)]
    content: String,
}

// =============================================================================
// BlockingPanelClient
// =============================================================================

/// Blocking front end over [`PanelClient`].
///
/// Methods must be called from a blocking context such as a handler body or
/// a `spawn_blocking` task; calling them on an async worker thread panics.
#[derive(Debug, Clone)]
pub struct BlockingPanelClient {
    inner: PanelClient,
    handle: Handle,
}

impl BlockingPanelClient {
    pub fn new(inner: PanelClient, handle: Handle) -> Self {
        Self { inner, handle }
    }

    /// The async client this one drives.
    pub fn as_async(&self) -> &PanelClient {
        &self.inner
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    pub fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> TransportResult<T> {
        self.block_on(self.inner.call(method, params))
    }

    pub fn read_file(&self, server_id: &str, path: &str) -> TransportResult<Vec<u8>> {
        self.block_on(self.inner.read_file(server_id, path))
    }

    pub fn write_file(&self, server_id: &str, path: &str, content: &[u8]) -> TransportResult<()> {
        self.block_on(self.inner.write_file(server_id, path, content))
    }
}

// =============================================================================
// API catalog
// =============================================================================

/// Declares panel API methods on both clients.
///
/// Each entry is `name(args) [-> Ret];`. The wire method is the entry name
/// and the parameters are sent as an object keyed by argument name.
macro_rules! panel_api {
    (@ret) => { () };
    (@ret $ret:ty) => { $ret };
    ($(
        $(#[$meta:meta])*
        $name:ident($($arg:ident: $typ:ty),* $(,)?) $(-> $ret:ty)?;
    )*) => {
        impl PanelClient {
            $(
                $(#[$meta])*
                pub async fn $name(&self, $($arg: $typ),*) -> TransportResult<panel_api!(@ret $($ret)?)> {
                    self.call(stringify!($name), json!({ $(stringify!($arg): $arg),* })).await
                }
            )*
        }

        impl BlockingPanelClient {
            $(
                $(#[$meta])*
                pub fn $name(&self, $($arg: $typ),*) -> TransportResult<panel_api!(@ret $($ret)?)> {
                    self.block_on(self.inner.$name($($arg),*))
                }
            )*
        }
    };
}

panel_api! {
    /// Writes a line to the panel's plugin log.
    log(level: &str, message: &str);

    // ─── Servers ─────────────────────────────────────────────────────────────
    get_server(id: &str) -> Server;
    list_servers() -> Vec<Server>;
    list_servers_by_user(user_id: &str) -> Vec<Server>;
    create_server(
        name: &str,
        user_id: &str,
        node_id: &str,
        package_id: &str,
        memory: i32,
        cpu: i32,
        disk: i32,
    ) -> Server;
    /// Updates a server. `None` fields are left unchanged.
    update_server(
        id: &str,
        name: Option<&str>,
        memory: Option<i32>,
        cpu: Option<i32>,
        disk: Option<i32>,
    ) -> Server;
    delete_server(id: &str);
    start_server(id: &str);
    stop_server(id: &str);
    restart_server(id: &str);
    kill_server(id: &str);
    suspend_server(id: &str);
    unsuspend_server(id: &str);
    reinstall_server(id: &str);
    transfer_server(server_id: &str, target_node_id: &str);
    /// Returns the last `lines` console lines.
    get_console_log(server_id: &str, lines: u32) -> Vec<String>;
    send_command(server_id: &str, command: &str);
    get_server_stats(server_id: &str) -> ServerStats;
    add_allocation(server_id: &str, port: u16);
    delete_allocation(server_id: &str, port: u16);
    set_primary_allocation(server_id: &str, port: u16);
    update_server_variables(server_id: &str, variables: &HashMap<String, String>);
    compress_files(server_id: &str, paths: &[String], destination: &str);
    decompress_file(server_id: &str, path: &str);

    // ─── Users ───────────────────────────────────────────────────────────────
    get_user(id: &str) -> User;
    get_user_by_email(email: &str) -> User;
    get_user_by_username(username: &str) -> User;
    list_users() -> Vec<User>;
    create_user(email: &str, username: &str, password: &str) -> User;
    update_user(id: &str, username: Option<&str>, email: Option<&str>) -> User;
    delete_user(id: &str);
    ban_user(id: &str);
    unban_user(id: &str);
    set_admin(id: &str);
    revoke_admin(id: &str);
    force_password_reset(id: &str);
    set_user_resources(user_id: &str, limits: ResourceLimits);

    // ─── Nodes ───────────────────────────────────────────────────────────────
    list_nodes() -> Vec<Node>;
    get_node(id: &str) -> Node;
    create_node(name: &str, fqdn: &str, port: u16) -> NodeWithToken;
    delete_node(id: &str);
    /// Issues a new daemon token and returns it.
    reset_node_token(id: &str) -> String;

    // ─── Files ───────────────────────────────────────────────────────────────
    list_files(server_id: &str, path: &str) -> Vec<File>;
    delete_file(server_id: &str, path: &str);
    create_folder(server_id: &str, path: &str);
    move_file(server_id: &str, from: &str, to: &str);
    copy_file(server_id: &str, from: &str, to: &str);

    // ─── Databases ───────────────────────────────────────────────────────────
    list_databases(server_id: &str) -> Vec<Database>;
    create_database(server_id: &str, name: &str) -> Database;
    delete_database(id: &str);
    rotate_database_password(id: &str) -> Database;
    list_database_hosts() -> Vec<DatabaseHost>;

    // ─── Backups ─────────────────────────────────────────────────────────────
    list_backups(server_id: &str) -> Vec<Backup>;
    create_backup(server_id: &str, name: &str);
    delete_backup(server_id: &str, backup_id: &str);

    // ─── Packages ────────────────────────────────────────────────────────────
    list_packages() -> Vec<Package>;
    get_package(id: &str) -> Package;
    create_package(package: &NewPackage) -> Package;
    update_package(
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        memory: Option<i32>,
        cpu: Option<i32>,
        disk: Option<i32>,
    ) -> Package;
    delete_package(id: &str);

    // ─── IP bans ─────────────────────────────────────────────────────────────
    list_ip_bans() -> Vec<IpBan>;
    create_ip_ban(ip: &str, reason: &str) -> IpBan;
    delete_ip_ban(id: &str);

    // ─── Subusers ────────────────────────────────────────────────────────────
    list_subusers(server_id: &str) -> Vec<Subuser>;
    add_subuser(server_id: &str, email: &str, permissions: &[String]) -> Subuser;
    update_subuser(server_id: &str, subuser_id: &str, permissions: &[String]);
    remove_subuser(server_id: &str, subuser_id: &str);

    // ─── Settings and activity ───────────────────────────────────────────────
    get_settings() -> Settings;
    set_registration_enabled(enabled: bool);
    set_server_creation_enabled(enabled: bool);
    get_activity_logs(limit: u32) -> Vec<ActivityLog>;

    // ─── Plugin storage ──────────────────────────────────────────────────────
    /// Reads a value from the plugin's key-value store.
    get_kv(key: &str) -> Option<String>;
    set_kv(key: &str, value: &str);
    delete_kv(key: &str);
    /// Runs a read query against the plugin's database; one object per row.
    query_db(query: &str, args: &[String]) -> Vec<Map<String, Value>>;
    /// Fires an event to every plugin subscribed to `event_type`.
    broadcast_event(event_type: &str, data: &HashMap<String, String>);
}
