//! Launch arguments.
//!
//! The panel starts a plugin as `<binary> <port> <data_root>`. Both values
//! override the loaded configuration. Each value is resolved on its own: a
//! port that fails to parse is reported and ignored while the data root is
//! still applied, and extra trailing arguments are ignored.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use clap::error::ErrorKind;

use crate::config::RuntimeConfig;

/// Command line as clap sees it, before per-field validation.
#[derive(Debug, Parser)]
#[command(about = "Birdactyl panel plugin")]
struct RawArgs {
    /// Port to serve the plugin protocol on.
    port: Option<String>,

    /// Directory under which the plugin data directory is created.
    data_root: Option<PathBuf>,

    /// Configuration file to load instead of searching.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production, or a custom name).
    #[arg(long)]
    profile: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    _rest: Vec<String>,
}

/// Resolved launch overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub port: Option<u16>,
    pub data_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub profile: Option<String>,
}

impl CliArgs {
    /// Parses the process arguments, see [`CliArgs::parse_lenient`].
    pub fn from_env_lenient() -> (Self, Option<clap::Error>) {
        Self::parse_lenient(std::env::args_os())
    }

    /// Parses `args`, keeping every value that is valid.
    ///
    /// The error, if any, is returned so it can be logged once logging is
    /// up. `--help` and `--version` print and exit as usual.
    pub fn parse_lenient<I, T>(args: I) -> (Self, Option<clap::Error>)
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let raw = match RawArgs::try_parse_from(args) {
            Ok(raw) => raw,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => return (Self::default(), Some(e)),
        };

        let (port, error) = match raw.port {
            None => (None, None),
            Some(text) => match text.parse::<u16>() {
                Ok(port) => (Some(port), None),
                Err(e) => {
                    let message = format!("invalid port {text:?}: {e}\n");
                    (None, Some(clap::Error::raw(ErrorKind::InvalidValue, message)))
                }
            },
        };

        let args = Self {
            port,
            data_root: raw.data_root,
            config: raw.config,
            profile: raw.profile,
        };
        (args, error)
    }

    /// Applies the launch overrides to `config`.
    pub fn apply(&self, config: &mut RuntimeConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(root) = &self.data_root {
            config.storage.root = Some(root.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_launch_shape() {
        let (args, err) = CliArgs::parse_lenient(["plugin", "50123", "/srv/plugins"]);
        assert!(err.is_none());

        let mut config = RuntimeConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.port, 50123);
        assert_eq!(config.storage.root, Some(PathBuf::from("/srv/plugins")));
    }

    #[test]
    fn test_no_arguments_keeps_config() {
        let (args, err) = CliArgs::parse_lenient(["plugin"]);
        assert!(err.is_none());

        let mut config = RuntimeConfig::default();
        args.apply(&mut config);
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_bad_port_keeps_data_root() {
        for port in ["abc", "70000"] {
            let (args, err) = CliArgs::parse_lenient(["plugin", port, "/srv/plugins"]);
            assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::InvalidValue));
            assert_eq!(args.port, None);
            assert_eq!(args.data_root, Some(PathBuf::from("/srv/plugins")));

            let mut config = RuntimeConfig::default();
            args.apply(&mut config);
            assert_eq!(config.server.port, RuntimeConfig::default().server.port);
            assert_eq!(config.storage.root, Some(PathBuf::from("/srv/plugins")));
        }
    }

    #[test]
    fn test_trailing_arguments_are_ignored() {
        let (args, err) =
            CliArgs::parse_lenient(["plugin", "50123", "/srv/plugins", "extra", "--verbose"]);
        assert!(err.is_none());
        assert_eq!(args.port, Some(50123));
        assert_eq!(args.data_root, Some(PathBuf::from("/srv/plugins")));
    }

    #[test]
    fn test_flags() {
        let (args, _) =
            CliArgs::parse_lenient(["plugin", "--config", "dev.toml", "--profile", "prod"]);
        assert_eq!(args.config, Some(PathBuf::from("dev.toml")));
        assert_eq!(args.profile.as_deref(), Some("prod"));
    }
}
