//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The fallback API key is loaded from the STUDIO_API_KEY env var or
//! api_key_file, never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    /// Path to the JSON pool file. Keys submitted via the admin API are
    /// persisted here and reloaded on startup.
    #[serde(default)]
    pub pools_file: Option<PathBuf>,
    /// Fallback credential used only when both pools are empty.
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
    /// Path to a file containing the fallback key (alternative to STUDIO_API_KEY).
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    #[serde(default)]
    pub on_cleanup_failure: CleanupPolicy,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Upstream generative provider settings
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Inter-call delays for standard keys, per tier
#[derive(Debug, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_free_delay_ms")]
    pub free_delay_ms: u64,
    #[serde(default = "default_paid_delay_ms")]
    pub paid_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            free_delay_ms: default_free_delay_ms(),
            paid_delay_ms: default_paid_delay_ms(),
        }
    }
}

/// What to do when the background cleanup step fails mid-workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Surface the failure to the client.
    #[default]
    Propagate,
    /// Degrade: hand the untouched input image back instead of an error.
    ReturnOriginal,
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

fn default_primary_model() -> String {
    "image-preview-pro".into()
}

fn default_fallback_model() -> String {
    "image-preview-flash".into()
}

fn default_free_delay_ms() -> u64 {
    2000
}

fn default_paid_delay_ms() -> u64 {
    600
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Fallback key resolution order:
    /// 1. STUDIO_API_KEY env var
    /// 2. api_key_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.provider.base_url.starts_with("http://")
            && !config.provider.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.provider.base_url
            )));
        }

        if config.provider.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Paid keys must never be paced slower than free ones
        if config.pacing.paid_delay_ms > config.pacing.free_delay_ms {
            return Err(common::Error::Config(format!(
                "paid_delay_ms ({}) must not exceed free_delay_ms ({})",
                config.pacing.paid_delay_ms, config.pacing.free_delay_ms
            )));
        }

        // Resolve fallback key: env var takes precedence over file
        if let Ok(key) = std::env::var("STUDIO_API_KEY") {
            config.api_key = Some(Secret::new(key));
        } else if let Some(ref key_file) = config.api_key_file {
            let key = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read api_key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.api_key = Some(Secret::new(key));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("studio-relay.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
[server]
listen_addr = "127.0.0.1:8080"

[provider]
base_url = "https://generativelanguage.example.com"
"#
    }

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_valid_config_applies_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), valid_toml());

        unsafe { remove_env("STUDIO_API_KEY") };

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.provider.timeout_secs, 60);
        assert_eq!(config.provider.primary_model, "image-preview-pro");
        assert_eq!(config.provider.fallback_model, "image-preview-flash");
        assert_eq!(config.pacing.free_delay_ms, 2000);
        assert_eq!(config.pacing.paid_delay_ms, 600);
        assert_eq!(config.on_cleanup_failure, CleanupPolicy::Propagate);
        assert!(config.api_key.is_none());
        assert!(config.pools_file.is_none());
    }

    #[test]
    fn load_missing_file_errors() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn api_key_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), valid_toml());

        unsafe { set_env("STUDIO_API_KEY", "env-key-123") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_key.as_ref().unwrap().expose(), "env-key-123");
        unsafe { remove_env("STUDIO_API_KEY") };
    }

    #[test]
    fn api_key_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("api_key");
        std::fs::write(&key_path, "file-key-456\n").unwrap();

        let toml_content = format!(
            r#"
api_key_file = "{}"

[server]
listen_addr = "127.0.0.1:8080"

[provider]
base_url = "https://generativelanguage.example.com"
"#,
            key_path.display()
        );
        let path = write_config(dir.path(), &toml_content);

        unsafe { remove_env("STUDIO_API_KEY") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_key.as_ref().unwrap().expose(), "file-key-456");
    }

    #[test]
    fn api_key_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("api_key");
        std::fs::write(&key_path, "file-value").unwrap();

        let toml_content = format!(
            r#"
api_key_file = "{}"

[server]
listen_addr = "127.0.0.1:8080"

[provider]
base_url = "https://generativelanguage.example.com"
"#,
            key_path.display()
        );
        let path = write_config(dir.path(), &toml_content);

        unsafe { set_env("STUDIO_API_KEY", "env-value") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_key.as_ref().unwrap().expose(), "env-value");
        unsafe { remove_env("STUDIO_API_KEY") };
    }

    #[test]
    fn whitespace_only_key_file_yields_none() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("api_key");
        std::fs::write(&key_path, "  \n  ").unwrap();

        let toml_content = format!(
            r#"
api_key_file = "{}"

[server]
listen_addr = "127.0.0.1:8080"

[provider]
base_url = "https://generativelanguage.example.com"
"#,
            key_path.display()
        );
        let path = write_config(dir.path(), &toml_content);

        unsafe { remove_env("STUDIO_API_KEY") };
        let config = Config::load(&path).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn invalid_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[provider]
base_url = "generativelanguage.example.com"
"#,
        );
        unsafe { remove_env("STUDIO_API_KEY") };

        let result = Config::load(&path);
        assert!(result.is_err());
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("base_url must start with http"), "got: {err}");
    }

    #[test]
    fn zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[provider]
base_url = "https://generativelanguage.example.com"
timeout_secs = 0
"#,
        );
        unsafe { remove_env("STUDIO_API_KEY") };

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn paid_slower_than_free_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[provider]
base_url = "https://generativelanguage.example.com"

[pacing]
free_delay_ms = 500
paid_delay_ms = 900
"#,
        );
        unsafe { remove_env("STUDIO_API_KEY") };

        let result = Config::load(&path);
        assert!(result.is_err());
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("paid_delay_ms"), "got: {err}");
    }

    #[test]
    fn cleanup_policy_return_original_parses() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
on_cleanup_failure = "return-original"

[server]
listen_addr = "127.0.0.1:8080"

[provider]
base_url = "https://generativelanguage.example.com"
"#,
        );
        unsafe { remove_env("STUDIO_API_KEY") };

        let config = Config::load(&path).unwrap();
        assert_eq!(config.on_cleanup_failure, CleanupPolicy::ReturnOriginal);
    }

    #[test]
    fn resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("studio-relay.toml"));
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }
}
