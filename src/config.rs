use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SpinupError, SpinupResult};
use crate::model::{ResourceRef, parse_key_list};

pub const DEFAULT_API_URL: &str = "https://api.digitalocean.com/v2";
pub const DEFAULT_REGION: &str = "nyc1";
pub const DEFAULT_IMAGE: &str = "ubuntu-24-10-x64";

/// Identity used to issue the certificate and log in to the new
/// instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslIdentity {
    pub email: String,
    pub user: String,
    pub private_key: PathBuf,
    pub passphrase: Option<String>,
}

/// Poll intervals and deadlines for the provisioning workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub active_interval: Duration,
    pub active_deadline: Duration,
    pub network_interval: Duration,
    pub network_attempts: u32,
    pub network_port: u16,
    pub probe_timeout: Duration,
    pub dns_interval: Duration,
    pub dns_deadline: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            active_interval: Duration::from_secs(5),
            active_deadline: Duration::from_secs(600),
            network_interval: Duration::from_secs(1),
            network_attempts: 30,
            network_port: 80,
            probe_timeout: Duration::from_secs(1),
            dns_interval: Duration::from_secs(10),
            dns_deadline: Duration::from_secs(600),
        }
    }
}

/// Everything the tool needs to know, built once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub api_url: String,
    pub region: String,
    pub snapshot: Option<String>,
    pub firewall: Option<String>,
    pub domain: Option<String>,
    pub ssh_keys: Vec<ResourceRef>,
    pub ssl: Option<SslIdentity>,
    pub development: bool,
    pub delete_dns_on_teardown: bool,
    pub timeouts: Timeouts,
}

impl Config {
    /// Minimal config for library use: only the token is set.
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            region: DEFAULT_REGION.to_string(),
            snapshot: None,
            firewall: None,
            domain: None,
            ssh_keys: Vec::new(),
            ssl: None,
            development: false,
            delete_dns_on_teardown: false,
            timeouts: Timeouts::default(),
        }
    }

    /// Load from the process environment, falling back to a
    /// dotenv-style file. When `env_file` is `None`, `./.env` is
    /// used if it exists.
    pub fn load(env_file: Option<&Path>) -> SpinupResult<Self> {
        let file_values = match env_file {
            Some(path) if !path.exists() => {
                return Err(SpinupError::FileNotFound(path.display().to_string()));
            }
            Some(path) => read_env_file(path)?,
            None => {
                let default = Path::new(".env");
                if default.exists() {
                    read_env_file(default)?
                } else {
                    HashMap::new()
                }
            }
        };

        let home = std::env::var("HOME").ok();
        Self::from_lookup(
            |key| std::env::var(key).ok().or_else(|| file_values.get(key).cloned()),
            home.as_deref(),
        )
    }

    /// Build from an arbitrary key lookup. Blank values count as
    /// absent.
    pub fn from_lookup<F>(lookup: F, home: Option<&str>) -> SpinupResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let token = get("DIGITAL_OCEAN_ACCESS_TOKEN")
            .ok_or_else(|| SpinupError::MissingConfig("DIGITAL_OCEAN_ACCESS_TOKEN".into()))?;

        let ssl = match (
            get("SSL_SIGNING_EMAIL"),
            get("SSL_USER"),
            get("SSL_PRIVATE_KEY_PATH"),
        ) {
            (Some(email), Some(user), Some(key)) => Some(SslIdentity {
                email,
                user,
                private_key: expand_home(&key, home),
                passphrase: get("SSL_PRIVATE_KEY_PASSWORD"),
            }),
            _ => None,
        };

        Ok(Self {
            token,
            api_url: get("DIGITAL_OCEAN_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            region: get("DIGITAL_OCEAN_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            snapshot: get("DIGITAL_OCEAN_SNAPSHOT"),
            firewall: get("DIGITAL_OCEAN_FIREWALL"),
            domain: get("DIGITAL_OCEAN_DOMAIN"),
            ssh_keys: get("DIGITAL_OCEAN_SSH_KEYS")
                .map(|raw| parse_key_list(&raw))
                .unwrap_or_default(),
            ssl,
            development: get("ENV").is_some_and(|v| v == "development"),
            delete_dns_on_teardown: get("SPINUP_DELETE_DNS_ON_TEARDOWN")
                .is_some_and(|v| is_truthy(&v)),
            timeouts: Timeouts::default(),
        })
    }

    /// The configured root domain, or a precondition error.
    pub fn require_domain(&self) -> SpinupResult<&str> {
        self.domain
            .as_deref()
            .ok_or_else(|| SpinupError::MissingConfig("DIGITAL_OCEAN_DOMAIN".into()))
    }

    /// The configured firewall name, or a precondition error.
    pub fn require_firewall(&self) -> SpinupResult<&str> {
        self.firewall
            .as_deref()
            .ok_or_else(|| SpinupError::MissingConfig("DIGITAL_OCEAN_FIREWALL".into()))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Replace a leading `~` with the home directory.
#[must_use]
pub fn expand_home(path: &str, home: Option<&str>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => PathBuf::from(format!("{home}{rest}")),
        _ => PathBuf::from(path),
    }
}

/// Read the `KEY=VALUE` pairs of a dotenv-style file without
/// touching the process environment.
pub fn read_env_file(path: &Path) -> SpinupResult<HashMap<String, String>> {
    let values = dotenvy::from_path_iter(path)?.collect::<Result<HashMap<_, _>, _>>()?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde() {
        assert_eq!(
            expand_home("~/.ssh/id_ed25519", Some("/home/ops")),
            PathBuf::from("/home/ops/.ssh/id_ed25519")
        );
    }

    #[test]
    fn expand_without_home_is_literal() {
        assert_eq!(expand_home("~/.ssh/key", None), PathBuf::from("~/.ssh/key"));
        assert_eq!(
            expand_home("/etc/key", Some("/home/ops")),
            PathBuf::from("/etc/key")
        );
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("1"));
        assert!(!is_truthy("no"));
    }
}
