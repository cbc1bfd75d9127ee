//! Configuration loading for the Alien Portal client.
//!
//! All fields are required. No defaults.

use alien_core::AccessPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "ALIEN_PORTAL_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub storage_dir: PathBuf,
    pub log_filter: String,
    pub log_format: LogFormat,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    pub internal_domains: Vec<String>,
    pub partner_domains: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or ALIEN_PORTAL_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl PortalConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage_dir",
                reason: "must not be empty".to_string(),
            });
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_filter",
                reason: "must not be empty".to_string(),
            });
        }
        validate_domains("access.internal_domains", &self.access.internal_domains)?;
        validate_domains("access.partner_domains", &self.access.partner_domains)?;
        Ok(())
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(
            self.access.internal_domains.iter().cloned(),
            self.access.partner_domains.iter().cloned(),
        )
    }
}

fn validate_domains(field: &'static str, domains: &[String]) -> Result<(), ConfigError> {
    if domains.is_empty() {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must list at least one domain".to_string(),
        });
    }
    for domain in domains {
        if domain.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field,
                reason: "domains must not be empty".to_string(),
            });
        }
        if domain.contains('@') {
            return Err(ConfigError::InvalidValue {
                field,
                reason: format!("'{}' must be a bare domain without '@'", domain),
            });
        }
    }
    Ok(())
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
api_base_url = "http://localhost:5001/api"
request_timeout_ms = 5000
storage_dir = "/tmp/alien-portal"
log_filter = "alien_client=info"
log_format = "pretty"

[access]
internal_domains = ["flyrank.com", "powercommerce.com"]
partner_domains = ["shopline.com"]
"#;

    #[test]
    fn parses_and_validates_a_complete_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();

        let config = PortalConfig::from_path(file.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.access_policy().is_partner_domain("shopline.com"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let contents = VALID.replace("[access]", "theme = \"dark\"\n\n[access]");
        assert!(matches!(PortalConfig::from_toml(&contents), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let config = PortalConfig::from_toml(&VALID.replace("5000", "0")).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "request_timeout_ms", .. })
        ));
    }

    #[test]
    fn domains_with_at_sign_are_invalid() {
        let contents = VALID.replace("\"shopline.com\"", "\"@shopline.com\"");
        let config = PortalConfig::from_toml(&contents).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "access.partner_domains", .. })
        ));
    }

    #[test]
    fn empty_domain_list_is_invalid() {
        let config = PortalConfig::from_toml(&VALID.replace("[\"shopline.com\"]", "[]")).unwrap();
        assert!(config.validate().is_err());
    }

    fn with_partner_domain(domain: &str) -> PortalConfig {
        let mut config = PortalConfig::from_toml(VALID).unwrap();
        config.access.partner_domains = vec![domain.to_string()];
        config
    }

    proptest::proptest! {
        #[test]
        fn bare_domains_validate(domain in "[a-z]{1,12}(\\.[a-z]{2,6}){1,2}") {
            proptest::prop_assert!(with_partner_domain(&domain).validate().is_ok());
        }

        #[test]
        fn any_domain_with_an_at_sign_is_rejected(
            local in "[a-z]{0,8}",
            domain in "[a-z]{1,12}\\.[a-z]{2,6}",
        ) {
            let config = with_partner_domain(&format!("{}@{}", local, domain));
            let rejected = matches!(
                config.validate(),
                Err(ConfigError::InvalidValue { field: "access.partner_domains", .. })
            );
            proptest::prop_assert!(rejected);
        }

        #[test]
        fn non_http_urls_are_rejected(scheme in "(ftp|ws|file)", host in "[a-z]{1,10}") {
            let mut config = PortalConfig::from_toml(VALID).unwrap();
            config.api_base_url = format!("{}://{}", scheme, host);
            let rejected = matches!(
                config.validate(),
                Err(ConfigError::InvalidValue { field: "api_base_url", .. })
            );
            proptest::prop_assert!(rejected);
        }
    }
}
