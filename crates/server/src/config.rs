use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Lifetimes (in seconds) of everything the authorization server mints.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TokenLifetimes {
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    #[serde(default = "default_authorization_code_lifetime")]
    pub authorization_code_lifetime: i64,
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
    #[serde(default = "default_client_secret_lifetime")]
    pub client_secret_lifetime: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_token_lifetime: default_access_token_lifetime(),
            authorization_code_lifetime: default_authorization_code_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
            client_secret_lifetime: default_client_secret_lifetime(),
        }
    }
}

fn default_access_token_lifetime() -> i64 {
    3600 // 1 hour
}

fn default_authorization_code_lifetime() -> i64 {
    600 // 10 minutes
}

fn default_refresh_token_lifetime() -> i64 {
    86400 * 30 // 30 days
}

fn default_client_secret_lifetime() -> i64 {
    86400 * 365 // 1 year
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Public base URL of this server, used as the `iss` of access tokens
    /// and to build the metadata document.
    pub issuer_url: String,
    /// HMAC key for access tokens. Must be at least 32 bytes.
    pub token_signing_secret: String,
    #[serde(default)]
    pub tokens: TokenLifetimes,
    /// Seconds between sweeps of expired codes and refresh tokens. 0 disables the sweep.
    #[serde(default = "default_compaction_interval")]
    pub compaction_interval_secs: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_compaction_interval() -> u64 {
    300
}

impl AppConfig {
    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_signing_secret.len() < 32 {
            return Err(ConfigError::Validation(
                "token_signing_secret must be at least 32 bytes".into(),
            ));
        }
        if url::Url::parse(&self.issuer_url).is_err() {
            return Err(ConfigError::Validation(format!(
                "issuer_url is not an absolute URL: {}",
                self.issuer_url
            )));
        }
        let lifetimes = [
            ("access_token_lifetime", self.tokens.access_token_lifetime),
            (
                "authorization_code_lifetime",
                self.tokens.authorization_code_lifetime,
            ),
            ("refresh_token_lifetime", self.tokens.refresh_token_lifetime),
            ("client_secret_lifetime", self.tokens.client_secret_lifetime),
        ];
        for (name, value) in lifetimes {
            if value <= 0 {
                return Err(ConfigError::Validation(format!(
                    "tokens.{name} must be > 0"
                )));
            }
        }
        Ok(())
    }

    /// Issuer URL without a trailing slash, for building endpoint URLs.
    pub fn issuer_base(&self) -> &str {
        self.issuer_url.trim_end_matches('/')
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// The file is optional. Any environment variable matching the key path separated by
/// double underscores (e.g. `TOKENS__ACCESS_TOKEN_LIFETIME`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_yaml(yaml: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = from_yaml(
            r#"
issuer_url: "https://auth.example.org"
token_signing_secret: "0123456789abcdef0123456789abcdef"
"#,
        );
        assert_eq!(cfg.bind_address, "0.0.0.0:8080");
        assert_eq!(cfg.tokens, TokenLifetimes::default());
        assert_eq!(cfg.tokens.authorization_code_lifetime, 600);
        assert_eq!(cfg.tokens.refresh_token_lifetime, 2_592_000);
        assert_eq!(cfg.compaction_interval_secs, 300);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn short_secret_is_rejected() {
        let cfg = from_yaml(
            r#"
issuer_url: "https://auth.example.org"
token_signing_secret: "too-short"
"#,
        );
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn relative_issuer_is_rejected() {
        let cfg = from_yaml(
            r#"
issuer_url: "/auth"
token_signing_secret: "0123456789abcdef0123456789abcdef"
"#,
        );
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn non_positive_lifetime_is_rejected() {
        let cfg = from_yaml(
            r#"
issuer_url: "https://auth.example.org"
token_signing_secret: "0123456789abcdef0123456789abcdef"
tokens:
  access_token_lifetime: 0
"#,
        );
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("access_token_lifetime"));
    }

    #[test]
    fn issuer_base_strips_trailing_slash() {
        let cfg = from_yaml(
            r#"
issuer_url: "https://auth.example.org/"
token_signing_secret: "0123456789abcdef0123456789abcdef"
"#,
        );
        assert_eq!(cfg.issuer_base(), "https://auth.example.org");
    }
}
