use crate::error::{Ca2TfError, Result};
use crate::terraform::naming::NamingPolicy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const ACCESS_TOKEN_ENV: &str = "CA2TF_ACCESS_TOKEN";
pub const CLIENT_SECRET_ENV: &str = "CA2TF_CLIENT_SECRET";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory receiving data.tf, one .tf per policy, and Terraform state
    pub output_dir: PathBuf,

    pub graph_base_url: String,

    /// Terraform executable, resolved through PATH when not absolute
    pub terraform_path: String,

    pub naming: NamingPolicy,

    /// Write providers.tf with the azuread requirement if it is missing
    pub write_provider_block: bool,

    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated"),
            graph_base_url: DEFAULT_GRAPH_BASE.to_string(),
            terraform_path: "terraform".to_string(),
            naming: NamingPolicy::default(),
            write_provider_block: true,
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Apply values that may come from the environment
    pub fn apply_env_overrides(&mut self, access_token: Option<String>, client_secret: Option<String>) {
        if let Some(token) = access_token.filter(|t| !t.trim().is_empty()) {
            self.auth.method = AuthMethod::Token;
            self.auth.access_token = Some(token);
        }
        if let Some(secret) = client_secret.filter(|s| !s.trim().is_empty()) {
            self.auth.client_secret = Some(secret);
        }
    }
}

/// Credential settings for the Graph API
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub method: AuthMethod,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Only ever populated from the environment
    #[serde(skip)]
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    #[default]
    AzureCli,
    ClientCredentials,
    Token,
}

/// Token cache structure
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub tenant_id: String,
    /// App registration the token was issued to
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Configuration manager
#[derive(Clone, Debug)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "ca2tf", "ca2tf").ok_or_else(|| {
            Ca2TfError::ConfigError("Failed to determine config directory".into())
        })?;

        Ok(Self::with_dir(project_dirs.config_dir()))
    }

    /// Use an explicit directory instead of the platform default
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn token_cache_file(&self, tenant_id: &str) -> PathBuf {
        self.config_dir
            .join("cache")
            .join(format!("{}.token", tenant_id))
    }

    /// Load main config, from `path` when given, else from the config directory.
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load_config(&self, path: Option<&Path>) -> Result<Config> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(Ca2TfError::ConfigError(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => {
                let default_path = self.config_file();
                if !default_path.exists() {
                    return Ok(Config::default());
                }
                default_path
            }
        };

        let contents = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Save token cache
    pub fn save_token(&self, token: &TokenCache) -> Result<()> {
        let cache_dir = self.config_dir.join("cache");
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        let contents = serde_json::to_string_pretty(token)?;
        let token_path = self.token_cache_file(&token.tenant_id);

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&token_path)?;
        file.write_all(contents.as_bytes())?;

        // mode() only applies on creation; tighten an older cache file too
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&token_path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Load a cached token that is still valid and was issued to `client_id`
    pub fn load_token(&self, tenant_id: &str, client_id: &str) -> Result<Option<TokenCache>> {
        let token_path = self.token_cache_file(tenant_id);

        if !token_path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(token_path)?;
        let token: TokenCache = serde_json::from_str(&contents)?;

        if token.client_id.as_deref() != Some(client_id) {
            tracing::debug!("Cached token for tenant {} belongs to another client", tenant_id);
            return Ok(None);
        }

        if token.expires_at <= chrono::Utc::now() {
            tracing::debug!("Cached token for tenant {} has expired", tenant_id);
            return Ok(None);
        }

        Ok(Some(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_default_config_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path());
        let config = manager.load_config(None).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("generated"));
        assert_eq!(config.graph_base_url, DEFAULT_GRAPH_BASE);
        assert_eq!(config.naming, NamingPolicy::Strict);
        assert_eq!(config.auth.method, AuthMethod::AzureCli);
        assert!(config.write_provider_block);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path());
        let err = manager
            .load_config(Some(&dir.path().join("nope.toml")))
            .unwrap_err();
        assert!(matches!(err, Ca2TfError::ConfigError(_)));
    }

    #[test]
    fn test_partial_config_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            r#"
output_dir = "tf"
naming = "sanitize"

[auth]
method = "client-credentials"
tenant_id = "contoso"
client_id = "app-1"
"#,
        )
        .unwrap();

        let config = ConfigManager::with_dir(dir.path())
            .load_config(Some(&path))
            .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("tf"));
        assert_eq!(config.naming, NamingPolicy::Sanitize);
        assert_eq!(config.auth.method, AuthMethod::ClientCredentials);
        assert_eq!(config.auth.client_id.as_deref(), Some("app-1"));
        assert_eq!(config.terraform_path, "terraform");
    }

    #[test]
    fn test_env_token_forces_token_method() {
        let mut config = Config::default();
        config.apply_env_overrides(Some("eyJ0eXAi".into()), None);
        assert_eq!(config.auth.method, AuthMethod::Token);
        assert_eq!(config.auth.access_token.as_deref(), Some("eyJ0eXAi"));

        let mut untouched = Config::default();
        untouched.apply_env_overrides(Some("  ".into()), None);
        assert_eq!(untouched.auth.method, AuthMethod::AzureCli);
    }

    #[test]
    fn test_token_cache_roundtrip_and_expiry() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path());

        let fresh = TokenCache {
            access_token: "abc".into(),
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(30),
            tenant_id: "contoso".into(),
            client_id: Some("app-1".into()),
        };
        manager.save_token(&fresh).unwrap();
        let loaded = manager.load_token("contoso", "app-1").unwrap().unwrap();
        assert_eq!(loaded.access_token, "abc");

        let stale = TokenCache {
            access_token: "old".into(),
            expires_at: chrono::Utc::now() - chrono::Duration::minutes(1),
            tenant_id: "fabrikam".into(),
            client_id: Some("app-1".into()),
        };
        manager.save_token(&stale).unwrap();
        assert!(manager.load_token("fabrikam", "app-1").unwrap().is_none());
        assert!(manager.load_token("unknown", "app-1").unwrap().is_none());
    }

    #[test]
    fn test_token_cache_is_per_client() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path());
        manager
            .save_token(&TokenCache {
                access_token: "issued-to-a".into(),
                expires_at: chrono::Utc::now() + chrono::Duration::minutes(30),
                tenant_id: "contoso".into(),
                client_id: Some("client-a".into()),
            })
            .unwrap();

        assert!(manager.load_token("contoso", "client-b").unwrap().is_none());
        assert!(manager.load_token("contoso", "client-a").unwrap().is_some());
    }

    #[test]
    fn test_cache_without_client_is_ignored() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path());
        let path = manager.token_cache_file("contoso");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let expires = chrono::Utc::now() + chrono::Duration::minutes(30);
        fs::write(
            &path,
            format!(
                r#"{{"access_token":"legacy","expires_at":"{}","tenant_id":"contoso"}}"#,
                expires.to_rfc3339()
            ),
        )
        .unwrap();

        assert!(manager.load_token("contoso", "client-a").unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_token_cache_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path());
        let path = manager.token_cache_file("contoso");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        manager
            .save_token(&TokenCache {
                access_token: "secret".into(),
                expires_at: chrono::Utc::now() + chrono::Duration::minutes(30),
                tenant_id: "contoso".into(),
                client_id: Some("client-a".into()),
            })
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
