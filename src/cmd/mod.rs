pub mod generate;
pub mod import;
pub mod list;
pub mod progress;

use crate::config::{Config, ConfigManager, ACCESS_TOKEN_ENV, CLIENT_SECRET_ENV};
use crate::error::Result;
use crate::graph::conditional_access::{ConditionalAccessPolicy, PolicySource};
use crate::terraform::naming::NamingPolicy;
use clap::Args;
use std::env;
use std::path::{Path, PathBuf};

/// Options shared by every command that talks to a tenant
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Directory for the generated Terraform files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Rewrite names that are not valid Terraform identifiers instead of skipping them
    #[arg(long)]
    pub sanitize_names: bool,

    /// Terraform executable used for imports
    #[arg(long)]
    pub terraform: Option<String>,

    /// Tenant ID to authenticate against
    #[arg(long)]
    pub tenant: Option<String>,
}

impl RunArgs {
    /// Command line values win over config file and environment
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.sanitize_names {
            config.naming = NamingPolicy::Sanitize;
        }
        if let Some(terraform) = &self.terraform {
            config.terraform_path = terraform.clone();
        }
        if let Some(tenant) = &self.tenant {
            config.auth.tenant_id = Some(tenant.clone());
        }
    }
}

/// Resolved settings for one invocation
pub struct Session {
    pub manager: ConfigManager,
    pub config: Config,
}

/// Load config.toml, then layer environment and command line on top
pub fn load_session(config_path: Option<&Path>, args: &RunArgs) -> Result<Session> {
    let manager = ConfigManager::new()?;
    let mut config = manager.load_config(config_path)?;
    config.apply_env_overrides(env::var(ACCESS_TOKEN_ENV).ok(), env::var(CLIENT_SECRET_ENV).ok());
    args.apply(&mut config);

    tracing::debug!(
        "Output directory {}, naming {:?}, auth {:?}",
        config.output_dir.display(),
        config.naming,
        config.auth.method
    );

    Ok(Session { manager, config })
}

/// Fetch all policies behind a spinner
pub async fn fetch_policies<S: PolicySource>(source: &S) -> Result<Vec<ConditionalAccessPolicy>> {
    let spinner = progress::create_spinner("Fetching Conditional Access policies...");

    match source.fetch_policies().await {
        Ok(policies) => {
            progress::finish_spinner_success(
                &spinner,
                &format!("Found {} Conditional Access policies", policies.len()),
            );
            Ok(policies)
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Failed to fetch policies");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMethod;

    #[test]
    fn test_run_args_override_config() {
        let mut config = Config::default();
        let args = RunArgs {
            output_dir: Some(PathBuf::from("out")),
            sanitize_names: true,
            terraform: Some("/opt/terraform".into()),
            tenant: Some("contoso.onmicrosoft.com".into()),
        };
        args.apply(&mut config);

        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.naming, NamingPolicy::Sanitize);
        assert_eq!(config.terraform_path, "/opt/terraform");
        assert_eq!(config.auth.tenant_id.as_deref(), Some("contoso.onmicrosoft.com"));
    }

    #[test]
    fn test_empty_run_args_keep_config() {
        let mut config = Config {
            naming: NamingPolicy::Sanitize,
            ..Config::default()
        };
        RunArgs::default().apply(&mut config);

        assert_eq!(config.output_dir, PathBuf::from("generated"));
        assert_eq!(config.naming, NamingPolicy::Sanitize);
        assert_eq!(config.auth.method, AuthMethod::AzureCli);
    }
}
