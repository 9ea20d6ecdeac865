use crate::config::{AuthConfig, AuthMethod, ConfigManager, TokenCache};
use crate::error::{Ca2TfError, Result};
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, ClientId, ClientSecret, Scope,
    TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::time::Duration;

const MICROSOFT_AUTHORITY: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const GRAPH_RESOURCE: &str = "https://graph.microsoft.com";

/// Output of `az account get-access-token --output json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureCliToken {
    access_token: String,
}

pub struct GraphAuth {
    config_manager: ConfigManager,
    auth: AuthConfig,
}

impl GraphAuth {
    pub fn new(config_manager: ConfigManager, auth: AuthConfig) -> Self {
        Self {
            config_manager,
            auth,
        }
    }

    /// Get a bearer token for Graph using the configured method
    pub async fn access_token(&self) -> Result<String> {
        match self.auth.method {
            AuthMethod::Token => self.auth.access_token.clone().ok_or_else(|| {
                Ca2TfError::AuthError(format!(
                    "auth method 'token' needs {} to be set",
                    crate::config::ACCESS_TOKEN_ENV
                ))
            }),
            AuthMethod::AzureCli => self.azure_cli_token().await,
            AuthMethod::ClientCredentials => self.client_credentials_token().await,
        }
    }

    /// Borrow the Azure CLI session, like `az` based tooling does
    async fn azure_cli_token(&self) -> Result<String> {
        let mut cmd = tokio::process::Command::new("az");
        cmd.args([
            "account",
            "get-access-token",
            "--resource",
            GRAPH_RESOURCE,
            "--output",
            "json",
        ]);
        if let Some(tenant) = &self.auth.tenant_id {
            cmd.args(["--tenant", tenant]);
        }

        let output = cmd.output().await.map_err(|e| {
            Ca2TfError::AuthError(format!("Could not run Azure CLI ('az'): {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Ca2TfError::AuthError(format!(
                "Azure CLI could not issue a token (run 'az login'): {}",
                stderr.trim()
            )));
        }

        parse_azure_cli_token(&output.stdout)
    }

    /// Authenticate using client credentials flow (non-interactive)
    async fn client_credentials_token(&self) -> Result<String> {
        let tenant_id = self.auth.tenant_id.as_ref().ok_or_else(|| {
            Ca2TfError::AuthError("tenant_id is required for client credentials".into())
        })?;

        let client_id = self.auth.client_id.as_ref().ok_or_else(|| {
            Ca2TfError::AuthError("client_id is required for client credentials".into())
        })?;

        if let Some(cached) = self.config_manager.load_token(tenant_id, client_id)? {
            tracing::debug!("Using cached token for tenant {}", tenant_id);
            return Ok(cached.access_token);
        }
        let client_secret = self.auth.client_secret.as_ref().ok_or_else(|| {
            Ca2TfError::AuthError(format!(
                "Client secret required for client credentials flow (set {})",
                crate::config::CLIENT_SECRET_ENV
            ))
        })?;

        let auth_url = AuthUrl::new(format!(
            "{}/{}/oauth2/v2.0/authorize",
            MICROSOFT_AUTHORITY, tenant_id
        ))
        .map_err(|e| Ca2TfError::AuthError(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(format!(
            "{}/{}/oauth2/v2.0/token",
            MICROSOFT_AUTHORITY, tenant_id
        ))
        .map_err(|e| Ca2TfError::AuthError(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(
            ClientId::new(client_id.clone()),
            Some(ClientSecret::new(client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        let token = client
            .exchange_client_credentials()
            .add_scope(Scope::new(GRAPH_SCOPE.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                Ca2TfError::AuthError(format!("Client credentials exchange failed: {}", e))
            })?;

        let lifetime = token.expires_in().unwrap_or(Duration::from_secs(3600));
        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::hours(1));

        let token_cache = TokenCache {
            access_token: token.access_token().secret().clone(),
            expires_at,
            tenant_id: tenant_id.clone(),
            client_id: Some(client_id.clone()),
        };

        // A cache write failure only costs a new token next run
        if let Err(e) = self.config_manager.save_token(&token_cache) {
            tracing::warn!("Could not cache token: {}", e);
        }

        Ok(token_cache.access_token)
    }
}

fn parse_azure_cli_token(stdout: &[u8]) -> Result<String> {
    let token: AzureCliToken = serde_json::from_slice(stdout)
        .map_err(|e| Ca2TfError::AuthError(format!("Unexpected Azure CLI output: {}", e)))?;
    Ok(token.access_token)
}
