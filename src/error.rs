use thiserror::Error;

#[derive(Error, Debug)]
pub enum Ca2TfError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Graph API error: {0}")]
    GraphApiError(String),

    #[error("Failed to fetch Conditional Access policies: {0}")]
    SourceFetchError(String),

    #[error("Failed to resolve {kind} '{id}': {reason}")]
    LookupError {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("Reference file error ({path}): {reason}")]
    RegistryIoError { path: String, reason: String },

    #[error("Cannot create output file for '{name}': {source}")]
    OutputCreateError {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid name '{0}': {1}")]
    InvalidName(String, String),

    #[error("Terraform {0}")]
    ImportError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HCL error: {0}")]
    HclError(#[from] hcl::Error),
}

impl Ca2TfError {
    /// Setup failures that end the whole run rather than a single policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Ca2TfError::AuthError(_)
                | Ca2TfError::ConfigError(_)
                | Ca2TfError::SourceFetchError(_)
                | Ca2TfError::TomlError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Ca2TfError>;

/// Parse a Graph API error body into `code: message`
pub fn enhance_graph_error(error_response: &str) -> String {
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(error_response) {
        if let Some(error_obj) = error_json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown");
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message");

            let hint = match code {
                "Unauthorized" | "InvalidAuthenticationToken" => {
                    "\nHint: Your access token may have expired. Run 'az login' or refresh the client credentials."
                }
                "Forbidden" | "Authorization_RequestDenied" | "InsufficientPrivileges" => {
                    "\nHint: Reading policies requires Policy.Read.All; resolving names requires User.Read.All and Group.Read.All."
                }
                "Request_ResourceNotFound" | "NotFound" => {
                    "\nHint: The referenced object no longer exists in the directory."
                }
                "TooManyRequests" => "\nHint: API rate limit exceeded. Wait a moment and run again.",
                _ => "",
            };

            return format!("{}: {}{}", code, message, hint);
        }
    }

    error_response.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhance_graph_error_extracts_code() {
        let body = r#"{"error":{"code":"Request_ResourceNotFound","message":"Resource 'g-1' does not exist"}}"#;
        let enhanced = enhance_graph_error(body);
        assert!(enhanced.starts_with("Request_ResourceNotFound: Resource 'g-1' does not exist"));
        assert!(enhanced.contains("Hint"));
    }

    #[test]
    fn test_enhance_graph_error_passthrough() {
        assert_eq!(enhance_graph_error("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Ca2TfError::SourceFetchError("boom".into()).is_fatal());
        assert!(Ca2TfError::AuthError("no token".into()).is_fatal());
        assert!(!Ca2TfError::ImportError("import failed".into()).is_fatal());
        assert!(!Ca2TfError::LookupError {
            kind: "group",
            id: "g-1".into(),
            reason: "404".into()
        }
        .is_fatal());
    }
}
