//! Directory lookups that turn object IDs into names

use crate::error::{Ca2TfError, Result};
use crate::graph::GraphClient;
use serde::Deserialize;
use std::fmt;

/// Kinds of directory objects a policy can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Group,
    NamedLocation,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Group => "group",
            EntityKind::NamedLocation => "named location",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves an object ID to the name used in generated configuration:
/// the user principal name for users, the display name otherwise.
#[allow(async_fn_in_trait)]
pub trait DirectoryLookup {
    async fn resolve(&self, kind: EntityKind, id: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryObject {
    #[serde(default)]
    user_principal_name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

fn lookup_error(kind: EntityKind, id: &str, reason: impl Into<String>) -> Ca2TfError {
    Ca2TfError::LookupError {
        kind: kind.as_str(),
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// Object IDs are GUIDs; anything else would change the request path
fn is_object_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl DirectoryLookup for GraphClient {
    async fn resolve(&self, kind: EntityKind, id: &str) -> Result<String> {
        if !is_object_id(id) {
            return Err(lookup_error(kind, id, "not a directory object ID"));
        }

        let endpoint = match kind {
            EntityKind::User => format!("users/{}?$select=id,userPrincipalName", id),
            EntityKind::Group => format!("groups/{}?$select=id,displayName", id),
            EntityKind::NamedLocation => {
                format!("identity/conditionalAccess/namedLocations/{}", id)
            }
        };

        let object: DirectoryObject = self
            .get(&endpoint)
            .await
            .map_err(|e| lookup_error(kind, id, e.to_string()))?;

        let name = match kind {
            EntityKind::User => object.user_principal_name,
            EntityKind::Group | EntityKind::NamedLocation => object.display_name,
        };

        let name = name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| lookup_error(kind, id, "object has no name"))?;

        tracing::debug!("Resolved {} {} -> {}", kind, id, name);
        Ok(name)
    }
}
