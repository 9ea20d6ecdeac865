//! Label rules for generated blocks and files
//!
//! Every label produced here is an HCL identifier as `hcl::Identifier`
//! defines it: a Unicode identifier-start character or `_`, followed by
//! identifier characters or `-`. Policy file names reuse the policy label,
//! so they never contain path separators.

use crate::error::{Ca2TfError, Result};
use crate::graph::conditional_access::ConditionalAccessPolicy;
use crate::graph::directory::EntityKind;
use hcl::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What to do with a name that does not form a valid label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingPolicy {
    /// Reject the name; the policy that needs it is skipped
    #[default]
    Strict,
    /// Replace offending characters with `_`
    Sanitize,
}

pub fn is_identifier(s: &str) -> bool {
    Identifier::new(s).is_ok()
}

/// Block label of a policy resource: lower case, spaces to underscores
pub fn policy_label_candidate(display_name: &str) -> String {
    display_name.replace(' ', "_").to_lowercase()
}

/// Data source name for a directory object before validation
pub fn data_name_candidate(kind: EntityKind, name: &str) -> String {
    match kind {
        EntityKind::User => name.replace('@', "_").replace('.', "_"),
        EntityKind::Group | EntityKind::NamedLocation => name.replace(' ', "_"),
    }
}

impl NamingPolicy {
    /// Validate `candidate`, derived from `source`, under this policy
    pub fn apply(&self, source: &str, candidate: String) -> Result<String> {
        if is_identifier(&candidate) {
            return Ok(candidate);
        }

        match self {
            NamingPolicy::Strict => Err(Ca2TfError::InvalidName(
                source.to_string(),
                format!(
                    "'{}' is not a valid Terraform name (set naming = \"sanitize\" to rewrite it)",
                    candidate
                ),
            )),
            NamingPolicy::Sanitize => {
                if candidate.is_empty() {
                    return Err(Ca2TfError::InvalidName(
                        source.to_string(),
                        "name is empty".into(),
                    ));
                }
                let cleaned = Identifier::sanitized(&candidate).as_str().to_owned();
                tracing::debug!("Sanitized '{}' to '{}'", source, cleaned);
                Ok(cleaned)
            }
        }
    }
}

/// Label shared by the rendered resource block, its file name and the import address
pub fn policy_label(display_name: &str, naming: NamingPolicy) -> Result<String> {
    naming.apply(display_name, policy_label_candidate(display_name))
}

pub fn data_name(kind: EntityKind, name: &str, naming: NamingPolicy) -> Result<String> {
    naming.apply(name, data_name_candidate(kind, name))
}

/// Label every policy of a run. A label already taken by an earlier policy is
/// an error for the later one, so no document or import address is shared.
pub fn assign_labels(
    policies: &[ConditionalAccessPolicy],
    naming: NamingPolicy,
) -> Vec<(&ConditionalAccessPolicy, Result<String>)> {
    let mut taken = HashSet::new();
    policies
        .iter()
        .map(|policy| {
            let label = policy_label(&policy.display_name, naming).and_then(|label| {
                if taken.insert(label.clone()) {
                    Ok(label)
                } else {
                    Err(Ca2TfError::InvalidName(
                        policy.display_name.clone(),
                        format!("resource name '{}' is already used by another policy", label),
                    ))
                }
            });
            (policy, label)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_label_transform() {
        assert_eq!(
            policy_label("Require MFA for Admins", NamingPolicy::Strict).unwrap(),
            "require_mfa_for_admins"
        );
        assert_eq!(
            policy_label("CA001-Block-Legacy", NamingPolicy::Strict).unwrap(),
            "ca001-block-legacy"
        );
    }

    #[test]
    fn test_data_name_transforms() {
        assert_eq!(
            data_name(EntityKind::User, "jane.doe@contoso.com", NamingPolicy::Strict).unwrap(),
            "jane_doe_contoso_com"
        );
        assert_eq!(
            data_name(EntityKind::Group, "Finance Team", NamingPolicy::Strict).unwrap(),
            "Finance_Team"
        );
        // Dots only change for users
        assert!(data_name(EntityKind::NamedLocation, "HQ v2.1", NamingPolicy::Strict).is_err());
    }

    #[test]
    fn test_strict_rejects_structural_characters() {
        for name in ["Admins / Break glass", "Block \"legacy\"", "1st policy", ""] {
            let err = policy_label(name, NamingPolicy::Strict).unwrap_err();
            assert!(matches!(err, Ca2TfError::InvalidName(_, _)), "{name}");
        }
    }

    #[test]
    fn test_sanitize_rewrites() {
        assert_eq!(
            policy_label("Admins / Break glass", NamingPolicy::Sanitize).unwrap(),
            "admins___break_glass"
        );
        assert_eq!(policy_label("1st policy", NamingPolicy::Sanitize).unwrap(), "_1st_policy");
        assert_eq!(
            data_name(EntityKind::User, "ext_gmail.com#EXT#@contoso.onmicrosoft.com", NamingPolicy::Sanitize)
                .unwrap(),
            "ext_gmail_com_EXT__contoso_onmicrosoft_com"
        );
        assert!(policy_label("", NamingPolicy::Sanitize).is_err());
    }

    #[test]
    fn test_assign_labels_flags_duplicates() {
        let policies: Vec<ConditionalAccessPolicy> = ["Block Legacy", "block legacy", "Admins/All"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                serde_json::from_value(serde_json::json!({
                    "id": format!("p{}", i),
                    "displayName": name,
                    "state": "enabled"
                }))
                .unwrap()
            })
            .collect();

        let labels = assign_labels(&policies, NamingPolicy::Strict);
        assert_eq!(labels[0].1.as_ref().unwrap(), "block_legacy");
        assert!(matches!(labels[1].1, Err(Ca2TfError::InvalidName(_, _))));
        assert!(labels[2].1.is_err());
        assert_eq!(labels[2].0.id, "p2");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("_x"));
        assert!(is_identifier("a-b_c9"));
        assert!(!is_identifier("-a"));
        assert!(!is_identifier("9a"));
        assert!(!is_identifier("a.b"));
        assert!(is_identifier("café"));
        assert!(is_identifier("Équipe_Finance"));
        assert!(!is_identifier("a/b"));
    }

    #[test]
    fn test_non_ascii_names_are_valid() {
        assert_eq!(
            data_name(EntityKind::Group, "Équipe Finance", NamingPolicy::Strict).unwrap(),
            "Équipe_Finance"
        );
        assert_eq!(
            policy_label("Zugriff für Gäste", NamingPolicy::Strict).unwrap(),
            "zugriff_für_gäste"
        );
        // Sanitizing keeps letters and only rewrites what HCL rejects
        assert_eq!(
            data_name(EntityKind::Group, "Öquipe (Paris)", NamingPolicy::Sanitize).unwrap(),
            "Öquipe__Paris_"
        );
    }
}
