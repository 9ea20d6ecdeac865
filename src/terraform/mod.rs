//! Terraform configuration generation for Conditional Access policies

pub mod import;
pub mod naming;
pub mod registry;
pub mod render;

use crate::error::Result;
use crate::graph::directory::EntityKind;
use hcl::expr::{Traversal, Variable};
use hcl::format::{Format, Formatter};
use hcl::structure::BlockBuilder;
use hcl::{Body, Expression};
use std::fs;
use std::path::Path;

pub const POLICY_RESOURCE_TYPE: &str = "azuread_conditional_access_policy";
pub const PROVIDERS_FILE: &str = "providers.tf";

const PROVIDERS_TF: &str = r#"terraform {
  required_providers {
    azuread = {
      source = "hashicorp/azuread"
    }
  }
}

provider "azuread" {}
"#;

/// Data source type and lookup attribute for a directory object kind
pub fn data_source(kind: EntityKind) -> (&'static str, &'static str) {
    match kind {
        EntityKind::User => ("azuread_user", "user_principal_name"),
        EntityKind::Group => ("azuread_group", "display_name"),
        EntityKind::NamedLocation => ("azuread_named_location", "display_name"),
    }
}

/// `data.<type>.<name>.id`
pub fn data_reference(kind: EntityKind, name: &str) -> Expression {
    let (data_type, _) = data_source(kind);
    let traversal = Traversal::builder(Variable::unchecked("data"))
        .attr(data_type)
        .attr(name.to_string())
        .attr("id")
        .build();
    Expression::from(traversal)
}

/// Render a body as HCL text, keeping list literals on one line
pub fn to_hcl_string(body: &Body) -> Result<String> {
    let mut formatter = Formatter::builder().compact_arrays(true).build_vec();
    Ok(body.format_string(&mut formatter)?)
}

/// Attribute helpers mirroring the "unset is not empty" rule of the provider schema
pub(crate) trait BlockBuilderExt: Sized {
    /// Add a list attribute, or nothing when there are no values
    fn add_list<I, T>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expression>;

    /// Add an attribute only when a value exists
    fn add_optional<T: Into<Expression>>(self, key: &str, value: Option<T>) -> Self;
}

impl BlockBuilderExt for BlockBuilder {
    fn add_list<I, T>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Expression>,
    {
        let items: Vec<Expression> = values.into_iter().map(Into::into).collect();
        if items.is_empty() {
            self
        } else {
            self.add_attribute((key, Expression::Array(items)))
        }
    }

    fn add_optional<T: Into<Expression>>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.add_attribute((key, v.into())),
            None => self,
        }
    }
}

/// Write providers.tf unless it already exists. Returns whether it was written.
pub fn write_provider_scaffold(output_dir: &Path) -> Result<bool> {
    let path = output_dir.join(PROVIDERS_FILE);
    if path.exists() {
        return Ok(false);
    }
    fs::write(&path, PROVIDERS_TF)?;
    tracing::debug!("Wrote {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcl::Block;

    #[test]
    fn test_data_reference_renders_traversal() {
        let body = Body::builder()
            .add_attribute(("x", data_reference(EntityKind::Group, "Finance_Team")))
            .build();
        let text = to_hcl_string(&body).unwrap();
        assert!(text.contains("x = data.azuread_group.Finance_Team.id"), "{text}");
    }

    #[test]
    fn test_add_list_skips_empty() {
        let block = Block::builder("users")
            .add_list("included_users", Vec::<String>::new())
            .add_list("included_roles", vec!["role-1".to_string()])
            .add_optional("flag", None::<bool>)
            .build();
        let text = to_hcl_string(&Body::builder().add_block(block).build()).unwrap();
        assert!(!text.contains("included_users"));
        assert!(!text.contains("flag"));
        assert!(text.contains(r#"included_roles = ["role-1"]"#), "{text}");
    }

    #[test]
    fn test_provider_scaffold_written_once() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(write_provider_scaffold(dir.path()).unwrap());
        fs::write(dir.path().join(PROVIDERS_FILE), "# custom\n").unwrap();
        assert!(!write_provider_scaffold(dir.path()).unwrap());
        assert_eq!(
            fs::read_to_string(dir.path().join(PROVIDERS_FILE)).unwrap(),
            "# custom\n"
        );
    }

    #[test]
    fn test_provider_scaffold_is_valid_hcl() {
        let body: Body = hcl::parse(PROVIDERS_TF).unwrap();
        assert_eq!(body.blocks().count(), 2);
    }
}
