//! Shared data source declarations (`data.tf`)
//!
//! Every user, group and named location referenced by any policy is declared
//! once in `data.tf`. The file is the only record of what has been declared:
//! membership checks parse it again, and each new declaration is appended
//! with its own open/write/close so nothing is held across policies.

use super::{data_source, naming, to_hcl_string};
use crate::error::{Ca2TfError, Result};
use crate::graph::directory::EntityKind;
use crate::terraform::naming::NamingPolicy;
use hcl::{Block, Body, Expression};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DATA_FILE: &str = "data.tf";

/// One declaration found in `data.tf`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub data_type: String,
    pub name: String,
    pub lookup_value: Option<String>,
}

#[derive(Debug)]
pub struct ReferenceRegistry {
    path: PathBuf,
    naming: NamingPolicy,
}

impl ReferenceRegistry {
    /// Start a fresh run: create or truncate `data.tf` in `output_dir`
    pub fn create(output_dir: &Path, naming: NamingPolicy) -> Result<Self> {
        let path = output_dir.join(DATA_FILE);
        File::create(&path).map_err(|e| io_error(&path, e))?;
        tracing::debug!("Initialized {}", path.display());
        Ok(Self { path, naming })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a `data "<type>" "<name>"` block is already declared
    pub fn contains(&self, kind: EntityKind, name: &str) -> Result<bool> {
        Ok(self.find(kind, name)?.is_some())
    }

    /// All declarations currently persisted, in file order
    pub fn entries(&self) -> Result<Vec<RegistryEntry>> {
        let body = self.parse()?;
        Ok(body
            .blocks()
            .filter(|block| block.identifier.as_str() == "data" && block.labels.len() == 2)
            .map(|block| RegistryEntry {
                data_type: block.labels[0].as_str().to_string(),
                name: block.labels[1].as_str().to_string(),
                lookup_value: block.body.attributes().find_map(|attr| match &attr.expr {
                    Expression::String(s) => Some(s.clone()),
                    _ => None,
                }),
            })
            .collect())
    }

    pub fn ensure_user(&self, upn: &str) -> Result<String> {
        self.ensure(EntityKind::User, upn)
    }

    pub fn ensure_group(&self, display_name: &str) -> Result<String> {
        self.ensure(EntityKind::Group, display_name)
    }

    pub fn ensure_named_location(&self, display_name: &str) -> Result<String> {
        self.ensure(EntityKind::NamedLocation, display_name)
    }

    /// Declare `value` under its normalized name unless already declared.
    /// Returns the normalized name for building `data.<type>.<name>.id`.
    pub fn ensure(&self, kind: EntityKind, value: &str) -> Result<String> {
        let name = naming::data_name(kind, value, self.naming)?;

        match self.find(kind, &name)? {
            Some(entry) => {
                // Two different objects normalizing to one name would silently
                // point a policy at the wrong object
                if entry.lookup_value.as_deref() != Some(value) {
                    return Err(Ca2TfError::InvalidName(
                        value.to_string(),
                        format!(
                            "{} name '{}' is already declared for '{}'",
                            kind,
                            name,
                            entry.lookup_value.unwrap_or_default()
                        ),
                    ));
                }
            }
            None => self.append(kind, &name, value)?,
        }

        Ok(name)
    }

    fn find(&self, kind: EntityKind, name: &str) -> Result<Option<RegistryEntry>> {
        let (data_type, _) = data_source(kind);
        Ok(self
            .entries()?
            .into_iter()
            .find(|entry| entry.data_type == data_type && entry.name == name))
    }

    fn parse(&self) -> Result<Body> {
        let contents = fs::read_to_string(&self.path).map_err(|e| io_error(&self.path, e))?;
        hcl::parse(&contents).map_err(|e| Ca2TfError::RegistryIoError {
            path: self.path.display().to_string(),
            reason: format!("cannot parse: {}", e),
        })
    }

    fn append(&self, kind: EntityKind, name: &str, value: &str) -> Result<()> {
        let (data_type, attribute) = data_source(kind);
        let block = Block::builder("data")
            .add_label(data_type)
            .add_label(name.to_string())
            .add_attribute((attribute, value))
            .build();
        let mut text = to_hcl_string(&Body::builder().add_block(block).build())?;
        text.push('\n');

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;
        file.write_all(text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| io_error(&self.path, e))?;

        tracing::debug!("Declared data.{}.{}", data_type, name);
        Ok(())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> Ca2TfError {
    Ca2TfError::RegistryIoError {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> ReferenceRegistry {
        ReferenceRegistry::create(dir.path(), NamingPolicy::Strict).unwrap()
    }

    #[test]
    fn test_create_truncates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DATA_FILE), "data \"azuread_group\" \"Old\" {}\n").unwrap();
        let reg = registry(&dir);
        assert!(reg.entries().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_appends_once() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);

        assert_eq!(reg.ensure_group("Finance Team").unwrap(), "Finance_Team");
        assert_eq!(reg.ensure_group("Finance Team").unwrap(), "Finance_Team");
        assert_eq!(reg.ensure_user("jane.doe@contoso.com").unwrap(), "jane_doe_contoso_com");

        let entries = reg.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            RegistryEntry {
                data_type: "azuread_group".into(),
                name: "Finance_Team".into(),
                lookup_value: Some("Finance Team".into()),
            }
        );
        assert_eq!(entries[1].data_type, "azuread_user");
        assert!(reg.contains(EntityKind::Group, "Finance_Team").unwrap());
        assert!(!reg.contains(EntityKind::NamedLocation, "Finance_Team").unwrap());
    }

    #[test]
    fn test_same_name_different_kinds_coexist() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.ensure_group("HQ").unwrap();
        reg.ensure_named_location("HQ").unwrap();
        assert_eq!(reg.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_sees_writes_made_outside_this_handle() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let mut file = OpenOptions::new().append(true).open(reg.path()).unwrap();
        writeln!(file, "data \"azuread_group\" \"Sales\" {{\n  display_name = \"Sales\"\n}}").unwrap();
        drop(file);

        assert!(reg.contains(EntityKind::Group, "Sales").unwrap());
        reg.ensure_group("Sales").unwrap();
        assert_eq!(reg.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_normalization_collision_is_rejected() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.ensure_group("Finance Team").unwrap();
        let err = reg.ensure_group("Finance_Team").unwrap_err();
        assert!(matches!(err, Ca2TfError::InvalidName(_, _)));
        assert_eq!(reg.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_non_ascii_names_are_declared_as_is() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        assert_eq!(reg.ensure_group("Équipe Finance").unwrap(), "Équipe_Finance");
        assert_eq!(reg.ensure_group("Öquipe Finance").unwrap(), "Öquipe_Finance");
        assert!(reg.contains(EntityKind::Group, "Équipe_Finance").unwrap());
        assert_eq!(reg.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_sanitize_keeps_distinct_non_ascii_names_apart() {
        let dir = TempDir::new().unwrap();
        let reg = ReferenceRegistry::create(dir.path(), NamingPolicy::Sanitize).unwrap();
        assert_eq!(reg.ensure_group("Équipe (Paris)").unwrap(), "Équipe__Paris_");
        assert_eq!(reg.ensure_group("Öquipe (Paris)").unwrap(), "Öquipe__Paris_");
        assert_eq!(reg.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_name_is_not_declared() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        assert!(reg.ensure_group("R&D (EU)").is_err());
        assert!(reg.entries().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_registry_error() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        fs::remove_file(reg.path()).unwrap();
        let err = reg.contains(EntityKind::User, "x").unwrap_err();
        assert!(matches!(err, Ca2TfError::RegistryIoError { .. }));
    }
}
