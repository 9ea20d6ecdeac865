//! Binding generated resources to existing policies in Terraform state

use super::POLICY_RESOURCE_TYPE;
use crate::error::{Ca2TfError, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// The external provisioning tool, as far as importing is concerned
#[allow(async_fn_in_trait)]
pub trait ProvisioningTool {
    /// Prepare the working directory; safe to repeat
    async fn init(&self) -> Result<()>;

    /// Bind `address` to the existing object `id`
    async fn import(&self, address: &str, id: &str) -> Result<()>;
}

/// Runs the `terraform` binary in the output directory
#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: String,
    working_dir: PathBuf,
}

impl TerraformCli {
    pub fn new(binary: impl Into<String>, working_dir: &Path) -> Self {
        Self {
            binary: binary.into(),
            working_dir: working_dir.to_path_buf(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        tracing::debug!("{} {}", self.binary, args.join(" "));

        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| {
                Ca2TfError::ImportError(format!("could not run '{}': {}", self.binary, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Ca2TfError::ImportError(format!(
                "{} failed ({}): {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl ProvisioningTool for TerraformCli {
    async fn init(&self) -> Result<()> {
        self.run(&["init", "-upgrade", "-input=false", "-no-color"]).await
    }

    async fn import(&self, address: &str, id: &str) -> Result<()> {
        self.run(&["import", "-input=false", "-no-color", address, id]).await
    }
}

/// `azuread_conditional_access_policy.<label>`, with the label the renderer used
pub fn resource_address(label: &str) -> String {
    format!("{}.{}", POLICY_RESOURCE_TYPE, label)
}

/// A policy to bind: its resource label and Graph object ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTarget {
    pub display_name: String,
    pub label: String,
    pub id: String,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub imported: Vec<String>,
    pub failed: Vec<(String, Ca2TfError)>,
}

pub struct StateImporter<'a, T> {
    tool: &'a T,
}

impl<'a, T: ProvisioningTool> StateImporter<'a, T> {
    pub fn new(tool: &'a T) -> Self {
        Self { tool }
    }

    /// Initialize once, then import every target.
    ///
    /// A failed init is returned as an error. A failed import is reported and
    /// the next target is attempted.
    pub async fn import_all(&self, targets: &[ImportTarget]) -> Result<ImportSummary> {
        self.tool.init().await?;

        let mut summary = ImportSummary::default();
        for target in targets {
            let address = resource_address(&target.label);
            match self.tool.import(&address, &target.id).await {
                Ok(()) => {
                    println!("{} Imported {}", "✓".green(), address);
                    summary.imported.push(target.display_name.clone());
                }
                Err(e) => {
                    println!("{} Import of '{}' failed: {}", "✗".red(), target.display_name, e);
                    tracing::warn!("Import failed for {}: {:?}", address, e);
                    summary.failed.push((target.display_name.clone(), e));
                }
            }
        }

        Ok(summary)
    }
}
