//! `ca2tf import`: bind previously generated resources to live policies

use super::{fetch_policies, load_session, RunArgs};
use crate::error::{Ca2TfError, Result};
use crate::graph::conditional_access::ConditionalAccessPolicy;
use crate::graph::GraphClient;
use crate::terraform::import::{ImportTarget, StateImporter, TerraformCli};
use crate::terraform::naming::{self, NamingPolicy};
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

pub async fn import(args: ImportArgs, config_path: Option<&Path>) -> Result<()> {
    let session = load_session(config_path, &args.run)?;
    let config = &session.config;

    if !config.output_dir.is_dir() {
        return Err(Ca2TfError::ConfigError(format!(
            "Output directory {} does not exist; run 'ca2tf generate' first",
            config.output_dir.display()
        )));
    }

    let graph = GraphClient::from_config(&session.manager, config).await?;
    let policies = fetch_policies(&graph).await?;

    let targets = import_targets(&policies, config.naming, &config.output_dir);
    println!(
        "\n{} {} policies into {}",
        "Importing".cyan().bold(),
        targets.len(),
        config.output_dir.display()
    );

    let terraform = TerraformCli::new(config.terraform_path.clone(), &config.output_dir);
    let summary = StateImporter::new(&terraform).import_all(&targets).await?;

    println!(
        "\n{} {} imported, {} failed",
        "Done:".bold(),
        summary.imported.len().to_string().green(),
        summary.failed.len().to_string().red()
    );
    Ok(())
}

/// Import targets labelled exactly as `generate` labels them.
/// Policies without a usable label, or whose `<label>.tf` was never
/// written to `output_dir`, are reported and left out.
pub fn import_targets(
    policies: &[ConditionalAccessPolicy],
    naming: NamingPolicy,
    output_dir: &Path,
) -> Vec<ImportTarget> {
    naming::assign_labels(policies, naming)
        .into_iter()
        .filter_map(|(policy, label)| match label {
            Ok(label) if output_dir.join(format!("{label}.tf")).exists() => Some(ImportTarget {
                display_name: policy.display_name.clone(),
                label,
                id: policy.id.clone(),
            }),
            Ok(label) => {
                println!(
                    "{} Skipped policy '{}': no generated configuration ({}.tf)",
                    "✗".red(),
                    policy.display_name,
                    label
                );
                None
            }
            Err(e) => {
                println!("{} Skipped policy '{}': {}", "✗".red(), policy.display_name, e);
                None
            }
        })
        .collect()
}
