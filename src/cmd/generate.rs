//! `ca2tf generate`: export policies as Terraform configuration

use super::{fetch_policies, load_session, RunArgs};
use crate::config::Config;
use crate::error::{Ca2TfError, Result};
use crate::graph::conditional_access::ConditionalAccessPolicy;
use crate::graph::directory::DirectoryLookup;
use crate::graph::GraphClient;
use crate::terraform::import::{ImportSummary, ImportTarget, ProvisioningTool, StateImporter, TerraformCli};
use crate::terraform::registry::ReferenceRegistry;
use crate::terraform::render::{PolicyRenderer, RenderReport, RenderedPolicy};
use crate::terraform::{write_provider_scaffold, PROVIDERS_FILE};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::Path;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Import the generated resources into Terraform state afterwards
    #[arg(long)]
    pub import: bool,
}

pub async fn generate(args: GenerateArgs, config_path: Option<&Path>) -> Result<()> {
    let session = load_session(config_path, &args.run)?;
    let config = &session.config;

    println!(
        "{} Conditional Access policies to {}",
        "Exporting".cyan().bold(),
        config.output_dir.display()
    );

    fs::create_dir_all(&config.output_dir).map_err(|e| {
        Ca2TfError::ConfigError(format!(
            "Cannot create output directory {}: {}",
            config.output_dir.display(),
            e
        ))
    })?;

    let graph = GraphClient::from_config(&session.manager, config).await?;
    let policies = fetch_policies(&graph).await?;

    println!();
    let report = render_policies(&graph, &policies, config).await?;

    let imports = if args.import && !report.rendered.is_empty() {
        println!("\n{} resources into Terraform state...", "Importing".cyan().bold());
        let terraform = TerraformCli::new(config.terraform_path.clone(), &config.output_dir);
        import_rendered(&terraform, &report.rendered).await?
    } else {
        None
    };

    print_summary(&report, imports.as_ref(), &config.output_dir);
    Ok(())
}

/// Render `policies` into the configured output directory.
///
/// `data.tf` starts empty and `providers.tf` is written when enabled and
/// missing. Individual policy failures end up in the report.
pub async fn render_policies<L: DirectoryLookup>(
    lookup: &L,
    policies: &[ConditionalAccessPolicy],
    config: &Config,
) -> Result<RenderReport> {
    let registry = ReferenceRegistry::create(&config.output_dir, config.naming)?;

    if config.write_provider_block && write_provider_scaffold(&config.output_dir)? {
        println!("{} Wrote {}", "→".cyan(), PROVIDERS_FILE);
    }

    let renderer = PolicyRenderer::new(lookup, &registry, &config.output_dir, config.naming);
    Ok(renderer.render_all(policies).await)
}

/// Import what was rendered in this run.
///
/// Returns `None` when the tool could not be initialized; that is reported
/// but leaves the generated files usable.
pub async fn import_rendered<T: ProvisioningTool>(
    tool: &T,
    rendered: &[RenderedPolicy],
) -> Result<Option<ImportSummary>> {
    let targets: Vec<ImportTarget> = rendered
        .iter()
        .map(|policy| ImportTarget {
            display_name: policy.display_name.clone(),
            label: policy.label.clone(),
            id: policy.id.clone(),
        })
        .collect();

    match StateImporter::new(tool).import_all(&targets).await {
        Ok(summary) => Ok(Some(summary)),
        Err(e) if !e.is_fatal() => {
            println!("{} Import skipped: {}", "✗".red(), e);
            tracing::warn!("Import phase aborted: {:?}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn print_summary(report: &RenderReport, imports: Option<&ImportSummary>, output_dir: &Path) {
    println!("\n{}", "Summary".bold());
    println!("  Rendered: {}", report.rendered.len().to_string().green());
    if !report.failed.is_empty() {
        println!("  Skipped:  {}", report.failed.len().to_string().red());
        for (name, _) in &report.failed {
            println!("    • {}", name);
        }
    }

    if let Some(summary) = imports {
        println!("  Imported: {}", summary.imported.len().to_string().green());
        if !summary.failed.is_empty() {
            println!("  Import failures: {}", summary.failed.len().to_string().red());
        }
    }

    println!("\n{} {}", "Output:".bold(), output_dir.display());
}
