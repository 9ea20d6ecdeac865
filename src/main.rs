use ca2tf::{cmd, error};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "ca2tf",
    about = "Export Conditional Access policies as Terraform configuration",
    version,
    long_about = "Reads every Conditional Access policy in an Entra ID tenant and writes\n\
                  azuread_conditional_access_policy resources, with users, groups and\n\
                  named locations declared once as data sources in data.tf.\n\
                  Optionally imports the generated resources into Terraform state."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config.toml (default: the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write data.tf and one .tf file per policy
    Generate(cmd::generate::GenerateArgs),

    /// Import existing policies into state for previously generated files
    Import(cmd::import::ImportArgs),

    /// List policies and the resource names they export to
    List(cmd::list::ListArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("ca2tf=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ca2tf=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Generate(args) => cmd::generate::generate(args, config_path).await?,
        Commands::Import(args) => cmd::import::import(args, config_path).await?,
        Commands::List(args) => cmd::list::list(args, config_path).await?,
    }

    Ok(())
}
