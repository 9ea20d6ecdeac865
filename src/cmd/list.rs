//! `ca2tf list`

use super::{fetch_policies, load_session, RunArgs};
use crate::error::Result;
use crate::graph::conditional_access::{PolicyState, WireEnum};
use crate::graph::GraphClient;
use crate::terraform::naming;
use clap::Args;
use colored::{ColoredString, Colorize};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Print the policies as returned by Graph, in JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn list(args: ListArgs, config_path: Option<&Path>) -> Result<()> {
    let session = load_session(config_path, &args.run)?;
    let graph = GraphClient::from_config(&session.manager, &session.config).await?;
    let policies = fetch_policies(&graph).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&policies)?);
        return Ok(());
    }

    println!();
    for (policy, label) in naming::assign_labels(&policies, session.config.naming) {
        let label = match label {
            Ok(label) => label.normal(),
            Err(_) => "(not exportable)".red(),
        };
        println!("  {} [{}]", policy.display_name.bold(), state_badge(policy.state));
        println!("    {} {}", "→".cyan(), label);
    }

    Ok(())
}

fn state_badge(state: PolicyState) -> ColoredString {
    match state {
        PolicyState::Enabled => state.as_str().green(),
        PolicyState::Disabled => state.as_str().red(),
        PolicyState::EnabledForReportingButNotEnforced => "report-only".yellow(),
    }
}
