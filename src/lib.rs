//! Export Entra ID Conditional Access policies as Terraform configuration

pub mod cmd;
pub mod config;
pub mod error;
pub mod graph;
pub mod terraform;

pub use error::{Ca2TfError, Result};
