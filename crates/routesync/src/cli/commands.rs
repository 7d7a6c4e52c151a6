//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::record::RecordFilter;

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Which records to show (defaults to the configured filter)
    #[arg(short, long, value_enum)]
    pub filter: Option<FilterArg>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Id of the local record
    pub id: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Rename command arguments.
#[derive(Debug, Args)]
pub struct RenameCommand {
    /// Id of the local record
    pub id: String,

    /// New display name
    pub name: String,
}

/// Remove command arguments.
#[derive(Debug, Args)]
pub struct RemoveCommand {
    /// Id of the local record
    pub id: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Clear command arguments.
#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Record filter argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    /// Every record
    All,
    /// Records stored on this device
    Local,
    /// Records that only exist remotely
    Server,
}

impl From<FilterArg> for RecordFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => Self::All,
            FilterArg::Local => Self::Local,
            FilterArg::Server => Self::Server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_arg_conversion() {
        assert_eq!(RecordFilter::from(FilterArg::All), RecordFilter::All);
        assert_eq!(RecordFilter::from(FilterArg::Local), RecordFilter::Local);
        assert_eq!(RecordFilter::from(FilterArg::Server), RecordFilter::Server);
    }

    #[test]
    fn test_list_command_debug() {
        let cmd = ListCommand {
            filter: Some(FilterArg::Local),
            json: true,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Local"));
        assert!(debug_str.contains("json"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
