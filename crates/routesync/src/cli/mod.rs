//! Command-line interface for routesync.
//!
//! This module provides the CLI structure, terminal confirmation and output
//! formatting for the `routesync` maintenance binary. The binary works on the
//! local store only; remote calls go through [`OfflineGateway`](crate::OfflineGateway).

mod commands;
mod output;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::lifecycle::{ConfirmationPort, ConfirmationRequest, Decision};

pub use commands::{
    ClearCommand, ConfigCommand, FilterArg, ListCommand, RemoveCommand, RenameCommand,
    ShowCommand,
};
pub use output::{record_line, record_table, state_label};

/// routesync - Inspect and maintain locally captured route records
///
/// Lists, renames and removes the route annotation records kept on this
/// device. Uploading and remote deletion need a connected client.
#[derive(Debug, Parser)]
#[command(name = "routesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List records, newest first
    List(ListCommand),

    /// Show one local record
    Show(ShowCommand),

    /// Rename a local record
    Rename(RenameCommand),

    /// Remove a local record that was never uploaded
    Remove(RemoveCommand),

    /// Remove every local record
    Clear(ClearCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

/// Confirmation on the controlling terminal.
///
/// With `assume_yes` every request is confirmed without prompting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm {
    /// Confirm without asking.
    pub assume_yes: bool,
}

impl TerminalConfirm {
    /// Render the question for a request.
    #[must_use]
    pub fn prompt(request: &ConfirmationRequest) -> String {
        match request {
            ConfirmationRequest::Delete { display_name, .. } => {
                format!("Delete \"{display_name}\"? This cannot be undone. [y/N] ")
            }
            ConfirmationRequest::DeleteLocallyAfterRemoteFailure { message, .. } => {
                format!("Remote delete failed ({message}). Delete locally anyway? [y/N] ")
            }
        }
    }

    fn ask(&self, request: &ConfirmationRequest) -> io::Result<Decision> {
        let mut stderr = io::stderr();
        write!(stderr, "{}", Self::prompt(request))?;
        stderr.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(parse_answer(&answer))
    }
}

impl ConfirmationPort for TerminalConfirm {
    fn confirm(&self, request: &ConfirmationRequest) -> Decision {
        if self.assume_yes {
            return Decision::Confirm;
        }
        // An unreadable terminal never confirms.
        self.ask(request).unwrap_or(Decision::Decline)
    }
}

fn parse_answer(answer: &str) -> Decision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Decision::Confirm,
        _ => Decision::Decline,
    }
}
