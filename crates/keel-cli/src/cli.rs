//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keel CLI - Inspect and edit provenance-tracked records.
#[derive(Debug, Parser)]
#[command(name = "keel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KEEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path (overrides the configuration)
    #[arg(long, global = true, env = "KEEL_DB")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (IDs only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List records with stored versions
    Records,

    /// Show a record's version history
    History(RecordArgs),

    /// Show every field of a record with its state
    Show(ShowArgs),

    /// Run the consistency checks over a record
    Check(ShowArgs),

    /// Import rich JSON content as a new version
    Import(ImportArgs),

    /// Edit one field through an editing session and save
    Edit(EditArgs),

    /// Toggle a field or section lock
    Lock(LockArgs),

    /// Manage local drafts
    Draft(DraftArgs),

    /// Print the field registry
    Registry(RegistryArgs),
}

/// Arguments naming one record.
#[derive(Debug, Parser)]
pub struct RecordArgs {
    /// Record ID
    pub record: String,
}

/// Arguments for show and check.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Record ID
    pub record: String,

    /// Specific version instead of the current one
    #[arg(short, long)]
    pub version: Option<String>,

    /// Only list fields that hold a value or provenance
    #[arg(long)]
    pub touched: bool,
}

/// Arguments for the import command.
#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// JSON file with rich content (`-` for stdin)
    pub file: PathBuf,

    /// Import into an existing record instead of creating one
    #[arg(short, long)]
    pub record: Option<String>,
}

/// Arguments for the edit command.
#[derive(Debug, Parser)]
pub struct EditArgs {
    /// Record ID
    pub record: String,

    /// Field ID
    pub field: String,

    /// New value (JSON or plain text); omit to clear the field
    pub value: Option<String>,

    /// Record the value as coming from an external source
    #[arg(short, long)]
    pub source: Option<String>,

    /// Keep the edit as a local draft instead of saving
    #[arg(long)]
    pub no_save: bool,
}

/// Arguments for the lock command.
#[derive(Debug, Parser)]
pub struct LockArgs {
    /// Record ID
    pub record: String,

    /// Field ID to toggle
    #[arg(required_unless_present = "section", conflicts_with = "section")]
    pub field: Option<String>,

    /// Toggle every field of a registry section
    #[arg(short, long)]
    pub section: Option<String>,
}

/// Arguments for the draft command.
#[derive(Debug, Parser)]
pub struct DraftArgs {
    #[command(subcommand)]
    pub action: DraftAction,
}

/// Draft actions.
#[derive(Debug, Subcommand)]
pub enum DraftAction {
    /// List stored drafts
    List,

    /// Remove stored drafts
    Clear {
        /// Only remove the draft of this record
        record: Option<String>,
    },
}

/// Arguments for the registry command.
#[derive(Debug, Parser)]
pub struct RegistryArgs {
    /// Print the registry as TOML
    #[arg(long)]
    pub toml: bool,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_edit() {
        let cli = Cli::try_parse_from([
            "keel", "edit", "rec", "loanAmountRequested", "1800000", "--source", "doc",
        ])
        .unwrap();
        match cli.command {
            Command::Edit(args) => {
                assert_eq!(args.field, "loanAmountRequested");
                assert_eq!(args.value.as_deref(), Some("1800000"));
                assert_eq!(args.source.as_deref(), Some("doc"));
                assert!(!args.no_save);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_lock_requires_target() {
        assert!(Cli::try_parse_from(["keel", "lock", "rec"]).is_err());
        assert!(Cli::try_parse_from(["keel", "lock", "rec", "--section", "financials"]).is_ok());
    }
}
