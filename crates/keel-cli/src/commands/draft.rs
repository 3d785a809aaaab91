//! Draft management command.

use crate::cli::{DraftAction, DraftArgs};
use crate::config::OutputFormat;
use crate::context::{parse_record, Context};
use crate::error::Result;
use keel_domain::DraftStore;

/// List or clear local drafts.
pub fn execute_draft(args: DraftArgs, ctx: &Context) -> Result<()> {
    let mut drafts = ctx.drafts()?;

    match args.action {
        DraftAction::List => {
            let keys = drafts.keys()?;
            match ctx.formatter.format() {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
                _ if keys.is_empty() => println!("{}", ctx.formatter.info("No local drafts")),
                _ => println!("{}", keys.join("\n")),
            }
        }
        DraftAction::Clear { record: Some(raw) } => {
            let record = parse_record(&raw)?;
            drafts.remove(&ctx.config.session.draft_key(record))?;
            println!("{}", ctx.formatter.success(&format!("Removed draft for {}", record)));
        }
        DraftAction::Clear { record: None } => {
            let removed = drafts.clear()?;
            println!("{}", ctx.formatter.success(&format!("Removed {} draft(s)", removed)));
        }
    }
    Ok(())
}
