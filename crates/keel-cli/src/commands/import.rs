//! Import command implementation.

use crate::cli::ImportArgs;
use crate::config::OutputFormat;
use crate::context::{parse_record, Context};
use crate::error::Result;
use keel_domain::{RecordId, SaveOptions, Snapshot};
use std::io::Read;

/// Import rich JSON content as a new version.
pub fn execute_import(args: ImportArgs, ctx: &Context) -> Result<()> {
    let text = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.file)?
    };

    let content: serde_json::Value = serde_json::from_str(&text)?;
    let snapshot = Snapshot::from_rich_content(&content, &ctx.registry)?;

    let record = match &args.record {
        Some(raw) => parse_record(raw)?,
        None => RecordId::new(),
    };
    let version = ctx
        .store
        .write(record, &snapshot, SaveOptions::new_version())?;

    match ctx.formatter.format() {
        OutputFormat::Quiet => println!("{}", record),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "record": record.to_string(),
                "version": version.to_string(),
                "fields": snapshot.values.len(),
            })
        ),
        OutputFormat::Table => println!(
            "{}",
            ctx.formatter.success(&format!(
                "Imported {} field(s) into record {} (version {})",
                snapshot.values.len(),
                record,
                version
            ))
        ),
    }
    Ok(())
}
