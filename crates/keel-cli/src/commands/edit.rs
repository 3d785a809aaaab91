//! Edit and lock commands, both driven through an editing session.

use crate::cli::{EditArgs, LockArgs};
use crate::config::OutputFormat;
use crate::context::{parse_record, CliSession, Context};
use crate::error::{CliError, Result};
use keel_domain::{DomainError, EditEffect, FieldId, FieldRegistry, FieldValue, LockOutcome};
use keel_session::{CloseOutcome, SaveOutcome};
use tracing::debug;

/// Parse a command-line value into the field's declared type.
///
/// The raw text is tried as JSON first so `1200000` becomes a number and
/// `"abc"` a string; anything that is not valid JSON is taken as plain text.
pub fn parse_value(registry: &FieldRegistry, field: &FieldId, raw: &str) -> Result<Option<FieldValue>> {
    let data_type = registry
        .data_type(field)
        .ok_or_else(|| DomainError::UnknownField(field.to_string()))?;
    let json = serde_json::from_str::<serde_json::Value>(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok(FieldValue::from_json(field.as_str(), data_type, &json)?)
}

/// Edit one field and save the result.
pub async fn execute_edit(args: EditArgs, ctx: &Context) -> Result<()> {
    let record = parse_record(&args.record)?;
    let field = FieldId::from(args.field.as_str());
    let value = match &args.value {
        Some(raw) => parse_value(&ctx.registry, &field, raw)?,
        None => None,
    };

    let mut session = ctx.open_session(record)?;
    if session.restored_from_draft() {
        println!("{}", ctx.formatter.info("Resumed unsaved local draft"));
    }

    match &args.source {
        Some(source) => {
            if !session.record_external_value(&field, value, source)? {
                println!(
                    "{}",
                    ctx.formatter
                        .warning(&format!("{} is locked; value from {} ignored", field, source))
                );
            }
        }
        None => {
            if let EditEffect::Reverted { restored } = session.record_user_edit(&field, value)? {
                println!(
                    "{}",
                    ctx.formatter
                        .info(&format!("{} matches the value proposed by {}", field, restored))
                );
            }
        }
    }

    session.settle().await;
    report_field(ctx, &session, &field);

    if args.no_save {
        // settle() has already flushed the debounced draft
        debug!(record = %record, "Edit kept as local draft");
        println!("{}", ctx.formatter.info("Kept as local draft"));
        return Ok(());
    }

    match session.save().await? {
        SaveOutcome::Persisted { version } => {
            println!("{}", ctx.formatter.success(&format!("Saved version {}", version)));
        }
        SaveOutcome::Unchanged => println!("{}", ctx.formatter.info("No changes to save")),
    }
    close(ctx, session).await
}

/// Toggle a field or section lock and persist the lock state.
pub async fn execute_lock(args: LockArgs, ctx: &Context) -> Result<()> {
    let record = parse_record(&args.record)?;
    let mut session = ctx.open_session(record)?;

    if let Some(section) = &args.section {
        let outcome = session.toggle_section_lock(section)?;
        for field in &outcome.locked {
            println!("{}", ctx.formatter.success(&format!("Locked {}", field)));
        }
        for field in &outcome.unlocked {
            println!("{}", ctx.formatter.success(&format!("Unlocked {}", field)));
        }
        for field in &outcome.skipped {
            println!("{}", ctx.formatter.warning(&format!("Skipped {}", field)));
        }
    } else if let Some(raw) = &args.field {
        let field = FieldId::from(raw.as_str());
        match session.toggle_field_lock(&field)? {
            LockOutcome::Locked => {
                println!("{}", ctx.formatter.success(&format!("Locked {}", field)))
            }
            LockOutcome::Unlocked => {
                println!("{}", ctx.formatter.success(&format!("Unlocked {}", field)))
            }
            LockOutcome::Rejected(reason) => {
                return Err(CliError::InvalidInput(format!("{}: {}", field, reason.message())));
            }
        }
    }

    if let Some(version) = session.sync_lock_state().await? {
        debug!(record = %record, version = %version, "Lock state written");
    }
    close(ctx, session).await
}

fn report_field(ctx: &Context, session: &CliSession, field: &FieldId) {
    if ctx.formatter.format() == OutputFormat::Quiet {
        return;
    }
    println!(
        "{} is {}",
        field,
        ctx.formatter.state_label(session.classify(field))
    );
    for warning in session.warnings(field) {
        println!("{}", ctx.formatter.warning(warning));
    }
}

async fn close(ctx: &Context, session: CliSession) -> Result<()> {
    match session.close().await {
        Ok(CloseOutcome::Persisted { version }) => {
            println!("{}", ctx.formatter.success(&format!("Saved version {}", version)));
            Ok(())
        }
        Ok(CloseOutcome::Clean | CloseOutcome::AwaitedInFlight { .. }) => Ok(()),
        Err(e) => {
            println!("{}", ctx.formatter.error("Save failed; changes kept as a local draft"));
            Err(e.into())
        }
    }
}
