//! Show and check commands.

use crate::cli::ShowArgs;
use crate::config::OutputFormat;
use crate::context::{parse_record, Context};
use crate::error::Result;
use keel_domain::{DraftStore, FieldId, FieldRegistry, Snapshot};
use keel_gatekeeper::Gatekeeper;

/// Show every field of a record with its display state.
pub fn execute_show(args: ShowArgs, ctx: &Context) -> Result<()> {
    let record = parse_record(&args.record)?;
    let stored = ctx.load_version(record, args.version.as_deref())?;
    let snapshot = &stored.snapshot;

    println!(
        "{}",
        ctx.formatter
            .format_fields(snapshot, &ctx.registry, args.touched)?
    );

    if ctx.formatter.format() == OutputFormat::Table {
        println!(
            "Version {} ({}), {}% complete",
            stored.version_number,
            stored.id,
            snapshot.completeness_percent(&ctx.registry)
        );
        let drafts = ctx.drafts()?;
        if drafts.get(&ctx.config.session.draft_key(record))?.is_some() {
            println!("{}", ctx.formatter.info("An unsaved local draft exists for this record"));
        }
    }
    Ok(())
}

/// Run the consistency checks over every filled field.
pub fn execute_check(args: ShowArgs, ctx: &Context) -> Result<()> {
    let record = parse_record(&args.record)?;
    let stored = ctx.load_version(record, args.version.as_deref())?;
    let issues = collect_issues(&ctx.gatekeeper(), &ctx.registry, &stored.snapshot)?;
    println!("{}", ctx.formatter.format_issues(&issues)?);
    Ok(())
}

/// Warnings per filled field, fields without warnings omitted.
pub fn collect_issues(
    gatekeeper: &Gatekeeper,
    registry: &FieldRegistry,
    snapshot: &Snapshot,
) -> Result<Vec<(FieldId, Vec<String>)>> {
    let mut issues = Vec::new();
    for spec in registry.fields() {
        let Some(value) = snapshot.value(&spec.id) else {
            continue;
        };
        let result = gatekeeper.validate(
            &spec.id,
            Some(value),
            snapshot,
            snapshot.provenance(&spec.id),
        )?;
        if !result.is_clean() {
            issues.push((spec.id.clone(), result.warnings()));
        }
    }
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_domain::FieldValue;
    use keel_gatekeeper::lending::{lending_registry, LOAN_AMOUNT, STABILIZED_VALUE, TARGET_LTV};
    use std::sync::Arc;

    #[test]
    fn test_collect_issues() {
        let registry = Arc::new(lending_registry().unwrap());
        let gatekeeper = Gatekeeper::default_config(Arc::clone(&registry));

        let mut snapshot = Snapshot::new();
        snapshot.record_user_edit(&LOAN_AMOUNT.into(), Some(FieldValue::Currency(900_000.0)));
        snapshot.record_user_edit(&STABILIZED_VALUE.into(), Some(FieldValue::Currency(2_000_000.0)));
        snapshot.record_user_edit(&TARGET_LTV.into(), Some(FieldValue::Percent(45.0)));
        assert!(collect_issues(&gatekeeper, &registry, &snapshot).unwrap().is_empty());

        snapshot.record_user_edit(&TARGET_LTV.into(), Some(FieldValue::Percent(90.0)));
        let issues = collect_issues(&gatekeeper, &registry, &snapshot).unwrap();
        assert_eq!(
            issues,
            vec![(
                FieldId::from(TARGET_LTV),
                vec!["LTV 90% exceeds policy max 80%".to_string()]
            )]
        );
    }
}
