//! Records and history commands.

use crate::cli::RecordArgs;
use crate::context::{parse_record, Context};
use crate::error::Result;

/// List every record with a stored version.
pub fn execute_records(ctx: &Context) -> Result<()> {
    let records = ctx.store.records()?;
    println!("{}", ctx.formatter.format_records(&records)?);
    Ok(())
}

/// Show a record's version history, newest first.
pub fn execute_history(args: RecordArgs, ctx: &Context) -> Result<()> {
    let record = parse_record(&args.record)?;
    let history = ctx.store.history(record)?;
    println!("{}", ctx.formatter.format_history(&history)?);
    Ok(())
}
