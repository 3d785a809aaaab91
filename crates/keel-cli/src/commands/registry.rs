//! Registry command implementation.

use crate::cli::RegistryArgs;
use crate::context::Context;
use crate::error::Result;

/// Print the field registry.
pub fn execute_registry(args: RegistryArgs, ctx: &Context) -> Result<()> {
    if args.toml {
        print!("{}", ctx.registry.to_toml()?);
    } else {
        println!("{}", ctx.formatter.format_registry(&ctx.registry)?);
    }
    Ok(())
}
