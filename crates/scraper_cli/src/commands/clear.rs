//! Clear command - Remove every session.

use anyhow::Result;
use clap::Args;

use super::Context;

#[derive(Args)]
pub struct ClearArgs {
    /// Required to confirm
    #[arg(long)]
    yes: bool,
}

pub async fn execute(ctx: &Context, args: ClearArgs) -> Result<()> {
    let mut storage = ctx.storage();

    if !args.yes {
        println!(
            "⚠️  This deletes {} sessions. Re-run with --yes to confirm.",
            storage.len()
        );
        return Ok(());
    }

    storage.clear_all();
    println!("✅ All sessions cleared");
    Ok(())
}
