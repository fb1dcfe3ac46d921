//! Switch command - Make a session current.

use anyhow::Result;
use clap::Args;

use super::{resolve_session, Context};

#[derive(Args)]
pub struct SwitchArgs {
    /// Session id or id prefix
    id: String,
}

pub async fn execute(ctx: &Context, args: SwitchArgs) -> Result<()> {
    let mut storage = ctx.storage();
    let session = resolve_session(&storage, &args.id)?;

    storage.set_current_session(&session.id);
    println!("➡️  Switched to \"{}\"", session.title);
    Ok(())
}
