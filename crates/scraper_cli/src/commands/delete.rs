//! Delete command - Remove a session.

use anyhow::Result;
use clap::Args;

use super::{resolve_session, Context};

#[derive(Args)]
pub struct DeleteArgs {
    /// Session id or id prefix
    id: String,
}

pub async fn execute(ctx: &Context, args: DeleteArgs) -> Result<()> {
    let mut storage = ctx.storage();
    let session = resolve_session(&storage, &args.id)?;

    storage.delete_session(&session.id);
    println!("🗑️  Deleted \"{}\"", session.title);
    Ok(())
}
