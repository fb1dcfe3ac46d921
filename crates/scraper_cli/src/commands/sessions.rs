//! Sessions command - List chat sessions.

use anyhow::Result;
use clap::Args;

use super::Context;
use crate::render;

#[derive(Args)]
pub struct SessionsArgs {
    /// Only list sessions whose title contains this term
    #[arg(short, long)]
    search: Option<String>,
}

pub async fn execute(ctx: &Context, args: SessionsArgs) -> Result<()> {
    let storage = ctx.storage();
    render::print_sessions(&storage, args.search.as_deref().unwrap_or(""));
    Ok(())
}
