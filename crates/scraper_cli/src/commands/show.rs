//! Show command - Print a session's messages.

use anyhow::Result;
use clap::Args;

use super::{resolve_session, Context};
use crate::render;

#[derive(Args)]
pub struct ShowArgs {
    /// Session id or id prefix; defaults to the current session
    id: Option<String>,
}

pub async fn execute(ctx: &Context, args: ShowArgs) -> Result<()> {
    let storage = ctx.storage();

    let session = match args.id {
        Some(id) => resolve_session(&storage, &id)?,
        None => match storage.current_session() {
            Some(session) => session,
            None => {
                println!("No current session");
                return Ok(());
            }
        },
    };

    println!("💬 {}", session.title);
    println!();
    if session.messages.is_empty() {
        println!("   (no messages yet)");
    }
    for message in &session.messages {
        render::print_message(message);
    }
    Ok(())
}
