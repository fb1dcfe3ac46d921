//! Send command - One conversation turn.

use anyhow::Result;
use clap::Args;
use tokio::sync::mpsc;
use tracing::info;

use scraper_chat::{ConversationController, SourceSnapshot, TurnOutcome};

use super::Context;
use crate::render;

#[derive(Args)]
pub struct SendArgs {
    /// Message to send
    #[arg(required = true, num_args = 1..)]
    message: Vec<String>,

    /// Start a new session for this message
    #[arg(long)]
    new: bool,
}

/// Submit `text`, handing each snapshot to `on_snapshot` as it arrives.
///
/// Every snapshot of the turn has been handed over before this returns.
pub async fn drive_turn(
    controller: &mut ConversationController,
    snapshots: &mut mpsc::UnboundedReceiver<SourceSnapshot>,
    text: &str,
    mut on_snapshot: impl FnMut(&SourceSnapshot),
) -> TurnOutcome {
    let outcome = {
        let turn = controller.submit(text);
        tokio::pin!(turn);
        loop {
            tokio::select! {
                biased;
                Some(snapshot) = snapshots.recv() => on_snapshot(&snapshot),
                outcome = &mut turn => break outcome,
            }
        }
    };

    while let Ok(snapshot) = snapshots.try_recv() {
        on_snapshot(&snapshot);
    }
    outcome
}

/// Run one turn and print its outcome after its snapshots.
///
/// A failed reply still prints the notice, then reports the error.
pub async fn run_turn(
    controller: &mut ConversationController,
    snapshots: &mut mpsc::UnboundedReceiver<SourceSnapshot>,
    text: &str,
) -> Result<()> {
    match drive_turn(controller, snapshots, text, render::print_snapshot).await {
        TurnOutcome::Rejected => {
            println!("⚠️  Nothing to send");
            Ok(())
        }
        TurnOutcome::Completed { assistant, .. } => {
            render::print_message(&assistant);
            Ok(())
        }
        TurnOutcome::Failed { notice, error, .. } => {
            render::print_message(&notice);
            anyhow::bail!("{}", error)
        }
    }
}

pub async fn execute(ctx: &Context, args: SendArgs) -> Result<()> {
    let (tx, mut snapshots) = mpsc::unbounded_channel();
    let mut controller = ctx.controller()?.with_observer(tx);

    if args.new {
        let id = controller.storage_mut().create_session();
        info!(session_id = %id, "Started new session");
    }

    let text = args.message.join(" ");
    run_turn(&mut controller, &mut snapshots, &text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use scraper_chat::{
        CannedReplySource, ChatStorageManager, InstantScheduler, MemoryStore, PipelineTiming,
    };

    #[tokio::test]
    async fn test_snapshots_delivered_before_outcome() {
        let (tx, mut snapshots) = mpsc::unbounded_channel();
        let mut controller = ConversationController::new(
            ChatStorageManager::open(Arc::new(MemoryStore::new())),
            Arc::new(CannedReplySource),
            Arc::new(InstantScheduler::new()),
            PipelineTiming::immediate(),
        )
        .with_observer(tx);

        let mut seen = Vec::new();
        let outcome = drive_turn(&mut controller, &mut snapshots, "price on amazon", |s| {
            seen.push(s.sequence)
        })
        .await;

        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(snapshots.try_recv().is_err());
    }
}
