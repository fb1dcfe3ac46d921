//! Conversation controller.
//!
//! Runs one request/response cycle per `submit`:
//!
//! ```text
//! Idle -> AwaitingClassification -> (Sourcing) -> AwaitingReply -> Idle
//! ```
//!
//! The user message is stored first, the request is classified, sourced
//! requests run the source pipeline, and after a short thinking pause the
//! reply source answers. Whatever happens, the turn ends back in `Idle`.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::{ChatConfig, PipelineTiming};
use crate::feed::{RunHandle, SnapshotSink, SourceFeed, SourceSnapshot};
use crate::input::normalize_input;
use crate::intent::{IntentClassifier, KeywordClassifier};
use crate::pipeline::SourceStatusPipeline;
use crate::reply::{ReplyRequest, ReplySource, REPLY_FAILURE_NOTICE};
use crate::scheduler::Scheduler;
use crate::storage::ChatStorageManager;
use crate::types::{Message, NewMessage, ScrapedSource};

/// Where a turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingClassification,
    Sourcing,
    AwaitingReply,
}

impl TurnPhase {
    /// The typing indicator is shown for every phase but `Idle`
    pub fn is_typing(self) -> bool {
        self != TurnPhase::Idle
    }
}

/// How a submitted turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Empty input; nothing was stored
    Rejected,
    Completed {
        user: Message,
        assistant: Message,
    },
    /// The reply source failed; a failure notice took the reply's place
    Failed {
        user: Message,
        notice: Message,
        error: String,
    },
}

impl TurnOutcome {
    /// Sources attached to the assistant reply, if any
    pub fn sources(&self) -> &[ScrapedSource] {
        match self {
            Self::Completed { assistant, .. } => assistant.sources.as_deref().unwrap_or(&[]),
            _ => &[],
        }
    }
}

/// Resets the phase to `Idle` however the turn ends, including when the
/// turn future is dropped mid-way.
struct IdleOnDrop(Arc<watch::Sender<TurnPhase>>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(TurnPhase::Idle);
    }
}

/// Fans pipeline snapshots out to the feed and the optional observer
struct TurnSink<'a> {
    feed: &'a SourceFeed,
    observer: Option<&'a mpsc::UnboundedSender<SourceSnapshot>>,
}

impl SnapshotSink for TurnSink<'_> {
    fn emit(&mut self, snapshot: SourceSnapshot) {
        self.feed.publish(snapshot.run_id, &snapshot.sources);
        if let Some(observer) = self.observer {
            let _ = observer.send(snapshot);
        }
    }
}

/// Orchestrates conversation turns over the chat store
pub struct ConversationController {
    storage: ChatStorageManager,
    classifier: Arc<dyn IntentClassifier>,
    replies: Arc<dyn ReplySource>,
    pipeline: SourceStatusPipeline,
    feed: SourceFeed,
    scheduler: Arc<dyn Scheduler>,
    timing: PipelineTiming,
    phase: Arc<watch::Sender<TurnPhase>>,
    observer: Option<mpsc::UnboundedSender<SourceSnapshot>>,
}

impl ConversationController {
    pub fn new(
        storage: ChatStorageManager,
        replies: Arc<dyn ReplySource>,
        scheduler: Arc<dyn Scheduler>,
        timing: PipelineTiming,
    ) -> Self {
        let (phase, _rx) = watch::channel(TurnPhase::Idle);
        Self {
            storage,
            classifier: Arc::new(KeywordClassifier::default()),
            replies,
            pipeline: SourceStatusPipeline::new(scheduler.clone(), timing.clone()),
            feed: SourceFeed::new(),
            scheduler,
            timing,
            phase: Arc::new(phase),
            observer: None,
        }
    }

    /// Controller wired from configuration
    pub fn from_config(
        config: &ChatConfig,
        storage: ChatStorageManager,
        replies: Arc<dyn ReplySource>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self::new(storage, replies, scheduler, config.timing.clone())
            .with_classifier(Arc::new(KeywordClassifier::from_config(config)))
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Receive every snapshot of every run, in emission order
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<SourceSnapshot>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn storage(&self) -> &ChatStorageManager {
        &self.storage
    }

    /// Session management (create, switch, delete) between turns
    pub fn storage_mut(&mut self) -> &mut ChatStorageManager {
        &mut self.storage
    }

    /// The visible source set; clone it to cancel or close from elsewhere
    pub fn feed(&self) -> &SourceFeed {
        &self.feed
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<TurnPhase> {
        self.phase.subscribe()
    }

    pub fn is_typing(&self) -> bool {
        self.phase().is_typing()
    }

    /// Run one turn for `raw` user input
    pub async fn submit(&mut self, raw: &str) -> TurnOutcome {
        let Some(text) = normalize_input(raw) else {
            debug!("Ignoring empty input");
            return TurnOutcome::Rejected;
        };

        let _idle = IdleOnDrop(self.phase.clone());
        self.phase.send_replace(TurnPhase::AwaitingClassification);

        let user = self.storage.add_message(NewMessage::user(&text));

        let intent = self.classifier.classify(&text);
        let mut run: Option<RunHandle> = None;
        let mut sources = Vec::new();

        if intent.has_sources() {
            self.phase.send_replace(TurnPhase::Sourcing);
            info!(keywords = ?intent.matched, sources = intent.templates.len(), "Sourced request");

            let handle = self.feed.begin_run();
            let mut sink = TurnSink {
                feed: &self.feed,
                observer: self.observer.as_ref(),
            };
            let result = self.pipeline.run(intent.materialize(), &handle, &mut sink).await;
            sources = result.sources;
            run = Some(handle);
        }

        self.phase.send_replace(TurnPhase::AwaitingReply);
        self.scheduler.sleep(self.timing.thinking_delay()).await;

        let request = ReplyRequest::new(text.clone()).with_sources(sources.clone());
        match self.replies.produce_reply(&request).await {
            Ok(reply) => {
                let assistant = self
                    .storage
                    .add_message(NewMessage::assistant(reply.text).with_sources(sources));

                if let Some(handle) = &run {
                    self.feed
                        .arm_cleanup(handle.id(), self.timing.cleanup_window(), self.scheduler.clone());
                }

                TurnOutcome::Completed { user, assistant }
            }
            Err(e) => {
                warn!(error = %e, "Reply production failed");

                if let Some(handle) = &run {
                    if self.feed.is_current(handle.id()) {
                        self.feed.close();
                    }
                }

                let notice = self.storage.add_message(NewMessage::assistant(REPLY_FAILURE_NOTICE));
                TurnOutcome::Failed {
                    user,
                    notice,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::persistence::MemoryStore;
    use crate::reply::{MockReplySource, Reply};
    use crate::scheduler::{InstantScheduler, TokioScheduler};
    use crate::types::{MessageRole, SourceStatus};
    use std::time::Duration;

    fn controller_with<S: Scheduler + 'static>(replies: MockReplySource, scheduler: Arc<S>) -> ConversationController {
        let storage = ChatStorageManager::open(Arc::new(MemoryStore::new()));
        ConversationController::new(storage, Arc::new(replies), scheduler, PipelineTiming::default())
    }

    fn replying(text: &'static str) -> MockReplySource {
        let mut mock = MockReplySource::new();
        mock.expect_produce_reply().returning(move |_| Ok(Reply::new(text)));
        mock
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let mut mock = MockReplySource::new();
        mock.expect_produce_reply().never();
        let mut controller = controller_with(mock, Arc::new(InstantScheduler::new()));

        assert_eq!(controller.submit("   \n").await, TurnOutcome::Rejected);
        assert!(controller.storage().is_empty());
        assert_eq!(controller.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn test_plain_turn_skips_pipeline() {
        let scheduler = Arc::new(InstantScheduler::new());
        let mut controller = controller_with(replying("hi!"), scheduler.clone());

        let outcome = controller.submit("hello").await;
        let TurnOutcome::Completed { user, assistant } = outcome else {
            panic!("expected a completed turn");
        };
        assert_eq!(user.content, "hello");
        assert_eq!(assistant.content, "hi!");
        assert_eq!(assistant.role, MessageRole::Assistant);
        assert!(assistant.sources.is_none());

        // Only the thinking delay
        assert_eq!(scheduler.requested(), vec![Duration::from_millis(1000)]);
        assert!(!controller.feed().current().is_visible());
        assert!(!controller.is_typing());
    }

    #[tokio::test]
    async fn test_sourced_turn_attaches_finished_sources() {
        let scheduler = Arc::new(InstantScheduler::new());
        let mut mock = MockReplySource::new();
        mock.expect_produce_reply()
            .withf(|req: &ReplyRequest| {
                req.sources.len() == 2 && req.sources.iter().all(|s| s.status == SourceStatus::Success)
            })
            .times(1)
            .returning(|_| Ok(Reply::new("prices")));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = controller_with(mock, scheduler.clone()).with_observer(tx);

        let outcome = controller
            .submit("Get the price of MacBook from Amazon and Flipkart")
            .await;

        let sources = outcome.sources();
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|s| s.status == SourceStatus::Success));

        let mut snapshots = Vec::new();
        while let Ok(snapshot) = rx.try_recv() {
            snapshots.push(snapshot);
        }
        assert_eq!(snapshots.len(), 3);
        assert!(snapshots[0].sources.iter().all(|s| s.status == SourceStatus::Loading));

        // Feed keeps the final snapshot until the cleanup window elapses
        let feed = controller.feed().current();
        assert!(feed.is_visible());
        assert!(feed.sources.iter().all(|s| s.status == SourceStatus::Success));

        // Two source delays, then the thinking delay
        let delays = scheduler.requested();
        assert_eq!(delays[2], Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_reply_failure_surfaces_notice_and_ends_turn() {
        let mut mock = MockReplySource::new();
        mock.expect_produce_reply()
            .returning(|_| Err(ChatError::ReplyProduction("boom".to_string())));
        let mut controller = controller_with(mock, Arc::new(InstantScheduler::new()));
        let mut phases = controller.subscribe_phase();

        let outcome = controller.submit("price of a phone").await;
        let TurnOutcome::Failed { notice, error, .. } = outcome else {
            panic!("expected a failed turn");
        };
        assert_eq!(notice.content, REPLY_FAILURE_NOTICE);
        assert!(error.contains("boom"));

        assert_eq!(*phases.borrow_and_update(), TurnPhase::Idle);
        assert!(!controller.feed().current().is_visible());

        let session = controller.storage().current_session().unwrap();
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sourced_turn_arms_cleanup() {
        let mut controller = controller_with(replying("prices"), Arc::new(TokioScheduler));

        controller.submit("price of a MacBook on amazon").await;
        assert!(controller.feed().current().is_visible());

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(controller.feed().current().is_visible());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!controller.feed().current().is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_sourced_turn_inside_window_keeps_new_run() {
        let mut controller = controller_with(replying("prices"), Arc::new(TokioScheduler));

        controller.submit("price on amazon").await;
        let first = controller.feed().current().run_id.unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        controller.submit("price on flipkart").await;
        let second = controller.feed().current().run_id.unwrap();
        assert!(second > first);

        // Past the first run's window, inside the second's
        tokio::time::sleep(Duration::from_secs(15)).await;
        let state = controller.feed().current();
        assert_eq!(state.run_id, Some(second));
        assert!(state.is_visible());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!controller.feed().current().is_visible());
    }

    #[tokio::test]
    async fn test_turn_creates_session_implicitly() {
        let mut controller = controller_with(replying("ok"), Arc::new(InstantScheduler::new()));
        controller.submit("hello").await;

        assert_eq!(controller.storage().len(), 1);
        let session = controller.storage().current_session().unwrap();
        assert_eq!(session.title, "hello");
        assert_eq!(session.messages.len(), 2);
    }
}
