//! Integration tests for the backfill walker, shared ingestion, and
//! heartbeat against a vector-backed history source and an in-memory store.

use async_trait::async_trait;
use futures::StreamExt;
use rollcall_database::{DiscoveryLog, LedgerRepository, ServerIdentity};
use rollcall_error::{GatewayError, GatewayErrorKind, GatewayResult};
use rollcall_scan::{
    Actor, BackfillWalker, Heartbeat, HistoryMessage, HistorySource, MessageStream,
    ReactionSummary, WalkOutcome, ingest_message, sweep_roster,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Vector-backed history source with scriptable failure modes.
#[derive(Default)]
struct MockSource {
    channels: HashMap<i64, Vec<HistoryMessage>>,
    reactors: HashMap<(i64, String), Vec<Actor>>,
    forbidden: HashSet<i64>,
    missing: HashSet<i64>,
    /// Yield a transient stream error after this many items.
    fail_after: Mutex<Option<usize>>,
    failing_emoji: Option<String>,
    /// Every message id actually pulled off a history stream.
    delivered: Arc<Mutex<Vec<i64>>>,
}

impl MockSource {
    fn channel(mut self, channel_id: i64, mut messages: Vec<HistoryMessage>) -> Self {
        // Stored unsorted on purpose; the source contract is ascending delivery.
        messages.sort_by_key(|m| m.id);
        self.channels.insert(channel_id, messages);
        self
    }

    fn reactors(mut self, message_id: i64, emoji: &str, users: Vec<Actor>) -> Self {
        self.reactors.insert((message_id, emoji.to_string()), users);
        self
    }

    fn delivered(&self) -> Vec<i64> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistorySource for MockSource {
    async fn history(
        &self,
        channel_id: i64,
        after: Option<i64>,
    ) -> GatewayResult<MessageStream<'_>> {
        if self.forbidden.contains(&channel_id) {
            return Err(GatewayError::new(GatewayErrorKind::Forbidden));
        }
        if self.missing.contains(&channel_id) {
            return Err(GatewayError::new(GatewayErrorKind::NotFound));
        }
        let cutoff = after.unwrap_or(i64::MIN);
        let mut items: Vec<GatewayResult<HistoryMessage>> = self
            .channels
            .get(&channel_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| m.id > cutoff)
                    .cloned()
                    .map(Ok)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(n) = self.fail_after.lock().unwrap().take() {
            items.truncate(n);
            items.push(Err(GatewayError::new(GatewayErrorKind::Connection(
                "socket reset".into(),
            ))));
        }
        let delivered = Arc::clone(&self.delivered);
        let stream = futures::stream::iter(items).inspect(move |item| {
            if let Ok(message) = item {
                delivered.lock().unwrap().push(message.id);
            }
        });
        Ok(stream.boxed())
    }

    async fn reaction_users(
        &self,
        _channel_id: i64,
        message_id: i64,
        emoji: &str,
    ) -> GatewayResult<Vec<Actor>> {
        if self.failing_emoji.as_deref() == Some(emoji) {
            return Err(GatewayError::new(GatewayErrorKind::RateLimited));
        }
        Ok(self
            .reactors
            .get(&(message_id, emoji.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

fn setup() -> (tempfile::TempDir, LedgerRepository) {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = DiscoveryLog::new(dir.path().join("logs.txt"));
    let ledger = LedgerRepository::open(":memory:", log).expect("open ledger");
    (dir, ledger)
}

fn hub() -> ServerIdentity {
    ServerIdentity::new(700, "Hub")
}

fn message(id: i64, author: Actor) -> HistoryMessage {
    HistoryMessage {
        id,
        author,
        reactions: Vec::new(),
    }
}

fn with_reaction(mut message: HistoryMessage, emoji: &str) -> HistoryMessage {
    message.reactions.push(ReactionSummary {
        emoji: emoji.to_string(),
    });
    message
}

fn log_lines(ledger: &LedgerRepository) -> usize {
    std::fs::read_to_string(ledger.discovery_log().path())
        .map(|body| body.lines().count())
        .unwrap_or(0)
}

const CH: i64 = 10;

#[tokio::test]
async fn fresh_channel_walk_visits_each_item_once_oldest_first() {
    let (_dir, ledger) = setup();
    let source = MockSource::default().channel(
        CH,
        vec![
            message(5, Actor::human(2, "bob")),
            message(1, Actor::human(1, "alice")),
            message(9, Actor::human(3, "carol")),
        ],
    );
    let walker = BackfillWalker::new(&source, &ledger, hub());

    let outcome = walker.walk_channel(CH).await;

    assert_eq!(outcome, WalkOutcome::Completed { messages: 3 });
    assert_eq!(source.delivered(), vec![1, 5, 9]);
    assert_eq!(ledger.checkpoint(CH).await.unwrap(), Some(9));
    assert_eq!(ledger.count_users().await.unwrap(), 3);
    assert_eq!(log_lines(&ledger), 3);
}

#[tokio::test]
async fn resume_visits_only_items_after_checkpoint() {
    let (_dir, ledger) = setup();
    let source = MockSource::default().channel(
        CH,
        vec![
            message(1, Actor::human(1, "alice")),
            message(5, Actor::human(2, "bob")),
            message(9, Actor::human(3, "carol")),
        ],
    );
    ledger.set_checkpoint(CH, 5).await.unwrap();
    let walker = BackfillWalker::new(&source, &ledger, hub());

    let outcome = walker.walk_channel(CH).await;

    assert_eq!(outcome, WalkOutcome::Completed { messages: 1 });
    assert_eq!(source.delivered(), vec![9]);
    assert_eq!(ledger.count_users().await.unwrap(), 1);
    let hits = ledger.search_users("carol").await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn replay_from_same_checkpoint_is_idempotent() {
    let (_dir, ledger) = setup();
    let source = MockSource::default().channel(
        CH,
        vec![
            message(1, Actor::human(1, "alice")),
            message(5, Actor::human(2, "bob")),
        ],
    );
    let walker = BackfillWalker::new(&source, &ledger, hub());

    walker.walk_channel(CH).await;
    // Rewind the cursor and replay the identical history.
    ledger.set_checkpoint(CH, 0).await.unwrap();
    let outcome = walker.walk_channel(CH).await;

    assert_eq!(outcome, WalkOutcome::Completed { messages: 2 });
    assert_eq!(ledger.count_users().await.unwrap(), 2);
    assert_eq!(log_lines(&ledger), 2);
    assert_eq!(ledger.checkpoint(CH).await.unwrap(), Some(5));
}

#[tokio::test]
async fn drained_channel_walks_to_empty_completion() {
    let (_dir, ledger) = setup();
    let source = MockSource::default().channel(CH, vec![message(1, Actor::human(1, "alice"))]);
    let walker = BackfillWalker::new(&source, &ledger, hub());

    walker.walk_channel(CH).await;
    let outcome = walker.walk_channel(CH).await;

    assert_eq!(outcome, WalkOutcome::Completed { messages: 0 });
    assert_eq!(source.delivered(), vec![1]);
}

#[tokio::test]
async fn forbidden_channel_abandons_without_touching_checkpoint() {
    let (_dir, ledger) = setup();
    let mut source = MockSource::default().channel(CH, vec![message(1, Actor::human(1, "alice"))]);
    source.forbidden.insert(CH);
    ledger.set_checkpoint(CH, 42).await.unwrap();
    let walker = BackfillWalker::new(&source, &ledger, hub());

    let outcome = walker.walk_channel(CH).await;

    assert_eq!(
        outcome,
        WalkOutcome::Abandoned {
            messages: 0,
            reason: rollcall_scan::AbandonReason::Forbidden
        }
    );
    assert_eq!(ledger.checkpoint(CH).await.unwrap(), Some(42));
    assert_eq!(ledger.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_channel_is_skipped_and_sweep_continues() {
    let (_dir, ledger) = setup();
    let mut source = MockSource::default()
        .channel(CH, vec![message(1, Actor::human(1, "alice"))])
        .channel(11, vec![message(2, Actor::human(2, "bob"))]);
    source.missing.insert(CH);
    let walker = BackfillWalker::new(&source, &ledger, hub());

    let total = walker.walk_channels(&[CH, 11]).await;

    assert_eq!(total, 1);
    assert_eq!(ledger.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn transient_stream_error_resumes_from_last_ingested_item() {
    let (_dir, ledger) = setup();
    let source = MockSource::default().channel(
        CH,
        vec![
            message(1, Actor::human(1, "alice")),
            message(2, Actor::human(2, "bob")),
            message(3, Actor::human(3, "carol")),
            message(4, Actor::human(4, "dave")),
        ],
    );
    *source.fail_after.lock().unwrap() = Some(2);
    let walker = BackfillWalker::new(&source, &ledger, hub());

    let outcome = walker.walk_channel(CH).await;
    assert_eq!(
        outcome,
        WalkOutcome::Abandoned {
            messages: 2,
            reason: rollcall_scan::AbandonReason::Transient
        }
    );
    assert_eq!(ledger.checkpoint(CH).await.unwrap(), Some(2));

    // Next run picks up where the checkpoint left off; nothing is revisited.
    let outcome = walker.walk_channel(CH).await;
    assert_eq!(outcome, WalkOutcome::Completed { messages: 2 });
    assert_eq!(source.delivered(), vec![1, 2, 3, 4]);
    assert_eq!(ledger.count_users().await.unwrap(), 4);
    assert_eq!(log_lines(&ledger), 4);
}

#[tokio::test(start_paused = true)]
async fn failed_reaction_enumeration_skips_that_reaction_only() {
    let (_dir, ledger) = setup();
    let mut source = MockSource::default()
        .channel(
            CH,
            vec![with_reaction(
                with_reaction(message(1, Actor::human(1, "alice")), "👍"),
                "💥",
            )],
        )
        .reactors(1, "👍", vec![Actor::human(2, "bob")]);
    source.failing_emoji = Some("💥".to_string());
    let walker = BackfillWalker::new(&source, &ledger, hub());

    let outcome = walker.walk_channel(CH).await;

    assert_eq!(outcome, WalkOutcome::Completed { messages: 1 });
    assert_eq!(ledger.count_users().await.unwrap(), 2);
    assert_eq!(ledger.checkpoint(CH).await.unwrap(), Some(1));
}

#[tokio::test]
async fn automated_actors_never_reach_the_ledger() {
    let (_dir, ledger) = setup();
    let source = MockSource::default()
        .channel(
            CH,
            vec![
                with_reaction(message(1, Actor::automated(50, "helper-bot")), "👍"),
                message(2, Actor::human(1, "alice")),
            ],
        )
        .reactors(
            1,
            "👍",
            vec![Actor::human(2, "bob"), Actor::automated(51, "mod-bot")],
        );
    let walker = BackfillWalker::new(&source, &ledger, hub());

    walker.walk_channel(CH).await;
    sweep_roster(
        &ledger,
        &hub(),
        &[Actor::human(3, "carol"), Actor::automated(52, "boost-bot")],
        "is a booster",
    )
    .await;

    assert_eq!(ledger.count_users().await.unwrap(), 3);
    assert!(ledger.search_users("bot").await.unwrap().is_empty());
    // The automated author's message still advances the checkpoint.
    assert_eq!(ledger.checkpoint(CH).await.unwrap(), Some(2));
}

#[tokio::test]
async fn duplicate_delivery_of_processed_message_adds_nothing() {
    let (_dir, ledger) = setup();
    let m1 = with_reaction(message(31, Actor::human(1, "u1")), "🎉");
    let source = MockSource::default()
        .channel(CH, vec![m1.clone()])
        .reactors(31, "🎉", vec![Actor::human(2, "u2")]);
    let walker = BackfillWalker::new(&source, &ledger, hub());

    walker.walk_channel(CH).await;
    // A live handler re-delivers the same message after the backfill.
    ingest_message(&source, &ledger, &hub(), CH, &m1).await;
    ledger.advance_checkpoint(CH, m1.id).await.unwrap();

    assert_eq!(ledger.count_users().await.unwrap(), 2);
    assert_eq!(log_lines(&ledger), 2);
    assert_eq!(ledger.checkpoint(CH).await.unwrap(), Some(31));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_ticks_until_guard_released() {
    let (_dir, ledger) = setup();
    let guard = Heartbeat::spawn(ledger.clone(), Duration::from_millis(50));

    tokio::time::sleep(Duration::from_millis(120)).await;
    // shutdown resolves only if the task observes the latch and exits
    guard.shutdown().await;
}
