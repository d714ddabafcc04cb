//! Notification feed lifecycle tests
//!
//! Drive a [`NotificationFeed`] against the in-memory REST backend and a
//! scripted push channel, covering snapshot replacement, arrival ordering,
//! optimistic clear, detach, and the snapshot/live race.

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use futures_signals::signal::{Signal, SignalExt};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use waybill_app::{FeedError, NotificationFeed};
use waybill_core::{FeedConfig, Notification};
use waybill_transport::testing::{InMemoryApi, LiveSender, ScriptedSource};
use waybill_transport::{
    ConnectionState, LiveHub, NotificationApi, ReconnectPolicy, TransportError,
};

fn n(id: &str, hour: u32) -> Notification {
    Notification::new(
        id,
        format!("Shipment {id}"),
        Utc.with_ymd_and_hms(2024, 2, 1, hour, 0, 0).unwrap(),
    )
}

fn ids(feed: &NotificationFeed) -> Vec<String> {
    feed.items()
        .iter()
        .map(|n| n.id.as_str().to_string())
        .collect()
}

struct Harness {
    api: Arc<InMemoryApi>,
    source: Arc<ScriptedSource>,
    hub: LiveHub,
}

impl Harness {
    fn new(items: Vec<Notification>) -> Self {
        let source = Arc::new(ScriptedSource::new());
        let policy = ReconnectPolicy {
            max_attempts: 1,
            delay: Duration::from_millis(50),
        };
        Self {
            api: Arc::new(InMemoryApi::with_items(items)),
            hub: LiveHub::new(source.clone(), policy, false),
            source,
        }
    }

    fn feed(&self, config: FeedConfig) -> NotificationFeed {
        NotificationFeed::new(self.api.clone(), self.hub.clone(), config)
    }

    fn no_reconcile() -> FeedConfig {
        FeedConfig {
            reconcile_after_clear: false,
            ..FeedConfig::default()
        }
    }
}

async fn until<S, T>(signal: S, what: &str, done: impl Fn(&T) -> bool)
where
    S: Signal<Item = T>,
{
    let mut values = Box::pin(signal.to_stream());
    tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(value) = values.next().await {
            if done(&value) {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

async fn connected(hub: &LiveHub) {
    until(hub.state_signal(), "connection", ConnectionState::is_connected).await;
}

async fn count_is(feed: &NotificationFeed, want: usize) {
    until(feed.count_signal(), "count", |c| *c == want).await;
}

async fn loading(feed: &NotificationFeed) {
    until(feed.loading_signal(), "loading", |l| *l).await;
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_snapshot_live_clear() {
    let h = Harness::new(vec![n("n1", 10)]);
    let live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());

    feed.activate().await.unwrap();
    assert_eq!(ids(&feed), ["n1"]);
    assert_eq!(feed.count(), 1);

    connected(&h.hub).await;
    live.emit(n("n2", 9));
    count_is(&feed, 2).await;
    assert_eq!(ids(&feed), ["n2", "n1"]);

    let gate = h.api.hold_next_clear();
    let clearing = feed.clear_all();
    assert_eq!(feed.count(), 0);
    assert!(feed.items().is_empty());

    gate.send(()).unwrap();
    clearing.await.unwrap();
    assert_eq!(h.api.clear_calls(), 1);
    assert!(h.api.items().is_empty());
    assert_eq!(feed.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_replaces_live_growth() {
    let h = Harness::new(vec![n("n1", 10)]);
    let live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());
    feed.activate().await.unwrap();
    connected(&h.hub).await;

    live.emit(n("n2", 11));
    live.emit(n("n3", 12));
    count_is(&feed, 3).await;

    // Backend emptied out from under the view.
    h.api.clear_all().await.unwrap();

    feed.refresh().await.unwrap();
    assert_eq!(feed.count(), 0);
    assert!(feed.items().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_late_event_goes_first_regardless_of_timestamp() {
    let h = Harness::new(vec![n("today", 12)]);
    let live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());
    feed.activate().await.unwrap();
    connected(&h.hub).await;

    live.emit(n("yesterday", 1));
    live.emit(n("dawn", 2));
    count_is(&feed, 3).await;
    assert_eq!(ids(&feed), ["dawn", "yesterday", "today"]);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_delivery_keeps_one_entry() {
    let h = Harness::new(vec![n("n1", 10)]);
    let live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());
    feed.activate().await.unwrap();
    connected(&h.hub).await;

    live.emit(n("n1", 10).read());
    live.emit(n("n2", 11));
    count_is(&feed, 2).await;

    assert_eq!(ids(&feed), ["n2", "n1"]);
    assert!(feed.items()[1].is_read);
}

#[tokio::test(start_paused = true)]
async fn test_failed_clear_keeps_local_clear_then_reconciles() {
    let h = Harness::new(vec![n("n1", 10), n("n0", 9)]);
    let _live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());
    feed.activate().await.unwrap();

    h.api.fail_next_clear(TransportError::Status {
        status: 500,
        message: "boom".into(),
    });
    let clearing = feed.clear_all();
    assert_eq!(feed.count(), 0);

    let result = clearing.await;
    assert_matches!(result, Err(FeedError::Clear(_)));
    // Backend still holds both, the reconciliation snapshot shows the truth.
    assert_eq!(ids(&feed), ["n1", "n0"]);
    assert_eq!(h.api.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_clear_without_reconcile_stays_empty() {
    let h = Harness::new(vec![n("n1", 10)]);
    let _live = h.source.push_connection();
    let feed = h.feed(Harness::no_reconcile());
    feed.activate().await.unwrap();

    h.api.fail_next_clear(TransportError::Closed);
    assert!(feed.clear_all().await.is_err());
    assert_eq!(feed.count(), 0);
    assert_eq!(h.api.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deactivated_feed_ignores_live_events() {
    let h = Harness::new(Vec::new());
    let live = h.source.push_connection();
    let stays = h.feed(FeedConfig::default());
    let leaves = h.feed(FeedConfig::default());
    stays.activate().await.unwrap();
    leaves.activate().await.unwrap();
    connected(&h.hub).await;
    assert_eq!(h.source.open_count(), 1);
    assert_eq!(h.hub.listener_count(), 2);

    leaves.deactivate();
    assert!(!leaves.is_active());
    live.emit(n("n1", 10));
    count_is(&stays, 1).await;

    assert_eq!(leaves.count(), 0);
    assert_eq!(h.hub.listener_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_last_deactivation_releases_channel() {
    let h = Harness::new(Vec::new());
    let live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());
    feed.activate().await.unwrap();
    connected(&h.hub).await;

    feed.deactivate();
    assert_eq!(feed.live_state(), ConnectionState::Idle);
    live.emit(n("n1", 10));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(feed.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_live_event_during_snapshot_survives() {
    let h = Harness::new(vec![n("s1", 8)]);
    let live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());

    let gate = h.api.hold_next_list();
    let activation = tokio::spawn({
        let feed = feed.clone();
        async move { feed.activate().await }
    });
    loading(&feed).await;
    connected(&h.hub).await;

    live.emit(n("live", 7));
    count_is(&feed, 1).await;

    gate.send(()).unwrap();
    activation.await.unwrap().unwrap();
    assert_eq!(ids(&feed), ["live", "s1"]);
    assert!(!feed.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_started_before_clear_is_discarded() {
    let h = Harness::new(vec![n("old", 8)]);
    let _live = h.source.push_connection();
    let feed = h.feed(Harness::no_reconcile());
    feed.activate().await.unwrap();
    assert_eq!(feed.count(), 1);

    let gate = h.api.hold_next_list();
    let refresh = tokio::spawn({
        let feed = feed.clone();
        async move { feed.refresh().await }
    });
    loading(&feed).await;

    feed.clear_all().await.unwrap();
    gate.send(()).unwrap();
    refresh.await.unwrap().unwrap();

    assert!(feed.items().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_refresh_cannot_roll_back_newer_one() {
    let h = Harness::new(vec![n("s1", 8)]);
    let _live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());
    feed.activate().await.unwrap();

    let gate = h.api.hold_next_list();
    let slow = tokio::spawn({
        let feed = feed.clone();
        async move { feed.refresh().await }
    });
    loading(&feed).await;

    h.api.insert(n("s2", 9));
    feed.refresh().await.unwrap();
    assert_eq!(ids(&feed), ["s2", "s1"]);

    gate.send(()).unwrap();
    slow.await.unwrap().unwrap();
    assert_eq!(ids(&feed), ["s2", "s1"]);
    assert!(!feed.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_after_deactivate_is_discarded() {
    let h = Harness::new(vec![n("s1", 8)]);
    let _live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());

    let gate = h.api.hold_next_list();
    let activation = tokio::spawn({
        let feed = feed.clone();
        async move { feed.activate().await }
    });
    loading(&feed).await;

    feed.deactivate();
    gate.send(()).unwrap();
    activation.await.unwrap().unwrap();
    assert_eq!(feed.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_keeps_listening() {
    let h = Harness::new(Vec::new());
    let live = h.source.push_connection();
    let feed = h.feed(FeedConfig::default());
    h.api.fail_next_list(TransportError::Request("connection reset".into()));

    assert_matches!(feed.activate().await, Err(FeedError::Fetch(_)));
    assert!(feed.is_active());
    assert!(!feed.is_loading());

    connected(&h.hub).await;
    live.emit(n("n1", 10));
    count_is(&feed, 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_requires_activation() {
    let h = Harness::new(Vec::new());
    let feed = h.feed(FeedConfig::default());
    assert_matches!(feed.refresh().await, Err(FeedError::Inactive));
}

#[tokio::test(start_paused = true)]
async fn test_polling_picks_up_backend_changes() {
    let h = Harness::new(vec![n("n1", 10)]);
    let _live = h.source.push_connection();
    let feed = h.feed(FeedConfig {
        poll_interval_secs: 10,
        ..FeedConfig::default()
    });
    feed.activate().await.unwrap();
    assert_eq!(h.api.list_calls(), 1);

    h.api.insert(n("n2", 11));
    count_is(&feed, 2).await;
    assert_eq!(ids(&feed), ["n2", "n1"]);
    assert!(h.api.list_calls() >= 2);

    feed.deactivate();
    let calls = h.api.list_calls();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.api.list_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_gave_up_is_observable() {
    let h = Harness::new(Vec::new());
    h.source
        .push_refusal(TransportError::ConnectionFailed("refused".into()));
    let feed = h.feed(FeedConfig::default());
    feed.activate().await.unwrap();

    until(feed.live_state_signal(), "give up", |s| {
        *s == ConnectionState::GaveUp
    })
    .await;
    assert!(feed.is_active());
}

#[derive(Debug, Clone)]
enum Step {
    Live(u8),
    Clear,
    Refresh,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0u8..16).prop_map(Step::Live),
        1 => Just(Step::Clear),
        1 => Just(Step::Refresh),
    ]
}

async fn drain(live: &LiveSender, feed: &NotificationFeed, marker: &mut u32) {
    // A marker event with a fresh id proves everything before it was applied.
    *marker += 1;
    let id = format!("marker-{marker}");
    live.emit(Notification::new(id.as_str(), "marker", Utc::now()));
    until(feed.items_signal(), "marker", |items: &Vec<Notification>| {
        items.first().is_some_and(|n| n.id.as_str() == id)
    })
    .await;
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_count_always_matches_list(steps in prop::collection::vec(step(), 1..25)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        rt.block_on(async {
            let h = Harness::new(vec![n("seed", 1)]);
            let live = h.source.push_connection();
            let feed = h.feed(FeedConfig::default());
            feed.activate().await.unwrap();
            connected(&h.hub).await;
            let mut marker = 0;

            for step in steps {
                match step {
                    Step::Live(i) => {
                        live.emit(n(&format!("e{i}"), 3));
                        drain(&live, &feed, &mut marker).await;
                    }
                    Step::Clear => {
                        feed.clear_all().await.unwrap();
                    }
                    Step::Refresh => {
                        feed.refresh().await.unwrap();
                    }
                }

                let items = feed.items();
                prop_assert_eq!(feed.count(), items.len());
                let unique: std::collections::HashSet<_> =
                    items.iter().map(|n| n.id.clone()).collect();
                prop_assert_eq!(unique.len(), items.len());
            }
            Ok(())
        })?;
    }
}
