//! The marketplace poll loop.
//!
//! Each cycle long-polls the market room, classifies new timeline events,
//! and schedules a delayed trigger for every interested buyer. The loop
//! runs until its [`StopHandle`] fires.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clawlist_matrix::{MatrixClient, MatrixError, SyncFilter, SYNC_TIMEOUT_MS};
use clawlist_types::{BuyerProfile, RoomEvent};
use rand::Rng;
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};

use crate::dispatch::{Dispatcher, Trigger};
use crate::error::PollerError;
use crate::listing::is_listing;
use crate::state::PollerState;

/// Characters of a listing body included in log lines.
const LOG_EXCERPT_CHARS: usize = 60;

/// What happens to scheduled-but-unsent triggers when the poller stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Pending triggers keep running after the loop exits. Callers that own
    /// the runtime should wait on [`InFlightTriggers::wait_idle`] before
    /// dropping it.
    #[default]
    Detach,
    /// Pending triggers are aborted when the loop exits.
    AbortPending,
}

/// One batch of new timeline events plus the cursor that follows it.
#[derive(Debug, Clone, Default)]
pub struct SyncBatch {
    pub next_batch: String,
    pub events: Vec<RoomEvent>,
}

/// Where the poller reads the market room from.
pub trait TimelineSource: Send + Sync + 'static {
    fn next_batch(
        &self,
        since: Option<&str>,
    ) -> impl Future<Output = Result<SyncBatch, MatrixError>> + Send;
}

/// [`TimelineSource`] backed by a homeserver `/sync` long-poll.
#[derive(Debug, Clone)]
pub struct MatrixTimeline {
    client: MatrixClient,
    room_id: String,
    filter: SyncFilter,
}

impl MatrixTimeline {
    pub fn new(client: MatrixClient, room_id: impl Into<String>, timeline_limit: u32) -> Self {
        let room_id = room_id.into();
        Self {
            client,
            filter: SyncFilter::for_room(room_id.clone(), timeline_limit),
            room_id,
        }
    }
}

impl TimelineSource for MatrixTimeline {
    async fn next_batch(&self, since: Option<&str>) -> Result<SyncBatch, MatrixError> {
        let response = self.client.sync(since, &self.filter, SYNC_TIMEOUT_MS).await?;
        Ok(SyncBatch {
            events: response.room_events(&self.room_id),
            next_batch: response.next_batch,
        })
    }
}

/// Cloneable handle that stops a running poller.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl StopHandle {
    /// Requests the loop to exit. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        self.wake.notified().await;
    }
}

/// Shared count of scheduled triggers that have not finished, whether they
/// completed, failed, or were aborted.
#[derive(Debug, Clone, Default)]
pub struct InFlightTriggers {
    inner: Arc<InFlightInner>,
}

#[derive(Debug, Default)]
struct InFlightInner {
    count: AtomicUsize,
    idle: Notify,
}

/// Held by a trigger task; releases its slot when the task ends or is
/// dropped by an abort.
struct InFlightGuard(Arc<InFlightInner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl InFlightTriggers {
    fn enter(&self) -> InFlightGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&self.inner))
    }

    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Resolves once no trigger is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.count() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Timing and persistence settings for a [`Poller`].
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub room_id: String,
    pub state_file: PathBuf,
    pub poll_interval: Duration,
    /// Inclusive lower bound of the per-trigger delay.
    pub delay_min: Duration,
    /// Exclusive upper bound of the per-trigger delay.
    pub delay_max: Duration,
    pub shutdown: ShutdownPolicy,
}

/// Counts from one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub events: usize,
    pub listings: usize,
    pub scheduled: usize,
}

/// Watches the market room and schedules buyer triggers.
pub struct Poller<S, D> {
    source: S,
    dispatcher: Arc<D>,
    buyers: Vec<BuyerProfile>,
    settings: PollerSettings,
    state: PollerState,
    stop: StopHandle,
    pending: Vec<AbortHandle>,
    in_flight: InFlightTriggers,
}

impl<S: TimelineSource, D: Dispatcher> Poller<S, D> {
    pub fn new(
        source: S,
        dispatcher: D,
        buyers: Vec<BuyerProfile>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            source,
            dispatcher: Arc::new(dispatcher),
            buyers,
            settings,
            state: PollerState::default(),
            stop: StopHandle::default(),
            pending: Vec::new(),
            in_flight: InFlightTriggers::default(),
        }
    }

    /// Loads persisted state from the configured file. Any failure is
    /// logged and leaves the poller with empty state.
    pub fn load_state(&mut self) {
        match PollerState::load(&self.settings.state_file) {
            Ok(state) => {
                tracing::info!(
                    seen = state.seen.len(),
                    has_cursor = state.next_batch.is_some(),
                    "loaded poller state"
                );
                self.state = state;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %self.settings.state_file.display(),
                    "failed to load poller state, starting fresh"
                );
                self.state = PollerState::default();
            }
        }
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Tracker of every trigger this poller has scheduled.
    pub fn in_flight(&self) -> InFlightTriggers {
        self.in_flight.clone()
    }

    /// Runs one cycle: sync, process events, persist.
    ///
    /// On a read failure nothing changes: the cursor is not advanced and
    /// the state file is not rewritten. A persistence failure after a
    /// successful read is logged, and the in-memory state is kept.
    pub async fn poll_once(&mut self) -> Result<CycleReport, PollerError> {
        let batch = self
            .source
            .next_batch(self.state.next_batch.as_deref())
            .await?;
        Ok(self.apply_batch(batch))
    }

    fn apply_batch(&mut self, batch: SyncBatch) -> CycleReport {
        self.state.next_batch = Some(batch.next_batch);

        let mut report = CycleReport {
            events: batch.events.len(),
            ..CycleReport::default()
        };
        for event in &batch.events {
            if let Some(scheduled) = self.process_event(event) {
                report.listings += 1;
                report.scheduled += scheduled.len();
            }
        }

        self.state.last_poll_ms = chrono::Utc::now().timestamp_millis();
        if let Err(e) = self.state.save(&self.settings.state_file) {
            tracing::error!(
                error = %e,
                path = %self.settings.state_file.display(),
                "failed to persist poller state"
            );
        }
        self.pending.retain(|handle| !handle.is_finished());
        report
    }

    /// Classifies one event and schedules triggers for interested buyers.
    ///
    /// The event id is marked seen before any scheduling, so a repeated id
    /// never produces a second trigger. Returns `None` for events that are
    /// skipped or are not listings, and the scheduled task handles
    /// otherwise.
    pub fn process_event(&mut self, event: &RoomEvent) -> Option<Vec<JoinHandle<()>>> {
        if self.state.is_seen(&event.event_id) {
            return None;
        }
        if !event.is_message() || event.body.trim().is_empty() {
            return None;
        }
        self.state.mark_seen(&event.event_id);

        if !is_listing(&event.body) {
            return None;
        }
        let excerpt: String = event.body.chars().take(LOG_EXCERPT_CHARS).collect();
        tracing::info!(event_id = %event.event_id, excerpt = %excerpt, "new listing detected");

        let interested: Vec<BuyerProfile> = self
            .buyers
            .iter()
            .filter(|buyer| buyer.matches(&event.body))
            .cloned()
            .collect();
        Some(
            interested
                .iter()
                .map(|buyer| self.schedule(buyer, event))
                .collect(),
        )
    }

    fn schedule(&mut self, buyer: &BuyerProfile, event: &RoomEvent) -> JoinHandle<()> {
        let delay = self.random_delay();
        let trigger = Trigger::for_listing(buyer, &self.settings.room_id, event);
        let dispatcher = Arc::clone(&self.dispatcher);
        let slot = self.in_flight.enter();
        tracing::info!(
            profile = %buyer.profile,
            delay_secs = delay.as_secs(),
            "buyer interested, scheduling trigger"
        );

        let handle = tokio::spawn(async move {
            let _slot = slot;
            tokio::time::sleep(delay).await;
            let profile = trigger.profile.clone();
            match dispatcher.dispatch(trigger).await {
                Ok(()) => tracing::info!(profile = %profile, "triggered buyer agent"),
                Err(e) => tracing::error!(profile = %profile, error = %e, "trigger failed"),
            }
        });
        if self.settings.shutdown == ShutdownPolicy::AbortPending {
            self.pending.push(handle.abort_handle());
        }
        handle
    }

    fn random_delay(&self) -> Duration {
        let min = self.settings.delay_min;
        let max = self.settings.delay_max;
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..max)
    }

    /// Number of triggers tracked for abort on shutdown.
    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|h| !h.is_finished()).count()
    }

    /// Polls until stopped, then returns the tracker of triggers that may
    /// still be pending.
    ///
    /// A stop request interrupts both the long-poll and the inter-cycle
    /// sleep; an interrupted long-poll changes no state.
    pub async fn run(mut self) -> InFlightTriggers {
        tracing::info!(
            interval_ms = self.settings.poll_interval.as_millis() as u64,
            buyers = self.buyers.len(),
            room = %self.settings.room_id,
            "starting poller"
        );
        let stop = self.stop.clone();

        while !stop.is_stopped() {
            let since = self.state.next_batch.clone();
            let read = tokio::select! {
                read = self.source.next_batch(since.as_deref()) => Some(read),
                () = stop.wait() => None,
            };

            match read {
                Some(Ok(batch)) => {
                    let report = self.apply_batch(batch);
                    tracing::debug!(
                        events = report.events,
                        listings = report.listings,
                        scheduled = report.scheduled,
                        "poll cycle complete"
                    );
                }
                Some(Err(e)) if e.is_transient() => {
                    tracing::warn!(error = %e, "poll failed, retrying next interval");
                }
                Some(Err(e)) => tracing::error!(error = %e, "poll failed"),
                None => break,
            }

            if stop.is_stopped() {
                break;
            }
            tokio::select! {
                () = tokio::time::sleep(self.settings.poll_interval) => {}
                () = stop.wait() => {}
            }
        }

        if self.settings.shutdown == ShutdownPolicy::AbortPending {
            let aborted = self.pending_count();
            for handle in self.pending.drain(..) {
                handle.abort();
            }
            tracing::info!(aborted, "poller stopped, pending triggers aborted");
        } else {
            tracing::info!(pending = self.in_flight.count(), "poller stopped");
        }
        self.in_flight
    }
}
