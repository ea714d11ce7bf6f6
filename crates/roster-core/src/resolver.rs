//! Source precedence and freshness resolution.
//!
//! A resolution pass renders the cached roster (if fresh), then races the
//! snapshot and live fetches, rendering each result that raises the
//! confidence of what is on screen. Lower-confidence results that arrive
//! late are dropped, so the display never regresses from live to snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{RosterSource, SourceError};
use crate::cache::CacheManager;
use crate::models::{RosterEntry, SourceTag};
use crate::utils::{Clock, SystemClock};

/// How long the loading state may last before a timeout notice is shown.
pub const DEFAULT_LOADING_TIMEOUT: Duration = Duration::from_secs(60);

pub const LOADING_TIMEOUT_MESSAGE: &str = "Still loading contacts... please check your connection.";

pub const EXHAUSTED_MESSAGE: &str = "Failed to load contacts (no backend, no snapshot available).";

/// Status label shown once every source has failed.
pub const FAILED_LABEL: &str = "Failed";

/// Receives renders from a resolution pass.
pub trait RosterObserver {
    /// A roster from `tag` is now the best available.
    fn on_data(&mut self, entries: &[RosterEntry], tag: SourceTag, label: &str);

    /// Nothing has rendered within the loading timeout. Fetches continue.
    fn on_timeout(&mut self, _message: &str) {}

    /// No source produced data. Called at most once per pass.
    fn on_exhausted(&mut self);
}

/// Observer events for channel-based consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverEvent {
    Data {
        entries: Vec<RosterEntry>,
        tag: SourceTag,
        label: String,
    },
    TimedOut(String),
    Exhausted,
}

impl RosterObserver for mpsc::UnboundedSender<ResolverEvent> {
    fn on_data(&mut self, entries: &[RosterEntry], tag: SourceTag, label: &str) {
        let event = ResolverEvent::Data {
            entries: entries.to_vec(),
            tag,
            label: label.to_string(),
        };
        if self.send(event).is_err() {
            debug!("Resolver event dropped - receiver closed");
        }
    }

    fn on_timeout(&mut self, message: &str) {
        if self.send(ResolverEvent::TimedOut(message.to_string())).is_err() {
            debug!("Resolver event dropped - receiver closed");
        }
    }

    fn on_exhausted(&mut self) {
        if self.send(ResolverEvent::Exhausted).is_err() {
            debug!("Resolver event dropped - receiver closed");
        }
    }
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The highest-confidence source that rendered.
    Resolved(SourceTag),
    /// Cache, snapshot and live all came up empty.
    Exhausted,
}

/// Orchestrates the cache, snapshot and live sources.
///
/// `resolve` takes `&self`; share the resolver behind an `Arc` to re-run it
/// while another pass is still in flight. Cache writes are last-writer-wins.
pub struct SourceResolver {
    cache: CacheManager,
    snapshot: Arc<dyn RosterSource>,
    live: Arc<dyn RosterSource>,
    clock: Arc<dyn Clock>,
    loading_timeout: Duration,
}

impl SourceResolver {
    pub fn new(
        cache: CacheManager,
        snapshot: Arc<dyn RosterSource>,
        live: Arc<dyn RosterSource>,
    ) -> Self {
        Self {
            cache,
            snapshot,
            live,
            clock: Arc::new(SystemClock),
            loading_timeout: DEFAULT_LOADING_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_loading_timeout(mut self, timeout: Duration) -> Self {
        self.loading_timeout = timeout;
        self
    }

    /// Run one resolution pass, reporting renders to `observer`.
    pub async fn resolve<O>(&self, observer: &mut O) -> Resolution
    where
        O: RosterObserver + ?Sized,
    {
        let mut best: Option<SourceTag> = None;

        if let Some((entries, label)) = self.read_cache() {
            info!(count = entries.len(), "Rendering cached roster");
            observer.on_data(&entries, SourceTag::Cache, &label);
            best = Some(SourceTag::Cache);
        }

        let mut snapshot = self.snapshot.fetch();
        let mut live = self.live.fetch();
        let deadline = tokio::time::sleep(self.loading_timeout);
        tokio::pin!(deadline);

        let mut snapshot_done = false;
        let mut live_done = false;
        // A cached render already ends the loading state.
        let mut deadline_done = best.is_some();

        while !(snapshot_done && live_done) {
            tokio::select! {
                result = &mut snapshot, if !snapshot_done => {
                    snapshot_done = true;
                    let name = self.snapshot.name();
                    self.accept(SourceTag::Snapshot, name, result, &mut best, observer);
                }
                result = &mut live, if !live_done => {
                    live_done = true;
                    self.accept(SourceTag::Live, self.live.name(), result, &mut best, observer);
                }
                () = &mut deadline, if !deadline_done => {
                    deadline_done = true;
                    if best.is_none() {
                        warn!(
                            timeout_secs = self.loading_timeout.as_secs(),
                            "No roster source has resolved yet"
                        );
                        observer.on_timeout(LOADING_TIMEOUT_MESSAGE);
                    }
                }
            }
        }

        match best {
            Some(tag) => {
                info!(source = %tag, "Roster resolved");
                Resolution::Resolved(tag)
            }
            None => {
                warn!("All roster sources exhausted");
                observer.on_exhausted();
                Resolution::Exhausted
            }
        }
    }

    fn read_cache(&self) -> Option<(Vec<RosterEntry>, String)> {
        match self.cache.load_roster(self.clock.now()) {
            Ok(Some(record)) if !record.data.is_empty() => {
                let label = SourceTag::Cache.status_label(record.cached_at());
                Some((record.data, label))
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Ignoring unusable roster cache");
                None
            }
        }
    }

    /// Render and persist `result` if it raises confidence over `best`.
    fn accept<O>(
        &self,
        tag: SourceTag,
        source: &str,
        result: Result<Vec<RosterEntry>, SourceError>,
        best: &mut Option<SourceTag>,
        observer: &mut O,
    ) where
        O: RosterObserver + ?Sized,
    {
        let entries = match result {
            Ok(entries) if !entries.is_empty() => entries,
            Ok(_) => {
                warn!(source = source, "Source returned no entries");
                return;
            }
            Err(e) if e.is_network() => {
                warn!(source = source, error = %e, "Source unreachable");
                return;
            }
            Err(e) => {
                warn!(source = source, error = %e, "Source returned an unusable payload");
                return;
            }
        };

        if let Some(current) = *best {
            if current >= tag {
                debug!(source = source, current = %current, "Dropping lower-confidence result");
                return;
            }
        }

        let now = self.clock.now();
        info!(source = source, count = entries.len(), "Rendering roster");
        observer.on_data(&entries, tag, &tag.status_label(now));
        *best = Some(tag);

        if let Err(e) = self.cache.save_roster(&entries, now) {
            warn!(source = source, error = %e, "Failed to cache roster");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
