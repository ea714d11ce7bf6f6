use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::board::{build_board, duty_date, duty_key, OnCallBoard, ScheduleError};
use crate::api::HttpSource;
use crate::cache::CacheManager;
use crate::models::RawRows;
use crate::resolver::DEFAULT_LOADING_TIMEOUT;
use crate::utils::{Clock, SystemClock};

pub const BOARD_TIMEOUT_MESSAGE: &str =
    "Server is taking too long to respond. Showing last cached data (if available)...";

/// The two sheets a board is built from, cached together per duty date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetPair {
    pub timetable: RawRows,
    pub contacts: RawRows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardOrigin {
    /// Fetched from the backend at this time ("last updated").
    Live(DateTime<Utc>),
    /// Served from the cache written at this time.
    Cache(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedBoard {
    pub board: OnCallBoard,
    pub origin: BoardOrigin,
}

/// Receives boards from a load, cached first and then live.
pub trait BoardObserver {
    fn on_board(&mut self, loaded: &LoadedBoard);

    /// Nothing has rendered within the loading timeout. Fetches continue.
    fn on_timeout(&mut self, _message: &str) {}

    /// The load ended without a live board and nothing cached was shown.
    fn on_failure(&mut self, error: &ScheduleError);
}

/// Renders today's cached board straight away, then replaces it with the
/// board built from freshly fetched sheets.
pub struct BoardLoader {
    timetable: HttpSource,
    contacts: HttpSource,
    cache: CacheManager,
    clock: Arc<dyn Clock>,
    loading_timeout: Duration,
}

impl BoardLoader {
    pub fn new(timetable: HttpSource, contacts: HttpSource, cache: CacheManager) -> Self {
        Self {
            timetable,
            contacts,
            cache,
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

    fn cache_key(date_key: &str) -> String {
        format!("schedule_{}", date_key)
    }

    fn cached_board(
        &self,
        cache_key: &str,
        date_key: &str,
        now: DateTime<Utc>,
    ) -> Option<LoadedBoard> {
        let record = match self.cache.load::<SheetPair>(cache_key, now) {
            Ok(record) => record?,
            Err(e) => {
                warn!(error = %e, "Ignoring unusable schedule cache");
                return None;
            }
        };
        match build_board(&record.data.timetable, &record.data.contacts, date_key) {
            Ok(board) => Some(LoadedBoard {
                board,
                origin: BoardOrigin::Cache(record.cached_at()),
            }),
            Err(e) => {
                warn!(error = %e, "Cached schedule has no board for today");
                None
            }
        }
    }

    /// Load the board for the current duty date.
    ///
    /// Returns the last board rendered: the live one when the sheets load,
    /// otherwise the cached one.
    pub async fn load<O>(&self, observer: &mut O) -> Result<LoadedBoard, ScheduleError>
    where
        O: BoardObserver + ?Sized,
    {
        let now = self.clock.now();
        let date_key = duty_key(duty_date(now.with_timezone(&Local).naive_local()));
        let cache_key = Self::cache_key(&date_key);
        info!(date = %date_key, "Loading on-call board");

        let cached = self.cached_board(&cache_key, &date_key, now);
        if let Some(loaded) = &cached {
            info!("Rendering cached board");
            observer.on_board(loaded);
        }

        let fetch = futures::future::join(self.timetable.fetch_rows(), self.contacts.fetch_rows());
        tokio::pin!(fetch);
        let deadline = tokio::time::sleep(self.loading_timeout);
        tokio::pin!(deadline);
        let mut deadline_done = cached.is_some();

        let (timetable, contacts) = loop {
            tokio::select! {
                sheets = &mut fetch => break sheets,
                () = &mut deadline, if !deadline_done => {
                    deadline_done = true;
                    warn!(timeout_secs = self.loading_timeout.as_secs(), "Schedule still loading");
                    observer.on_timeout(BOARD_TIMEOUT_MESSAGE);
                }
            }
        };

        match (timetable, contacts) {
            (Ok(timetable), Ok(contacts)) => {
                let sheets = SheetPair { timetable, contacts };
                let fetched_at = self.clock.now();
                if let Err(e) = self.cache.save(&cache_key, &sheets, fetched_at) {
                    warn!(error = %e, "Failed to cache schedule sheets");
                }
                match build_board(&sheets.timetable, &sheets.contacts, &date_key) {
                    Ok(board) => {
                        let loaded = LoadedBoard {
                            board,
                            origin: BoardOrigin::Live(fetched_at),
                        };
                        observer.on_board(&loaded);
                        Ok(loaded)
                    }
                    Err(e) => {
                        observer.on_failure(&e);
                        Err(e)
                    }
                }
            }
            (timetable, contacts) => {
                let reason = [("timetable", timetable.err()), ("contacts", contacts.err())]
                    .into_iter()
                    .filter_map(|(name, err)| err.map(|e| format!("{}: {}", name, e)))
                    .collect::<Vec<_>>()
                    .join("; ");
                error!(reason = %reason, "One or both schedule sheets failed to load");

                match cached {
                    Some(loaded) => Ok(loaded),
                    None => {
                        let err = ScheduleError::Unavailable(reason);
                        observer.on_failure(&err);
                        Err(err)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;
    use tokio::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::cache::MemoryStore;
    use crate::utils::FixedClock;

    #[derive(Default)]
    struct Recorder {
        boards: Vec<(LoadedBoard, Instant)>,
        timeouts: usize,
        failures: Vec<ScheduleError>,
    }

    impl BoardObserver for Recorder {
        fn on_board(&mut self, loaded: &LoadedBoard) {
            self.boards.push((loaded.clone(), Instant::now()));
        }

        fn on_timeout(&mut self, _message: &str) {
            self.timeouts += 1;
        }

        fn on_failure(&mut self, error: &ScheduleError) {
            self.failures.push(error.clone());
        }
    }

    impl Recorder {
        fn origins(&self) -> Vec<BoardOrigin> {
            self.boards.iter().map(|(b, _)| b.origin).collect()
        }
    }

    /// Noon local time keeps the duty date on the same calendar day.
    fn noon() -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn today_key() -> String {
        duty_key(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    fn loader(server: &MockServer, cache: CacheManager) -> BoardLoader {
        let timetable = HttpSource::new(
            "timetable",
            &format!("{}/timetable", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let contacts = timetable.sibling("contacts", &format!("{}/contacts", server.uri()));
        BoardLoader::new(timetable, contacts, cache).with_clock(Arc::new(FixedClock(noon())))
    }

    async fn mount_sheets(server: &MockServer, delay: Duration) {
        Mock::given(method("GET"))
            .and(path("/timetable"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "values": [["DATE", "MEDICAL"], [today_key(), "Dr. A"]]
                    }))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [["MEDICAL NAME", "MEDICAL PHONE"], ["Dr. A", "0111"]]
            })))
            .mount(server)
            .await;
    }

    fn seed_cache(cache: &CacheManager, doctor: &str, written: DateTime<Utc>) {
        let sheets = SheetPair {
            timetable: vec![
                vec!["DATE".into(), "MEDICAL".into()],
                vec![today_key(), doctor.into()],
            ],
            contacts: Vec::new(),
        };
        cache
            .save(&BoardLoader::cache_key(&today_key()), &sheets, written)
            .unwrap();
    }

    #[tokio::test]
    async fn test_live_load_caches_sheets() {
        let server = MockServer::start().await;
        mount_sheets(&server, Duration::ZERO).await;
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));

        let mut observer = Recorder::default();
        let loaded = loader(&server, cache.clone()).load(&mut observer).await.unwrap();
        assert_eq!(loaded.origin, BoardOrigin::Live(noon()));
        assert_eq!(loaded.board.departments[0].groups[0].doctors[0].phone, "0111");
        assert_eq!(observer.origins(), vec![BoardOrigin::Live(noon())]);

        let key = BoardLoader::cache_key(&today_key());
        assert!(cache.load::<SheetPair>(&key, noon()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cached_board_renders_before_slow_backend() {
        let server = MockServer::start().await;
        let delay = Duration::from_millis(800);
        mount_sheets(&server, delay).await;
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        let written = noon() - chrono::Duration::hours(2);
        seed_cache(&cache, "Dr. Cached", written);

        let start = Instant::now();
        let mut observer = Recorder::default();
        let loaded = loader(&server, cache).load(&mut observer).await.unwrap();

        assert_eq!(
            observer.origins(),
            vec![BoardOrigin::Cache(written), BoardOrigin::Live(noon())]
        );
        let (cached, cached_at) = &observer.boards[0];
        assert_eq!(cached.board.departments[0].groups[0].doctors[0].name, "Dr. Cached");
        assert!(*cached_at - start < delay);
        assert_eq!(loaded.origin, BoardOrigin::Live(noon()));
        assert_eq!(observer.timeouts, 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_cached_sheets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/timetable"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"values": []})))
            .mount(&server)
            .await;

        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        let written = noon() - chrono::Duration::hours(2);
        seed_cache(&cache, "Dr. A", written);

        let mut observer = Recorder::default();
        let loaded = loader(&server, cache).load(&mut observer).await.unwrap();
        assert_eq!(loaded.origin, BoardOrigin::Cache(written));
        assert_eq!(loaded.board.departments[0].groups[0].doctors[0].name, "Dr. A");
        assert_eq!(observer.origins(), vec![BoardOrigin::Cache(written)]);
        assert!(observer.failures.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_notice_while_backend_is_slow() {
        let server = MockServer::start().await;
        mount_sheets(&server, Duration::from_millis(500)).await;
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));

        let mut observer = Recorder::default();
        let loaded = loader(&server, cache)
            .with_loading_timeout(Duration::from_millis(50))
            .load(&mut observer)
            .await
            .unwrap();

        assert_eq!(observer.timeouts, 1);
        assert_eq!(loaded.origin, BoardOrigin::Live(noon()));
        assert_eq!(observer.origins(), vec![BoardOrigin::Live(noon())]);
    }

    #[tokio::test]
    async fn test_unavailable_without_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        let mut observer = Recorder::default();
        let err = loader(&server, cache).load(&mut observer).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Unavailable(_)));
        assert_eq!(observer.failures, vec![err]);
        assert!(observer.boards.is_empty());
    }
}
