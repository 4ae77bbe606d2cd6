//! Shared crawl state
//!
//! One `CrawlState` instance is shared by every worker in a run. It owns the
//! frontier queue, the visited-URL set, the fetched-page queue, the shared
//! counters, and the output sink, and it is the only place any of them are
//! touched; workers never mutate shared data directly.
//!
//! Each resource has its own lock so contention on one cannot block the
//! others. Both queues are unbounded: producers never block on push, which
//! rules out the cross-push stall where downloaders wait on a full page queue
//! while extractors wait on a full frontier.
//!
//! Termination uses in-flight accounting rather than queue-emptiness
//! snapshots. A worker claims an item under the queue lock (incrementing the
//! in-flight count before the lock is released) and calls [`CrawlState::finish_item`]
//! only after every push that item produced. The drain predicate (both
//! queues empty and nothing in flight) therefore cannot fire while any
//! worker still holds work that could produce more.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::{watch, Notify};
use url::Url;

use crate::state::CrawlPhase;
use crate::storage::{ExtractedRecord, RecordWriter, StorageResult};

/// A downloaded page awaiting extraction
///
/// Produced by a downloader worker, consumed exactly once by an extractor.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Normalized URL the page was fetched from
    pub url: Url,

    /// HTTP status code of the response
    pub status: u16,

    /// Raw response body
    pub body: String,
}

/// Shared state for one crawl run
pub struct CrawlState {
    frontier: Mutex<VecDeque<Url>>,
    visited: Mutex<HashSet<String>>,
    pages: Mutex<VecDeque<FetchedPage>>,

    /// Items popped from a queue but not yet finished by their worker
    in_flight: AtomicUsize,

    downloaded: AtomicU64,
    parsed: AtomicU64,

    phase: Mutex<CrawlPhase>,

    url_ready: Notify,
    page_ready: Notify,
    stop_tx: watch::Sender<bool>,

    writer: RecordWriter,
}

impl CrawlState {
    pub fn new(writer: RecordWriter) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            frontier: Mutex::new(VecDeque::new()),
            visited: Mutex::new(HashSet::new()),
            pages: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
            downloaded: AtomicU64::new(0),
            parsed: AtomicU64::new(0),
            phase: Mutex::new(CrawlPhase::Idle),
            url_ready: Notify::new(),
            page_ready: Notify::new(),
            stop_tx,
            writer,
        }
    }

    // ===== Frontier and visited set =====

    /// Inserts every not-yet-visited URL into the visited set and frontier
    ///
    /// The visited-set check, insert, and enqueue happen per URL under the
    /// locks as one unit, so two workers pushing overlapping link sets can
    /// never enqueue the same URL twice. This is the invariant the rest of
    /// the pipeline leans on: one URL, one download, one record.
    ///
    /// Returns how many URLs were actually enqueued.
    pub fn push_urls(&self, urls: Vec<Url>) -> usize {
        let mut fresh = 0;
        {
            let mut visited = self.visited.lock().expect("visited lock poisoned");
            let mut frontier = self.frontier.lock().expect("frontier lock poisoned");
            for url in urls {
                if visited.insert(url.as_str().to_string()) {
                    frontier.push_back(url);
                    fresh += 1;
                }
            }
        }
        for _ in 0..fresh {
            self.url_ready.notify_one();
        }
        fresh
    }

    /// Returns true if the URL has already been scheduled or completed
    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited
            .lock()
            .expect("visited lock poisoned")
            .contains(url.as_str())
    }

    /// Pops the next URL to download, waiting until one is available
    ///
    /// Returns `None` once the crawl is stopping and the frontier is empty;
    /// that is the worker's signal to exit its loop.
    pub async fn pop_url(&self) -> Option<Url> {
        loop {
            let mut stop_rx = self.stop_tx.subscribe();
            {
                let mut frontier = self.frontier.lock().expect("frontier lock poisoned");
                if let Some(url) = frontier.pop_front() {
                    // Claim before releasing the lock so a concurrent drain
                    // check can never see empty queues with this item unowned.
                    self.in_flight.fetch_add(1, Ordering::SeqCst);
                    if !frontier.is_empty() {
                        self.url_ready.notify_one();
                    }
                    return Some(url);
                }
            }
            if *stop_rx.borrow() {
                return None;
            }
            tokio::select! {
                _ = self.url_ready.notified() => {}
                _ = stop_rx.changed() => {}
            }
        }
    }

    // ===== Page queue =====

    /// Enqueues a fetched page for extraction; never blocks, never drops
    pub fn push_page(&self, page: FetchedPage) {
        self.pages
            .lock()
            .expect("page queue lock poisoned")
            .push_back(page);
        self.page_ready.notify_one();
    }

    /// Pops the next fetched page, waiting until one is available
    ///
    /// Returns `None` once the crawl is stopping and the queue is empty.
    pub async fn pop_page(&self) -> Option<FetchedPage> {
        loop {
            let mut stop_rx = self.stop_tx.subscribe();
            {
                let mut pages = self.pages.lock().expect("page queue lock poisoned");
                if let Some(page) = pages.pop_front() {
                    self.in_flight.fetch_add(1, Ordering::SeqCst);
                    if !pages.is_empty() {
                        self.page_ready.notify_one();
                    }
                    return Some(page);
                }
            }
            if *stop_rx.borrow() {
                return None;
            }
            tokio::select! {
                _ = self.page_ready.notified() => {}
                _ = stop_rx.changed() => {}
            }
        }
    }

    // ===== Output and counters =====

    /// Appends one record to the output sink
    pub fn append_record(&self, record: &ExtractedRecord) -> StorageResult<()> {
        self.writer.append(record)
    }

    /// Increments the downloaded-pages counter, returning the new total
    pub fn record_downloaded(&self) -> u64 {
        self.downloaded.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Increments the parsed-records counter, returning the new total
    pub fn record_parsed(&self) -> u64 {
        self.parsed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn downloaded_total(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    pub fn parsed_total(&self) -> u64 {
        self.parsed.load(Ordering::SeqCst)
    }

    /// Number of distinct URLs ever scheduled
    pub fn visited_count(&self) -> usize {
        self.visited.lock().expect("visited lock poisoned").len()
    }

    // ===== Lifecycle =====

    /// Marks the item a worker popped earlier as fully processed
    ///
    /// Must be called after all pushes the item produced. When the last
    /// in-flight item finishes with both queues empty, the crawl drains.
    pub fn finish_item(&self) {
        let prev = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "finish_item without a matching pop");
        if prev == 1 && self.is_drained() {
            tracing::info!("frontier and page queue drained, stopping workers");
            self.begin_drain();
        }
    }

    /// True iff no queued work exists and no worker holds an item
    pub fn is_drained(&self) -> bool {
        let frontier_empty = self.frontier.lock().expect("frontier lock poisoned").is_empty();
        let pages_empty = self.pages.lock().expect("page queue lock poisoned").is_empty();
        frontier_empty && pages_empty && self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Requests a cooperative stop before natural drain (fatal errors only)
    ///
    /// Workers finish their current item and exit; queued work is abandoned.
    pub fn request_stop(&self) {
        tracing::warn!("early stop requested, abandoning queued work");
        self.begin_drain();
    }

    fn begin_drain(&self) {
        self.advance(CrawlPhase::Draining);
        self.stop_tx.send_replace(true);
    }

    /// True once workers should stop pulling new work
    pub fn is_stopping(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> CrawlPhase {
        *self.phase.lock().expect("phase lock poisoned")
    }

    /// Advances the lifecycle phase, ignoring backward transitions
    ///
    /// Phases only move forward; a late Draining after Stopped (two workers
    /// racing to report drain) is a no-op rather than a regression.
    pub fn advance(&self, to: CrawlPhase) {
        let mut phase = self.phase.lock().expect("phase lock poisoned");
        let current = *phase;
        if to > current {
            tracing::debug!(from = %current, to = %to, "crawl phase transition");
            *phase = to;
        }
    }
}
