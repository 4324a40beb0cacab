//! Subscription Fetcher (component H). Grounded on the teacher's
//! `BlocklistUpdater` for the reqwest client setup and auto-update loop
//! shape, tightened for conditional GET, at-most-one-concurrent-fetch-
//! per-source, bounded cross-source parallelism, and category merge into
//! a single versioned snapshot via [`RuleStore::swap`].

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::SubscriptionError;
use crate::metrics::Metrics;
use crate::rules::{build_rule_set, RuleSet, RuleStore};

use super::parser::{parse_body, SourceFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceCategory {
    Domestic,
    Intl,
    Ads,
    Malware,
    Custom,
}

impl SourceCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "domestic" => Some(Self::Domestic),
            "intl" => Some(Self::Intl),
            "ads" => Some(Self::Ads),
            "malware" => Some(Self::Malware),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionSource {
    pub id: u64,
    pub name: String,
    pub category: SourceCategory,
    pub url: String,
    pub format: SourceFormat,
    pub enabled: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub last_etag: Option<String>,
    pub last_modified: Option<String>,
    pub error_count: u32,
}

impl SubscriptionSource {
    pub fn new(id: u64, name: impl Into<String>, category: SourceCategory, url: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            url: url.into(),
            format,
            enabled: true,
            last_update: None,
            last_etag: None,
            last_modified: None,
            error_count: 0,
        }
    }
}

struct SourceState {
    source: SubscriptionSource,
    domains: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub running: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub next_sync: Option<DateTime<Utc>>,
    pub success_rate: f64,
}

/// Static suffix lists from process configuration (§10), merged into
/// every snapshot alongside whatever the subscriptions contribute.
#[derive(Debug, Clone, Default)]
pub struct StaticRules {
    pub domestic: Vec<String>,
    pub international: Vec<String>,
    pub ads: Vec<String>,
}

const MAX_ERRORS_DEFAULT: u32 = 10;

pub struct Fetcher {
    client: reqwest::Client,
    store: Arc<RuleStore>,
    metrics: Arc<Metrics>,
    sources: Vec<Arc<AsyncMutex<SourceState>>>,
    static_rules: StaticRules,
    max_concurrent: usize,
    max_errors: u32,
    refresh_interval: Duration,
    syncing: AtomicBool,
    last_sync: SyncMutex<Option<DateTime<Utc>>>,
    successes: AtomicU32,
    attempts: AtomicU32,
}

impl Fetcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<RuleStore>,
        metrics: Arc<Metrics>,
        sources: Vec<SubscriptionSource>,
        static_rules: StaticRules,
        max_concurrent: usize,
        max_errors: u32,
        refresh_interval: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        let sources = sources
            .into_iter()
            .map(|source| Arc::new(AsyncMutex::new(SourceState { source, domains: Vec::new() })))
            .collect();

        Self {
            client,
            store,
            metrics,
            sources,
            static_rules,
            max_concurrent: max_concurrent.max(1),
            max_errors: if max_errors == 0 { MAX_ERRORS_DEFAULT } else { max_errors },
            refresh_interval,
            syncing: AtomicBool::new(false),
            last_sync: SyncMutex::new(None),
            successes: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }

    /// Bypasses the timer and enqueues all enabled sources immediately.
    /// Idempotent: a sync already in progress yields `AlreadyRunning`.
    pub async fn sync_now(self: &Arc<Self>) -> SyncTrigger {
        if self.syncing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return SyncTrigger::AlreadyRunning;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_cycle().await;
            this.syncing.store(false, Ordering::SeqCst);
        });
        SyncTrigger::Started
    }

    pub fn status(&self) -> SyncStatus {
        let attempts = self.attempts.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let last_sync = *self.last_sync.lock();
        SyncStatus {
            running: self.syncing.load(Ordering::Relaxed),
            last_sync,
            next_sync: last_sync.map(|t| t + chrono::Duration::from_std(self.refresh_interval).unwrap_or_default()),
            success_rate: if attempts == 0 { 1.0 } else { successes as f64 / attempts as f64 },
        }
    }

    /// One scheduled pass: fetch every enabled source (bounded
    /// concurrency, at most one fetch in flight per source), then merge
    /// the results into a new snapshot. Bounded to a 5 minute cycle
    /// deadline; sources that don't finish in time are skipped for this
    /// tick and retried on the next.
    async fn run_cycle(&self) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let deadline = tokio::time::Instant::now() + Duration::from_secs(300);

        let mut handles = Vec::new();
        for entry in &self.sources {
            let Ok(guard) = entry.clone().try_lock_owned() else {
                debug!("source fetch already in flight, skipping this tick");
                continue;
            };
            if !guard.source.enabled {
                continue;
            }
            let permit = Arc::clone(&semaphore);
            let client = self.client.clone();
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let max_errors = self.max_errors;
            handles.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.ok();
                let mut guard = guard;
                tokio::time::timeout(remaining, fetch_one(&client, &mut guard, max_errors)).await.ok()
            }));
        }

        // Every attempt that actually ran (not skipped as in-flight) counts
        // toward `GetSyncStatus().success_rate` (§6) and the subscription
        // fetch Prometheus counters (§11); a cycle deadline timeout counts
        // as a failed attempt since the fetch never completed.
        for handle in handles {
            let outcome = handle.await.ok().flatten();
            self.attempts.fetch_add(1, Ordering::Relaxed);
            let success = outcome.unwrap_or(false);
            if success {
                self.successes.fetch_add(1, Ordering::Relaxed);
            }
            self.metrics.record_subscription_result(success);
        }

        self.merge_and_swap().await;
        *self.last_sync.lock() = Some(Utc::now());
    }

    async fn merge_and_swap(&self) {
        let mut domestic = build_rule_set(self.static_rules.domestic.iter().cloned());
        let mut international = build_rule_set(self.static_rules.international.iter().cloned());
        let mut ads = build_rule_set(self.static_rules.ads.iter().cloned());

        for entry in &self.sources {
            let guard = entry.lock().await;
            let bucket: &mut RuleSet = match guard.source.category {
                SourceCategory::Domestic => &mut domestic,
                SourceCategory::Intl => &mut international,
                // Malware and custom lists are block-style lists with no
                // dedicated snapshot bucket; they join the ads bucket,
                // the only other "route away from this" category.
                SourceCategory::Ads | SourceCategory::Malware | SourceCategory::Custom => &mut ads,
            };
            bucket.extend(guard.domains.iter().cloned());
        }

        self.store.swap(domestic, international, ads);
    }

    pub fn sources_snapshot(&self) -> Vec<SubscriptionSource> {
        self.sources
            .iter()
            .filter_map(|s| s.try_lock().ok().map(|g| g.source.clone()))
            .collect()
    }

    /// The dispatcher task: ticks every `refresh_interval`, bypassed only
    /// by an explicit `sync_now` call, stops on shutdown signal.
    pub async fn run_scheduler(self: Arc<Self>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut ticker = interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    info!("subscription refresh tick");
                    self.sync_now().await;
                }
                _ = shutdown.recv() => {
                    info!("subscription fetcher shutting down");
                    break;
                }
            }
        }
    }
}

/// Returns whether the fetch succeeded, for the caller's attempt/success
/// accounting.
async fn fetch_one(client: &reqwest::Client, guard: &mut SourceState, max_errors: u32) -> bool {
    let source_name = guard.source.name.clone();
    match do_fetch(client, &guard.source).await {
        Ok(Some((domains, etag, last_modified))) => {
            guard.domains = domains;
            guard.source.last_etag = etag;
            guard.source.last_modified = last_modified;
            guard.source.last_update = Some(Utc::now());
            guard.source.error_count = 0;
            true
        }
        Ok(None) => {
            // 304 Not Modified: keep previous content, mark success.
            guard.source.last_update = Some(Utc::now());
            guard.source.error_count = 0;
            true
        }
        Err(err) => {
            warn!(source = %source_name, error = %err, "subscription fetch failed");
            guard.source.error_count += 1;
            if guard.source.error_count >= max_errors {
                warn!(source = %source_name, "auto-disabling source after repeated failures");
                guard.source.enabled = false;
            }
            false
        }
    }
}

/// `Ok(Some(..))` on fresh content, `Ok(None)` on 304, `Err` otherwise.
async fn do_fetch(
    client: &reqwest::Client,
    source: &SubscriptionSource,
) -> Result<Option<(Vec<String>, Option<String>, Option<String>)>, SubscriptionError> {
    let mut request = client.get(&source.url);
    if let Some(etag) = &source.last_etag {
        request = request.header(reqwest::header::IF_NONE_MATCH, etag);
    }
    if let Some(last_modified) = &source.last_modified {
        request = request.header(reqwest::header::IF_MODIFIED_SINCE, last_modified);
    }

    let response = request
        .send()
        .await
        .map_err(|e| SubscriptionError::Fetch(e.to_string()))?;

    if response.status() == reqwest::StatusCode::NOT_MODIFIED {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(SubscriptionError::Fetch(format!("http status {}", response.status())));
    }

    let etag = response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let last_modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response
        .text()
        .await
        .map_err(|e| SubscriptionError::Fetch(e.to_string()))?;

    let domains = parse_body(&body, source.format);
    if domains.is_empty() && !body.trim().is_empty() {
        return Err(SubscriptionError::Parse("no valid domains extracted".into()));
    }

    Ok(Some((domains, etag, last_modified)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sync_now_is_idempotent_while_running() {
        let store = Arc::new(RuleStore::new(crate::rules::RuleSnapshot {
            domestic: RuleSet::new(),
            international: RuleSet::new(),
            ads: RuleSet::new(),
            version: 0,
        }));
        let fetcher = Arc::new(Fetcher::new(
            store,
            Arc::new(Metrics::new().unwrap()),
            vec![],
            StaticRules::default(),
            4,
            10,
            Duration::from_secs(21_600),
        ));
        fetcher.syncing.store(true, Ordering::SeqCst);
        assert_eq!(fetcher.sync_now().await, SyncTrigger::AlreadyRunning);
        fetcher.syncing.store(false, Ordering::SeqCst);
    }

    #[test]
    fn source_category_parses_known_names() {
        assert_eq!(SourceCategory::parse("malware"), Some(SourceCategory::Malware));
        assert_eq!(SourceCategory::parse("bogus"), None);
    }

    /// A failing source must move `attempts` and leave `successes` behind,
    /// so `GetSyncStatus().success_rate` actually reflects failures.
    #[tokio::test]
    async fn failed_fetch_is_reflected_in_sync_status_success_rate() {
        let store = Arc::new(RuleStore::new(crate::rules::RuleSnapshot {
            domestic: RuleSet::new(),
            international: RuleSet::new(),
            ads: RuleSet::new(),
            version: 0,
        }));
        let source = SubscriptionSource::new(
            1,
            "broken",
            SourceCategory::Ads,
            "http://127.0.0.1:0/does-not-exist",
            SourceFormat::Plain,
        );
        let fetcher = Arc::new(Fetcher::new(
            store,
            Arc::new(Metrics::new().unwrap()),
            vec![source],
            StaticRules::default(),
            1,
            10,
            Duration::from_secs(21_600),
        ));

        fetcher.run_cycle().await;

        let status = fetcher.status();
        assert_eq!(fetcher.attempts.load(Ordering::Relaxed), 1);
        assert_eq!(fetcher.successes.load(Ordering::Relaxed), 0);
        assert_eq!(status.success_rate, 0.0);
    }
}
