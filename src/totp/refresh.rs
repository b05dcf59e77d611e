//! Background refresh tasks for live authenticator codes.
//!
//! Each started account gets its own periodic tokio task that recomputes
//! the code and step progress every tick (500 ms by default) and publishes
//! them as a single [`CodeReading`]. A failing account publishes the error
//! sentinel and keeps retrying on the same cadence; it never affects the
//! tasks of other accounts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::totp::core;
use crate::totp::types::{CodeReading, RefreshConfig, TotpAccount, ERROR_CODE};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Task bookkeeping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct RefreshTask {
    handle: JoinHandle<()>,
    reading: Arc<StdMutex<CodeReading>>,
    ticks: Arc<AtomicU64>,
}

/// Cheap cloneable view onto one account's live reading.
#[derive(Debug, Clone)]
pub struct AccountHandle {
    id: String,
    reading: Arc<StdMutex<CodeReading>>,
    ticks: Arc<AtomicU64>,
}

impl AccountHandle {
    /// Id of the account this handle follows.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latest published reading. Code and percentage always come from
    /// the same refresh.
    pub fn reading(&self) -> CodeReading {
        lock_reading(&self.reading).clone()
    }

    /// Number of refreshes performed so far (including the one done
    /// synchronously at start).
    pub fn refresh_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns the per-account refresh tasks.
pub struct RefreshScheduler {
    tasks: Mutex<HashMap<String, RefreshTask>>,
    tick_interval: Duration,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshScheduler {
    /// Scheduler with the default 500 ms cadence.
    pub fn new() -> Self {
        Self::with_config(RefreshConfig::default())
    }

    pub fn with_config(config: RefreshConfig) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            tick_interval: Duration::from_millis(config.tick_interval_ms),
        }
    }

    /// Start (or restart) the refresh task for an account.
    ///
    /// If a task for the same id is already running it is cancelled and
    /// awaited first, so the account never has two tickers. The first
    /// reading is published before this returns.
    pub async fn start(&self, account: TotpAccount) -> AccountHandle {
        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.remove(&account.id) {
            log::debug!("restarting refresh task for account {}", account.id);
            cancel_task(previous).await;
        }

        // Placeholder only: refresh_once below publishes the real value
        // before the cell is shared anywhere.
        let reading = Arc::new(StdMutex::new(CodeReading {
            code: String::new(),
            remaining_percent: 0.0,
        }));
        let ticks = Arc::new(AtomicU64::new(0));
        refresh_once(&account, &reading, &ticks);

        let handle = {
            let account = account.clone();
            let reading = Arc::clone(&reading);
            let ticks = Arc::clone(&ticks);
            let tick_interval = self.tick_interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick_interval);
                // The first tick completes immediately and would double
                // up with the refresh already published above.
                interval.tick().await;
                loop {
                    interval.tick().await;
                    refresh_once(&account, &reading, &ticks);
                }
            })
        };

        log::info!(
            "refresh task started for account {} ({})",
            account.label,
            account.id
        );
        tasks.insert(
            account.id.clone(),
            RefreshTask {
                handle,
                reading: Arc::clone(&reading),
                ticks: Arc::clone(&ticks),
            },
        );
        AccountHandle {
            id: account.id,
            reading,
            ticks,
        }
    }

    /// Stop one account's refresh task. Returns false if no task was
    /// running for that id. After this returns, no further refresh for
    /// the account will run.
    pub async fn stop(&self, id: &str) -> bool {
        let task = self.tasks.lock().await.remove(id);
        match task {
            Some(task) => {
                cancel_task(task).await;
                log::info!("refresh task stopped for account {}", id);
                true
            }
            None => false,
        }
    }

    /// Stop every refresh task. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let drained: Vec<(String, RefreshTask)> =
            self.tasks.lock().await.drain().collect();
        let count = drained.len();
        for (id, task) in drained {
            cancel_task(task).await;
            log::debug!("refresh task stopped for account {}", id);
        }
        if count > 0 {
            log::info!("stopped {} refresh tasks", count);
        }
        count
    }

    /// Latest reading for an account, if its task is running.
    pub async fn reading(&self, id: &str) -> Option<CodeReading> {
        self.tasks
            .lock()
            .await
            .get(id)
            .map(|task| lock_reading(&task.reading).clone())
    }

    /// Whether a refresh task is running for this id.
    pub async fn is_running(&self, id: &str) -> bool {
        self.tasks.lock().await.contains_key(id)
    }

    /// Number of running refresh tasks.
    pub async fn active_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Handle for a running account's task, if any.
    pub async fn handle(&self, id: &str) -> Option<AccountHandle> {
        self.tasks.lock().await.get(id).map(|task| AccountHandle {
            id: id.to_string(),
            reading: Arc::clone(&task.reading),
            ticks: Arc::clone(&task.ticks),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Internals
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Abort the task and wait for it to wind down, so no tick can run
/// after this returns.
async fn cancel_task(task: RefreshTask) {
    task.handle.abort();
    let _ = task.handle.await;
}

/// One refresh: compute the reading (sentinel on failure) and publish
/// it as a single value.
fn refresh_once(account: &TotpAccount, reading: &StdMutex<CodeReading>, ticks: &AtomicU64) {
    let next = match core::reading(account) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("refresh failed for account {}: {}", account.id, e);
            CodeReading::error_sentinel()
        }
    };
    let mut cell = lock_reading(reading);
    if next.code == ERROR_CODE && cell.code != ERROR_CODE {
        log::warn!(
            "account {} ({}) degraded; publishing the error sentinel",
            account.label,
            account.id
        );
    }
    *cell = next;
    ticks.fetch_add(1, Ordering::SeqCst);
}

fn lock_reading(cell: &StdMutex<CodeReading>) -> std::sync::MutexGuard<'_, CodeReading> {
    cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn make_account(label: &str) -> TotpAccount {
        TotpAccount::new(label, RFC_SECRET)
    }

    fn make_broken_account(label: &str) -> TotpAccount {
        TotpAccount::new(label, "NOT!JUST!BASE32")
    }

    // ── Start and cadence ────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn start_publishes_a_reading_immediately() {
        let scheduler = RefreshScheduler::new();
        let handle = scheduler.start(make_account("github")).await;
        let r = handle.reading();
        assert_eq!(r.code.len(), 6);
        assert!(r.code.chars().all(|c| c.is_ascii_digit()));
        assert!(r.remaining_percent > 0.0);
        assert_eq!(handle.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_advance_on_the_configured_cadence() {
        let scheduler = RefreshScheduler::new();
        let handle = scheduler.start(make_account("github")).await;
        tokio::time::sleep(Duration::from_millis(1600)).await;
        // initial + three 500 ms ticks
        assert_eq!(handle.refresh_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_cadence_is_respected() {
        let scheduler = RefreshScheduler::with_config(RefreshConfig {
            tick_interval_ms: 100,
        });
        let handle = scheduler.start(make_account("fast")).await;
        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(handle.refresh_count(), 5);
    }

    // ── Idempotent start ─────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn start_twice_leaves_a_single_ticker() {
        let scheduler = RefreshScheduler::new();
        let account = make_account("github");
        let first = scheduler.start(account.clone()).await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let frozen = first.refresh_count();

        let second = scheduler.start(account).await;
        assert_eq!(scheduler.active_count().await, 1);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        // A leaked first ticker would roughly double this count.
        assert_eq!(second.refresh_count(), 5);
        // The replaced task's state is dead; its count no longer moves.
        assert_eq!(first.refresh_count(), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_picks_up_changed_parameters() {
        let scheduler = RefreshScheduler::new();
        let mut account = make_broken_account("typo");
        let handle = scheduler.start(account.clone()).await;
        assert_eq!(handle.reading().code, ERROR_CODE);

        account.secret = RFC_SECRET.to_string();
        let handle = scheduler.start(account).await;
        assert_ne!(handle.reading().code, ERROR_CODE);
        assert_eq!(scheduler.active_count().await, 1);
    }

    // ── Stop ─────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_the_count_exactly() {
        let scheduler = RefreshScheduler::new();
        let handle = scheduler.start(make_account("github")).await;
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(scheduler.stop(handle.id()).await);
        let frozen = handle.refresh_count();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.refresh_count(), frozen);
        assert!(!scheduler.is_running(handle.id()).await);
        assert!(scheduler.reading(handle.id()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_unknown_id_is_a_no_op() {
        let scheduler = RefreshScheduler::new();
        assert!(!scheduler.stop("no-such-account").await);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_leaves_nothing_running() {
        let scheduler = RefreshScheduler::new();
        let handles = vec![
            scheduler.start(make_account("one")).await,
            scheduler.start(make_account("two")).await,
            scheduler.start(make_broken_account("three")).await,
        ];

        assert_eq!(scheduler.stop_all().await, 3);
        assert_eq!(scheduler.active_count().await, 0);

        let frozen: Vec<u64> = handles.iter().map(|h| h.refresh_count()).collect();
        tokio::time::sleep(Duration::from_secs(3)).await;
        for (handle, count) in handles.iter().zip(frozen) {
            assert_eq!(handle.refresh_count(), count, "account {}", handle.id());
        }
    }

    // ── Failure containment ──────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn failing_account_shows_sentinel_and_keeps_retrying() {
        let scheduler = RefreshScheduler::new();
        let handle = scheduler.start(make_broken_account("typo")).await;
        tokio::time::sleep(Duration::from_millis(1600)).await;

        let r = handle.reading();
        assert_eq!(r.code, ERROR_CODE);
        assert_eq!(r.remaining_percent, 0.0);
        // Still ticking: the task retries rather than dying.
        assert_eq!(handle.refresh_count(), 4);
        assert!(scheduler.is_running(handle.id()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_does_not_disturb_healthy_accounts() {
        let scheduler = RefreshScheduler::new();
        let healthy = scheduler.start(make_account("ok")).await;
        let broken = scheduler.start(make_broken_account("typo")).await;
        tokio::time::sleep(Duration::from_millis(1600)).await;

        assert_eq!(healthy.refresh_count(), 4);
        assert!(healthy.reading().code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(broken.reading().code, ERROR_CODE);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_step_account_degrades_to_sentinel() {
        let scheduler = RefreshScheduler::new();
        let account = make_account("frozen").with_time_step(0);
        let handle = scheduler.start(account).await;
        assert_eq!(handle.reading(), CodeReading::error_sentinel());
    }

    // ── Concurrency and lookup ───────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn concurrent_starts_register_every_account() {
        let scheduler = Arc::new(RefreshScheduler::new());
        let mut joins = Vec::new();
        for i in 0..8 {
            let scheduler = Arc::clone(&scheduler);
            joins.push(tokio::spawn(async move {
                scheduler.start(make_account(&format!("acct-{}", i))).await
            }));
        }
        for join in joins {
            join.await.unwrap();
        }
        assert_eq!(scheduler.active_count().await, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_lookup_matches_start_handle() {
        let scheduler = RefreshScheduler::new();
        let started = scheduler.start(make_account("github")).await;
        let looked_up = scheduler.handle(started.id()).await.unwrap();
        assert_eq!(looked_up.reading(), started.reading());
        assert!(scheduler.handle("missing").await.is_none());
    }
}
