//! The notification scheduler: one recurring tokio task per live
//! subscription, rehydrated from the durable store at startup.
//!
//! Consistency rules:
//! - subscribe writes the store first, then registers the job; a store
//!   failure registers nothing.
//! - unsubscribe cancels the job first, then removes the record; a crash
//!   in between leaves a dangling record that the next startup's
//!   rehydrate turns back into a job, so retrying the stop is safe.
//! - a failing tick never unregisters its job.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    advice::AdviceGenerator,
    error::BotError,
    model::{IdentityKey, Subscription, SubscriptionKind},
    pipeline::{self, Delivery},
    provider::ConditionsProvider,
    store::{AddOutcome, RemoveOutcome, SubscriptionStore},
};

/// Local hour a daily subscription fires at.
const DAILY_ANCHOR_HOUR: u32 = 8;

const HOURLY_PERIOD: Duration = Duration::from_secs(60 * 60);

pub struct NotificationScheduler {
    store: Arc<SubscriptionStore>,
    provider: Arc<dyn ConditionsProvider>,
    advisor: Arc<dyn AdviceGenerator>,
    delivery: Arc<dyn Delivery>,
    jobs: Mutex<HashMap<IdentityKey, JoinHandle<()>>>,
    // Serializes store-mutation-plus-(un)registration so the jobs map
    // mirrors the store even under concurrent commands. Never held
    // across an await.
    ops: Mutex<()>,
}

impl NotificationScheduler {
    pub fn new(
        store: Arc<SubscriptionStore>,
        provider: Arc<dyn ConditionsProvider>,
        advisor: Arc<dyn AdviceGenerator>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            store,
            provider,
            advisor,
            delivery,
            jobs: Mutex::new(HashMap::new()),
            ops: Mutex::new(()),
        }
    }

    /// Register one recurring job per durable record. Called once at
    /// process start; afterwards the registered set always mirrors the
    /// store.
    pub fn rehydrate(&self) -> usize {
        let _ops = self.ops.lock();
        let subs = self.store.load_all();
        let count = subs.len();
        for sub in subs {
            self.register(sub);
        }
        info!(jobs = count, "scheduler rehydrated from store");
        count
    }

    /// Persist the subscription, then register its job. Duplicate
    /// identities register nothing; a store failure registers nothing.
    pub fn subscribe(&self, sub: Subscription) -> Result<AddOutcome, BotError> {
        let _ops = self.ops.lock();
        let outcome = self.store.add(sub.clone()).map_err(BotError::Persistence)?;
        if outcome == AddOutcome::Added {
            self.register(sub);
        }
        Ok(outcome)
    }

    /// Cancel the job, then remove the record. Idempotent: a second call
    /// reports `NotFound`.
    pub fn unsubscribe(&self, key: &IdentityKey) -> Result<RemoveOutcome, BotError> {
        let _ops = self.ops.lock();
        if let Some(handle) = self.jobs.lock().remove(key) {
            handle.abort();
        }
        self.store.remove(key).map_err(BotError::Persistence)
    }

    /// Identity keys of all registered jobs.
    pub fn registered_keys(&self) -> HashSet<IdentityKey> {
        self.jobs.lock().keys().copied().collect()
    }

    /// Stop scheduling. In-flight network calls are not waited for.
    pub fn shutdown(&self) {
        let mut jobs = self.jobs.lock();
        for (_, handle) in jobs.drain() {
            handle.abort();
        }
        info!("scheduler stopped");
    }

    fn register(&self, sub: Subscription) {
        let key = sub.identity();
        let runner = self.runner();
        let handle = tokio::spawn(async move { runner.run(sub).await });

        // The subscribe path guards against duplicates; replacing here
        // keeps at most one job per identity regardless.
        if let Some(old) = self.jobs.lock().insert(key, handle) {
            old.abort();
        }
    }

    fn runner(&self) -> JobRunner {
        JobRunner {
            provider: Arc::clone(&self.provider),
            advisor: Arc::clone(&self.advisor),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

impl std::fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("jobs", &self.jobs.lock().len())
            .finish_non_exhaustive()
    }
}

/// Everything one job task needs; owns its own handles so the task has no
/// back-reference into the scheduler.
struct JobRunner {
    provider: Arc<dyn ConditionsProvider>,
    advisor: Arc<dyn AdviceGenerator>,
    delivery: Arc<dyn Delivery>,
}

impl JobRunner {
    /// A job's whole life is this loop: sleep until the next fire, run one
    /// tick, repeat. The loop structure itself guarantees a subscription's
    /// ticks never overlap.
    async fn run(self, sub: Subscription) {
        match sub.kind {
            SubscriptionKind::Hourly => {
                let mut next = tokio::time::Instant::now() + HOURLY_PERIOD;
                loop {
                    tokio::time::sleep_until(next).await;
                    self.tick(&sub).await;
                    next += HOURLY_PERIOD;
                    // A slow tick skips fires instead of bunching them up.
                    let now = tokio::time::Instant::now();
                    while next <= now {
                        next += HOURLY_PERIOD;
                    }
                }
            }
            SubscriptionKind::Daily => loop {
                let fire = next_daily_fire(Utc::now(), sub.utc_offset_seconds);
                let wait = (fire - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                self.tick(&sub).await;
            },
        }
    }

    /// One fire. Pipeline errors become a best-effort error message to the
    /// chat; nothing here can take the job down.
    async fn tick(&self, sub: &Subscription) {
        debug!(chat_id = sub.chat_id, kind = %sub.kind, "tick");

        if let Err(err) = pipeline::run_tick(
            self.provider.as_ref(),
            self.advisor.as_ref(),
            self.delivery.as_ref(),
            sub,
        )
        .await
        {
            warn!(chat_id = sub.chat_id, error = %err, "tick failed");
            if let Err(send_err) = self.delivery.send(sub.chat_id, &err.user_message()).await {
                warn!(chat_id = sub.chat_id, error = %send_err, "error notification failed too");
            }
        }
    }
}

/// Next UTC instant at which the location's wall clock reads
/// `DAILY_ANCHOR_HOUR`:00, derived from the offset captured at subscribe
/// time.
pub fn next_daily_fire(now: DateTime<Utc>, utc_offset_seconds: i32) -> DateTime<Utc> {
    let offset = ChronoDuration::seconds(i64::from(utc_offset_seconds));
    let local = (now + offset).naive_utc();

    let anchor = NaiveTime::from_hms_opt(DAILY_ANCHOR_HOUR, 0, 0).unwrap_or_default();
    let mut fire = local.date().and_time(anchor);
    if fire <= local {
        fire += ChronoDuration::days(1);
    }

    DateTime::<Utc>::from_naive_utc_and_offset(fire, Utc) - offset
}
