//! Persisted periodic wake-ups.
//!
//! A reminder is a row `(kind, instance, name, next fire time, period)` in
//! the state store. Workflows register and unregister their reminders inside
//! the same transaction as the state change that calls for it, so a reminder
//! exists exactly as long as the workflow needs waking. The runtime polls
//! for due reminders, runs the handler, then pushes the fire time forward.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use state_store::{StateStore, StateStoreExt, StoreError, Transaction};

use crate::error::Result;

pub const REMINDERS: &str = "reminders";

/// Which workflow a reminder wakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowKind {
    OrderFulfillment,
    RestockPipeline,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::OrderFulfillment => "order",
            WorkflowKind::RestockPipeline => "restock",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered periodic wake-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub kind: WorkflowKind,
    pub instance: String,
    pub name: String,
    pub next_fire_at: DateTime<Utc>,
    pub period_ms: u64,
}

impl Reminder {
    pub fn new(
        kind: WorkflowKind,
        instance: impl Into<String>,
        name: impl Into<String>,
        initial_delay: Duration,
        period: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            instance: instance.into(),
            name: name.into(),
            next_fire_at: after(now, initial_delay),
            period_ms: u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Storage key; unique per instance and reminder name.
    pub fn key(&self) -> String {
        reminder_key(self.kind, &self.instance, &self.name)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_fire_at <= now
    }
}

fn reminder_key(kind: WorkflowKind, instance: &str, name: &str) -> String {
    format!("{kind}:{instance}:{name}")
}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Registers (or replaces) a reminder as part of `tx`.
pub fn register(tx: &mut Transaction<'_>, reminder: &Reminder) -> state_store::Result<()> {
    tx.set(REMINDERS, &reminder.key(), reminder)
}

/// Deletes a reminder as part of `tx`.
pub fn unregister(tx: &mut Transaction<'_>, kind: WorkflowKind, instance: &str, name: &str) {
    tx.remove(REMINDERS, &reminder_key(kind, instance, name));
}

/// Finds due reminders and advances them after they fire.
#[derive(Clone)]
pub struct WakeupScheduler<S: StateStore> {
    store: S,
    transaction_timeout: Duration,
}

impl<S: StateStore> WakeupScheduler<S> {
    pub fn new(store: S, transaction_timeout: Duration) -> Self {
        Self {
            store,
            transaction_timeout,
        }
    }

    /// Returns every reminder due at `now`, earliest first.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let mut tx = self.store.begin_with_timeout(self.transaction_timeout);
        let reminders: Vec<(String, Reminder)> = tx.enumerate(REMINDERS).await?;

        let mut due: Vec<Reminder> = reminders
            .into_iter()
            .map(|(_, reminder)| reminder)
            .filter(|reminder| reminder.is_due(now))
            .collect();
        due.sort_by_key(|reminder| reminder.next_fire_at);
        Ok(due)
    }

    /// Returns every registered reminder.
    pub async fn registered(&self) -> Result<Vec<Reminder>> {
        let mut tx = self.store.begin_with_timeout(self.transaction_timeout);
        let reminders: Vec<(String, Reminder)> = tx.enumerate(REMINDERS).await?;
        Ok(reminders.into_iter().map(|(_, reminder)| reminder).collect())
    }

    /// Moves a fired reminder to `now + period`.
    ///
    /// Returns false and leaves the row alone if the handler unregistered or
    /// replaced the reminder while it ran.
    pub async fn reschedule(&self, fired: &Reminder, now: DateTime<Utc>) -> Result<bool> {
        let key = fired.key();
        let mut tx = self.store.begin_with_timeout(self.transaction_timeout);
        let current: Option<Reminder> = tx.get(REMINDERS, &key).await?;
        if current.as_ref() != Some(fired) {
            return Ok(false);
        }

        let mut next = fired.clone();
        next.next_fire_at = after(now, fired.period());
        tx.set(REMINDERS, &key, &next)?;
        match tx.commit().await {
            Ok(()) => Ok(true),
            Err(StoreError::ConcurrencyConflict { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use state_store::InMemoryStateStore;

    use super::*;

    fn order_reminder(now: DateTime<Utc>) -> Reminder {
        Reminder::new(
            WorkflowKind::OrderFulfillment,
            "order-1",
            "fulfillment",
            Duration::from_secs(10),
            Duration::from_secs(10),
            now,
        )
    }

    async fn registered(store: &InMemoryStateStore, reminder: &Reminder) {
        let mut tx = store.begin();
        register(&mut tx, reminder).unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_due_respects_initial_delay() {
        let store = InMemoryStateStore::new();
        let scheduler = WakeupScheduler::new(store.clone(), Duration::from_secs(4));
        let now = Utc::now();
        registered(&store, &order_reminder(now)).await;

        assert!(scheduler.due(now).await.unwrap().is_empty());
        let due = scheduler.due(now + TimeDelta::seconds(10)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].instance, "order-1");
    }

    #[tokio::test]
    async fn test_reschedule_advances_by_period() {
        let store = InMemoryStateStore::new();
        let scheduler = WakeupScheduler::new(store.clone(), Duration::from_secs(4));
        let now = Utc::now();
        let reminder = order_reminder(now);
        registered(&store, &reminder).await;

        let fired_at = now + TimeDelta::seconds(10);
        assert!(scheduler.reschedule(&reminder, fired_at).await.unwrap());

        assert!(scheduler.due(fired_at).await.unwrap().is_empty());
        assert_eq!(
            scheduler
                .due(fired_at + TimeDelta::seconds(10))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_unregistered_reminder_is_not_rescheduled() {
        let store = InMemoryStateStore::new();
        let scheduler = WakeupScheduler::new(store.clone(), Duration::from_secs(4));
        let now = Utc::now();
        let reminder = order_reminder(now);
        registered(&store, &reminder).await;

        let mut tx = store.begin();
        unregister(&mut tx, reminder.kind, &reminder.instance, &reminder.name);
        tx.commit().await.unwrap();

        assert!(!scheduler.reschedule(&reminder, now).await.unwrap());
        assert!(scheduler.registered().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replaced_reminder_is_not_rescheduled() {
        let store = InMemoryStateStore::new();
        let scheduler = WakeupScheduler::new(store.clone(), Duration::from_secs(4));
        let now = Utc::now();
        let fired = order_reminder(now);
        registered(&store, &fired).await;

        let replacement = order_reminder(now + TimeDelta::seconds(3));
        registered(&store, &replacement).await;

        assert!(!scheduler.reschedule(&fired, now).await.unwrap());
        assert_eq!(scheduler.registered().await.unwrap(), vec![replacement]);
    }

    #[test]
    fn test_key_is_unique_per_kind_and_instance() {
        let now = Utc::now();
        let order = order_reminder(now);
        let restock = Reminder::new(
            WorkflowKind::RestockPipeline,
            "order-1",
            "fulfillment",
            Duration::ZERO,
            Duration::from_secs(1),
            now,
        );
        assert_ne!(order.key(), restock.key());
        assert_eq!(order.key(), "order:order-1:fulfillment");
    }
}
