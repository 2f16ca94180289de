//! Background expiry of stale pending orders.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::state::{AppState, AppStore};

/// Runs one expiry pass, returning how many orders were cancelled.
pub async fn sweep_once<S: AppStore>(state: &AppState<S>) -> usize {
    match state.coordinator.expire_stale_orders(Utc::now()).await {
        Ok(expired) => expired,
        Err(e) => {
            tracing::warn!(error = %e, "expiry sweep failed");
            0
        }
    }
}

/// Spawns a task that expires stale pending orders every `interval`.
///
/// Returns None when `interval` is zero. The task runs until aborted.
pub fn spawn_expiry_sweeper<S: AppStore>(
    state: Arc<AppState<S>>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        tracing::info!("pending order expiry disabled");
        return None;
    }

    tracing::info!(interval_secs = interval.as_secs(), "starting pending order expiry");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(&state).await;
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use checkout::InMemoryCatalog;
    use store::InMemoryStore;

    fn state() -> Arc<AppState<InMemoryStore>> {
        AppState::from_config(InMemoryStore::new(), InMemoryCatalog::new(), &Config::default())
    }

    #[tokio::test]
    async fn test_sweep_with_no_orders() {
        assert_eq!(sweep_once(&state()).await, 0);
    }

    #[tokio::test]
    async fn test_zero_interval_disables_sweeper() {
        assert!(spawn_expiry_sweeper(state(), Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_sweeper_can_be_aborted() {
        let handle = spawn_expiry_sweeper(state(), Duration::from_secs(60)).unwrap();
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
