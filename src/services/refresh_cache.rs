//! Single-flight, expiring cache used for the installation token and the policy file.
//!
//! The first caller that finds the slot empty or expired performs the refresh while
//! holding the refresh gate. Callers that queued behind it re-check the slot once they
//! get the gate, and take the result of the refresh they waited on (value or error)
//! instead of starting another one.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::error::{AppError, AppResult};

use super::clock::Clock;

struct Cached<T> {
    value: T,
    valid_until: DateTime<Utc>,
}

#[derive(Default)]
struct Gate {
    /// Completed refresh attempts
    attempts: u64,
    last_error: Option<AppError>,
}

pub struct RefreshCache<T> {
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<Cached<T>>>,
    gate: Mutex<Gate>,
    attempts: AtomicU64,
}

impl<T: Clone + Send + Sync> RefreshCache<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slot: RwLock::new(None),
            gate: Mutex::new(Gate::default()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Cached value if it is still valid.
    pub async fn peek(&self) -> Option<T> {
        let now = self.clock.now();
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|c| now < c.valid_until)
            .map(|c| c.value.clone())
    }

    /// Return the cached value, or run `refresh` exactly once across concurrent callers.
    ///
    /// `refresh` yields the value together with the instant it stops being valid.
    /// With `force` the cache is bypassed and always re-populated.
    pub async fn get_or_refresh<F, Fut>(&self, force: bool, refresh: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<(T, DateTime<Utc>)>>,
    {
        if !force && let Some(value) = self.peek().await {
            return Ok(value);
        }

        let observed = self.attempts.load(Ordering::Acquire);
        let mut gate = self.gate.lock().await;

        if !force {
            // Another caller refreshed while this one was queued
            if let Some(value) = self.peek().await {
                return Ok(value);
            }
            if gate.attempts != observed
                && let Some(err) = &gate.last_error
            {
                return Err(err.clone());
            }
        }

        let result = refresh().await;
        gate.attempts += 1;
        self.attempts.store(gate.attempts, Ordering::Release);

        match result {
            Ok((value, valid_until)) => {
                gate.last_error = None;
                let mut slot = self.slot.write().await;
                *slot = Some(Cached {
                    value: value.clone(),
                    valid_until,
                });
                Ok(value)
            }
            Err(err) => {
                gate.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Drop the cached value.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}
