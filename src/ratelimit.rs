// src/ratelimit.rs
use crate::types::{RatePolicy, RustReconError};
use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

type DirectLimiter = governor::DefaultDirectRateLimiter;

/// Windowed counter for quota-class backends. Mutated only through the
/// DashMap entry, which serializes access per backend id.
#[derive(Debug)]
struct QuotaWindow {
    limit: u32,
    window: Duration,
    started: Instant,
    used: u32,
}

impl QuotaWindow {
    fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            started: Instant::now(),
            used: 0,
        }
    }

    /// Take one token, or report exhaustion. The check and the increment
    /// happen under the same entry lock.
    fn try_take(&mut self) -> bool {
        if self.started.elapsed() >= self.window {
            self.started = Instant::now();
            self.used = 0;
        }
        if self.used < self.limit {
            self.used += 1;
            true
        } else {
            false
        }
    }
}

/// Per-backend admission gate. Smooth (per-second) backends block until the
/// next token is available; quota backends are rejected immediately when the
/// window budget is spent, so a blocking wait never drains a monthly quota.
/// Backends with no configured policy pass through ungated.
pub struct RateGate {
    smooth: HashMap<String, Arc<DirectLimiter>>,
    quotas: DashMap<String, QuotaWindow>,
}

impl RateGate {
    pub fn new(policies: &HashMap<String, RatePolicy>) -> Self {
        let mut smooth = HashMap::new();
        let quotas = DashMap::new();

        for (backend_id, policy) in policies {
            match policy {
                RatePolicy::Smooth { per_second } => {
                    let per_second = NonZeroU32::new((*per_second).max(1)).expect("nonzero");
                    let quota = Quota::per_second(per_second)
                        .allow_burst(NonZeroU32::new(1).expect("nonzero"));
                    smooth.insert(backend_id.clone(), Arc::new(RateLimiter::direct(quota)));
                }
                RatePolicy::Quota { limit, window } => {
                    quotas.insert(backend_id.clone(), QuotaWindow::new(*limit, *window));
                }
            }
        }

        Self { smooth, quotas }
    }

    /// Acquire a permit for one call to `backend_id`. Returns
    /// `RustReconError::RateLimited` only for quota-class rejection; smooth
    /// limits wait instead.
    pub async fn acquire(&self, backend_id: &str) -> Result<(), RustReconError> {
        if let Some(limiter) = self.smooth.get(backend_id) {
            limiter.until_ready().await;
            return Ok(());
        }

        if let Some(mut window) = self.quotas.get_mut(backend_id) {
            if window.try_take() {
                return Ok(());
            }
            return Err(RustReconError::RateLimited(backend_id.to_string()));
        }

        Ok(())
    }
}
