//! Per-call, daily and monthly cost accounting.
//!
//! `BudgetTracker` is a cheap, clonable handle (`Arc` internally) meant to be
//! shared between the agent loop, the hook pipeline's `spend_guard`/
//! `budget_tracker` hooks, and the gateway. Counters are atomic so no lock is
//! needed on the hot path of recording a completed LLM call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use osa_core::config::BudgetConfig;
use osa_core::types::CostRecord;
use thiserror::Error;
use tracing::warn;

/// USD amounts are tracked as integer micro-dollars (1e-6 USD) so the running
/// totals can live in an `AtomicU64` instead of behind a lock.
const MICROS_PER_USD: f64 = 1_000_000.0;

fn to_micros(usd: f64) -> u64 {
    (usd.max(0.0) * MICROS_PER_USD).round() as u64
}

fn from_micros(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_USD
}

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("per-call limit exceeded: ${call_usd:.4} > ${limit_usd:.4}")]
    PerCallExceeded { call_usd: f64, limit_usd: f64 },
    #[error("daily budget exceeded: ${spent_usd:.2} > ${limit_usd:.2}")]
    DailyExceeded { spent_usd: f64, limit_usd: f64 },
    #[error("monthly budget exceeded: ${spent_usd:.2} > ${limit_usd:.2}")]
    MonthlyExceeded { spent_usd: f64, limit_usd: f64 },
}

/// A point-in-time snapshot of what has been spent so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetSnapshot {
    pub daily_usd: f64,
    pub monthly_usd: f64,
    pub daily_limit_usd: Option<f64>,
    pub monthly_limit_usd: Option<f64>,
}

impl BudgetSnapshot {
    /// Fraction of the daily budget consumed, `None` if unbounded.
    pub fn daily_utilization(&self) -> Option<f64> {
        self.daily_limit_usd
            .filter(|l| *l > 0.0)
            .map(|l| self.daily_usd / l)
    }
}

struct Period {
    key: std::sync::Mutex<String>,
    spent_micros: AtomicU64,
}

impl Period {
    fn new(key: String) -> Self {
        Self {
            key: std::sync::Mutex::new(key),
            spent_micros: AtomicU64::new(0),
        }
    }

    /// Reset the running total if `current_key` has rolled over, then add
    /// `micros` to it. Returns the total after the add.
    fn add(&self, current_key: &str, micros: u64) -> u64 {
        let mut key = self.key.lock().expect("budget period mutex poisoned");
        if *key != current_key {
            *key = current_key.to_string();
            self.spent_micros.store(0, Ordering::SeqCst);
        }
        drop(key);
        self.spent_micros.fetch_add(micros, Ordering::SeqCst) + micros
    }

    fn current(&self, current_key: &str) -> u64 {
        let key = self.key.lock().expect("budget period mutex poisoned");
        if *key == current_key {
            self.spent_micros.load(Ordering::SeqCst)
        } else {
            0
        }
    }
}

/// Shared cost accounting handle. Clone to share between tasks; all clones
/// observe the same counters.
#[derive(Clone)]
pub struct BudgetTracker {
    inner: Arc<Inner>,
}

struct Inner {
    config: BudgetConfig,
    daily: Period,
    monthly: Period,
}

impl BudgetTracker {
    pub fn new(config: BudgetConfig) -> Self {
        let today = today_key();
        let month = month_key();
        Self {
            inner: Arc::new(Inner {
                config,
                daily: Period::new(today),
                monthly: Period::new(month),
            }),
        }
    }

    /// Check a prospective call's cost against the per-call limit without
    /// recording it. Called by `spend_guard` before dispatching an LLM call
    /// whose cost is already known (e.g. a fixed-price tool).
    pub fn check_call(&self, estimated_usd: f64) -> Result<(), BudgetError> {
        if let Some(limit) = self.inner.config.per_call_limit_usd {
            if estimated_usd > limit {
                return Err(BudgetError::PerCallExceeded {
                    call_usd: estimated_usd,
                    limit_usd: limit,
                });
            }
        }
        Ok(())
    }

    /// Record a completed call's cost. Always records, even if it pushes the
    /// tracker over budget — the caller decides whether to block the *next*
    /// call via `check_call`/`snapshot`.
    pub fn record(&self, record: &CostRecord) -> BudgetSnapshot {
        self.record_usd(record.cost_usd)
    }

    pub fn record_usd(&self, cost_usd: f64) -> BudgetSnapshot {
        let micros = to_micros(cost_usd);
        let daily_total = self.inner.daily.add(&today_key(), micros);
        let monthly_total = self.inner.monthly.add(&month_key(), micros);

        let snapshot = BudgetSnapshot {
            daily_usd: from_micros(daily_total),
            monthly_usd: from_micros(monthly_total),
            daily_limit_usd: self.inner.config.daily_budget_usd,
            monthly_limit_usd: self.inner.config.monthly_budget_usd,
        };

        if let Some(limit) = self.inner.config.daily_budget_usd {
            if snapshot.daily_usd > limit {
                warn!(spent = snapshot.daily_usd, limit, "daily budget exceeded");
            }
        }
        if let Some(limit) = self.inner.config.monthly_budget_usd {
            if snapshot.monthly_usd > limit {
                warn!(spent = snapshot.monthly_usd, limit, "monthly budget exceeded");
            }
        }

        snapshot
    }

    /// Returns `Err` if the *current* totals already exceed either configured
    /// limit. Used by `spend_guard` as a `pre_tool_use` / `pre_response` gate
    /// before allowing another LLM call to start.
    pub fn check_limits(&self) -> Result<BudgetSnapshot, BudgetError> {
        let snapshot = self.snapshot();
        if let Some(limit) = snapshot.daily_limit_usd {
            if snapshot.daily_usd > limit {
                return Err(BudgetError::DailyExceeded {
                    spent_usd: snapshot.daily_usd,
                    limit_usd: limit,
                });
            }
        }
        if let Some(limit) = snapshot.monthly_limit_usd {
            if snapshot.monthly_usd > limit {
                return Err(BudgetError::MonthlyExceeded {
                    spent_usd: snapshot.monthly_usd,
                    limit_usd: limit,
                });
            }
        }
        Ok(snapshot)
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            daily_usd: from_micros(self.inner.daily.current(&today_key())),
            monthly_usd: from_micros(self.inner.monthly.current(&month_key())),
            daily_limit_usd: self.inner.config.daily_budget_usd,
            monthly_limit_usd: self.inner.config.monthly_budget_usd,
        }
    }
}

fn today_key() -> String {
    let date: NaiveDate = Utc::now().date_naive();
    date.format("%Y-%m-%d").to_string()
}

fn month_key() -> String {
    let date: NaiveDate = Utc::now().date_naive();
    date.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use osa_core::types::SessionId;

    fn record(cost_usd: f64) -> CostRecord {
        CostRecord {
            session_id: SessionId::from_str("s1"),
            provider: "anthropic".into(),
            model: "claude".into(),
            input_tokens: 100,
            output_tokens: 50,
            cost_usd,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn accumulates_across_calls() {
        let tracker = BudgetTracker::new(BudgetConfig {
            daily_budget_usd: Some(10.0),
            monthly_budget_usd: Some(100.0),
            per_call_limit_usd: None,
        });
        tracker.record(&record(1.5));
        let snapshot = tracker.record(&record(2.0));
        assert!((snapshot.daily_usd - 3.5).abs() < 1e-6);
        assert!((snapshot.monthly_usd - 3.5).abs() < 1e-6);
    }

    #[test]
    fn per_call_limit_rejects_expensive_call() {
        let tracker = BudgetTracker::new(BudgetConfig {
            daily_budget_usd: None,
            monthly_budget_usd: None,
            per_call_limit_usd: Some(1.0),
        });
        assert!(tracker.check_call(0.5).is_ok());
        assert!(matches!(
            tracker.check_call(5.0),
            Err(BudgetError::PerCallExceeded { .. })
        ));
    }

    #[test]
    fn daily_limit_trips_after_spend() {
        let tracker = BudgetTracker::new(BudgetConfig {
            daily_budget_usd: Some(5.0),
            monthly_budget_usd: None,
            per_call_limit_usd: None,
        });
        assert!(tracker.check_limits().is_ok());
        tracker.record(&record(6.0));
        assert!(matches!(
            tracker.check_limits(),
            Err(BudgetError::DailyExceeded { .. })
        ));
    }

    #[test]
    fn unbounded_budget_never_trips() {
        let tracker = BudgetTracker::new(BudgetConfig::default());
        tracker.record(&record(1_000_000.0));
        assert!(tracker.check_limits().is_ok());
    }
}
