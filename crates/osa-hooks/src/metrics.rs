//! Per-event hook metrics: call count, total elapsed, block count.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::types::HookEvent;

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    total_elapsed_us: AtomicU64,
    blocks: AtomicU64,
}

/// A point-in-time snapshot suitable for exposing over the HTTP API or logs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventMetrics {
    pub call_count: u64,
    pub total_elapsed_us: u64,
    pub block_count: u64,
}

impl EventMetrics {
    pub fn average_elapsed_us(&self) -> f64 {
        if self.call_count == 0 {
            0.0
        } else {
            self.total_elapsed_us as f64 / self.call_count as f64
        }
    }
}

/// Thread-safe metrics collector, one row per event.
pub struct HookMetrics {
    by_event: RwLock<HashMap<HookEvent, Counters>>,
}

impl HookMetrics {
    pub fn new() -> Self {
        Self {
            by_event: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_call(&self, event: HookEvent, elapsed_us: u64, blocked: bool) {
        let map = self.by_event.read().expect("hook metrics poisoned");
        if let Some(counters) = map.get(&event) {
            counters.calls.fetch_add(1, Ordering::Relaxed);
            counters
                .total_elapsed_us
                .fetch_add(elapsed_us, Ordering::Relaxed);
            if blocked {
                counters.blocks.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }
        drop(map);

        let mut map = self.by_event.write().expect("hook metrics poisoned");
        let counters = map.entry(event).or_default();
        counters.calls.fetch_add(1, Ordering::Relaxed);
        counters
            .total_elapsed_us
            .fetch_add(elapsed_us, Ordering::Relaxed);
        if blocked {
            counters.blocks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, event: HookEvent) -> EventMetrics {
        let map = self.by_event.read().expect("hook metrics poisoned");
        match map.get(&event) {
            Some(c) => EventMetrics {
                call_count: c.calls.load(Ordering::Relaxed),
                total_elapsed_us: c.total_elapsed_us.load(Ordering::Relaxed),
                block_count: c.blocks.load(Ordering::Relaxed),
            },
            None => EventMetrics::default(),
        }
    }
}

impl Default for HookMetrics {
    fn default() -> Self {
        Self::new()
    }
}
