//! Priority-ordered handler registry, one sequence per event.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{HookEvent, HookHandler};

/// Registered hooks for all seven events, kept sorted ascending by
/// priority with ties broken by registration order.
pub struct HookRegistry {
    by_event: RwLock<HashMap<HookEvent, Vec<HookHandler>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            by_event: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler. Re-registering the same (event, name) pair
    /// replaces the existing handler in place without disturbing other
    /// handlers' relative order.
    pub fn register(&self, event: HookEvent, handler: HookHandler) {
        let mut map = self.by_event.write().expect("hook registry poisoned");
        let entries = map.entry(event).or_default();
        if let Some(existing) = entries.iter_mut().find(|h| h.name == handler.name) {
            *existing = handler;
        } else {
            entries.push(handler);
        }
        // Stable sort preserves insertion order among equal priorities.
        entries.sort_by_key(|h| h.priority);
    }

    pub fn unregister(&self, event: HookEvent, name: &str) -> bool {
        let mut map = self.by_event.write().expect("hook registry poisoned");
        if let Some(entries) = map.get_mut(&event) {
            let before = entries.len();
            entries.retain(|h| h.name != name);
            return entries.len() != before;
        }
        false
    }

    /// Snapshot of names in invocation order, for tests/introspection.
    pub fn names_in_order(&self, event: HookEvent) -> Vec<String> {
        let map = self.by_event.read().expect("hook registry poisoned");
        map.get(&event)
            .map(|entries| entries.iter().map(|h| h.name.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn with_handlers<R>(
        &self,
        event: HookEvent,
        f: impl FnOnce(&[HookHandler]) -> R,
    ) -> R {
        let map = self.by_event.read().expect("hook registry poisoned");
        match map.get(&event) {
            Some(entries) => f(entries),
            None => f(&[]),
        }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HookOutcome;

    #[test]
    fn priority_order_is_ascending_regardless_of_registration_order() {
        let registry = HookRegistry::new();
        registry.register(
            HookEvent::PreToolUse,
            HookHandler::new("c", 30, |p| async move { HookOutcome::Ok(p) }),
        );
        registry.register(
            HookEvent::PreToolUse,
            HookHandler::new("a", 10, |p| async move { HookOutcome::Ok(p) }),
        );
        registry.register(
            HookEvent::PreToolUse,
            HookHandler::new("b", 20, |p| async move { HookOutcome::Ok(p) }),
        );

        assert_eq!(
            registry.names_in_order(HookEvent::PreToolUse),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let registry = HookRegistry::new();
        registry.register(
            HookEvent::PostToolUse,
            HookHandler::new("first", 50, |p| async move { HookOutcome::Ok(p) }),
        );
        registry.register(
            HookEvent::PostToolUse,
            HookHandler::new("second", 50, |p| async move { HookOutcome::Ok(p) }),
        );

        assert_eq!(
            registry.names_in_order(HookEvent::PostToolUse),
            vec!["first", "second"]
        );
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let registry = HookRegistry::new();
        registry.register(
            HookEvent::PreResponse,
            HookHandler::new("quality_check", 50, |p| async move { HookOutcome::Ok(p) }),
        );
        registry.register(
            HookEvent::PreResponse,
            HookHandler::new("quality_check", 10, |p| async move { HookOutcome::Ok(p) }),
        );
        let names = registry.names_in_order(HookEvent::PreResponse);
        assert_eq!(names, vec!["quality_check"]);
    }
}
