//! Crisis set reconciliation between poll cycles.
//!
//! A crisis is announced when its id enters the crisis set. An id that stays
//! in the set is never announced again; one that leaves and comes back is a
//! new transition and is announced again.

use crisis_common::CrisisView;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Default)]
pub struct Reconciler {
    previous: HashSet<String>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crises in `current` that were absent last cycle, in `current` order.
    ///
    /// `previous` is replaced by `current` unconditionally, even when nothing
    /// new appeared.
    pub fn reconcile<'a>(&mut self, current: &'a [CrisisView]) -> Vec<&'a CrisisView> {
        let mut seen = HashSet::new();
        let newly: Vec<&CrisisView> = current
            .iter()
            .filter(|c| !self.previous.contains(&c.id) && seen.insert(c.id.as_str()))
            .collect();

        self.previous = current.iter().map(|c| c.id.clone()).collect();
        debug!(
            "Reconciled {} crises, {} new",
            self.previous.len(),
            newly.len()
        );
        newly
    }

    pub fn previous_len(&self) -> usize {
        self.previous.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.previous.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn crisis(id: &str) -> CrisisView {
        CrisisView {
            id: id.to_string(),
            timestamp: Utc::now(),
            text: "down".to_string(),
            channel: "twitter".to_string(),
            crisis_type: "outage".to_string(),
            icon: "🔴".to_string(),
            label: "Outage Crisis".to_string(),
            priority: "P1".to_string(),
            score: 0.5,
            score_percent: 50,
            actions: vec![],
            metadata: json!({}),
        }
    }

    fn ids(v: Vec<&CrisisView>) -> Vec<String> {
        v.into_iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_unchanged_set_fires_once() {
        let mut r = Reconciler::new();
        let set = vec![crisis("a")];
        assert_eq!(ids(r.reconcile(&set)), vec!["a"]);
        assert!(r.reconcile(&set).is_empty());
        assert!(r.reconcile(&set).is_empty());
    }

    #[test]
    fn test_only_new_ids_fire() {
        let mut r = Reconciler::new();
        r.reconcile(&[crisis("a")]);
        assert_eq!(ids(r.reconcile(&[crisis("a"), crisis("b")])), vec!["b"]);
    }

    #[test]
    fn test_leave_and_return_fires_again() {
        let mut r = Reconciler::new();
        r.reconcile(&[crisis("a")]);
        assert!(r.reconcile(&[]).is_empty());
        assert!(!r.contains("a"));
        assert_eq!(ids(r.reconcile(&[crisis("a")])), vec!["a"]);
    }

    #[test]
    fn test_duplicate_ids_fire_once() {
        let mut r = Reconciler::new();
        assert_eq!(ids(r.reconcile(&[crisis("a"), crisis("a")])), vec!["a"]);
        assert_eq!(r.previous_len(), 1);
    }
}
