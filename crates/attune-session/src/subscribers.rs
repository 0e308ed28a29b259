use std::collections::HashMap;
use std::sync::Arc;

use attune_core::events::EventKind;
use attune_core::model::AnalysisResult;

pub type Callback = Arc<dyn Fn(&AnalysisResult) + Send + Sync>;

/// Handle returned by `subscribe`, used to remove the callback later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Ordered callback lists keyed by event kind. Insertion order is
/// invocation order. Mutated only by the embedding application.
#[derive(Default)]
pub struct SubscriberRegistry {
    map: HashMap<EventKind, Vec<(SubscriptionId, Callback)>>,
    next_id: u64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, callback: Callback) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.map.entry(kind).or_default().push((id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for subs in self.map.values_mut() {
            if let Some(pos) = subs.iter().position(|(sid, _)| *sid == id) {
                subs.remove(pos);
                return true;
            }
        }
        false
    }

    /// Callbacks for one kind, in registration order. Cloned out so the
    /// caller can invoke them without holding any lock.
    pub fn snapshot(&self, kind: EventKind) -> Vec<(SubscriptionId, Callback)> {
        self.map.get(&kind).cloned().unwrap_or_default()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.map.get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attune_core::model::VideoResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn result() -> AnalysisResult {
        AnalysisResult::Video(VideoResult::default())
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let mut reg = SubscriberRegistry::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = Arc::clone(&order);
            reg.subscribe(
                EventKind::VideoAnalysis,
                Arc::new(move |_| order.lock().push(n)),
            );
        }
        for (_, cb) in reg.snapshot(EventKind::VideoAnalysis) {
            cb(&result());
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn unsubscribe_removes_only_that_callback() {
        let mut reg = SubscriberRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let first = reg.subscribe(EventKind::TextAnalysis, Arc::new(move |_| {
            h.fetch_add(1, Ordering::Relaxed);
        }));
        let h = Arc::clone(&hits);
        reg.subscribe(EventKind::TextAnalysis, Arc::new(move |_| {
            h.fetch_add(10, Ordering::Relaxed);
        }));

        assert!(reg.unsubscribe(first));
        assert!(!reg.unsubscribe(first));
        assert_eq!(reg.count(EventKind::TextAnalysis), 1);

        for (_, cb) in reg.snapshot(EventKind::TextAnalysis) {
            cb(&result());
        }
        assert_eq!(hits.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn snapshot_of_unknown_kind_is_empty() {
        let reg = SubscriberRegistry::new();
        assert!(reg.snapshot(EventKind::AnalysisComplete).is_empty());
        assert_eq!(reg.count(EventKind::Error), 0);
    }

    #[test]
    fn kinds_are_independent() {
        let mut reg = SubscriberRegistry::new();
        reg.subscribe(EventKind::VideoAnalysis, Arc::new(|_| {}));
        reg.subscribe(EventKind::BiometricAnalysis, Arc::new(|_| {}));
        assert_eq!(reg.count(EventKind::VideoAnalysis), 1);
        assert_eq!(reg.count(EventKind::BiometricAnalysis), 1);
        assert_eq!(reg.count(EventKind::TextAnalysis), 0);
    }
}
