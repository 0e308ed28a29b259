use std::collections::VecDeque;

use attune_core::model::AnalysisRequest;

/// Default bound on requests held while disconnected.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// FIFO queue of requests awaiting a connection. Bounded: on overflow the
/// oldest entry is evicted, never blocking the producer.
pub struct PendingQueue {
    items: VecDeque<AnalysisRequest>,
    capacity: usize,
    dropped: u64,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append a request, evicting and returning the oldest entry when full.
    pub fn push(&mut self, request: AnalysisRequest) -> Option<AnalysisRequest> {
        let evicted = if self.items.len() >= self.capacity {
            self.dropped += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(request);
        evicted
    }

    /// Take everything, in submission order.
    pub fn drain(&mut self) -> Vec<AnalysisRequest> {
        self.items.drain(..).collect()
    }

    /// Put back requests that could not be dispatched mid-drain, ahead of
    /// anything queued since. Callers only requeue what `drain` returned,
    /// so this cannot overflow.
    pub fn requeue_front(&mut self, items: Vec<AnalysisRequest>) {
        for item in items.into_iter().rev() {
            self.items.push_front(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total evictions over the queue's lifetime.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attune_core::model::{RequestPayload, TextOptions};

    fn request(n: usize) -> AnalysisRequest {
        AnalysisRequest {
            payload: RequestPayload::TextSnippet {
                text: format!("msg {n}"),
                options: TextOptions::default(),
            },
            session_id: None,
            captured_at_ms: n as u64,
        }
    }

    fn text_of(req: &AnalysisRequest) -> &str {
        match &req.payload {
            RequestPayload::TextSnippet { text, .. } => text,
            _ => panic!("expected text snippet"),
        }
    }

    #[test]
    fn fifo_order() {
        let mut q = PendingQueue::new(10);
        for n in 0..3 {
            assert!(q.push(request(n)).is_none());
        }
        let drained = q.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(text_of(&drained[0]), "msg 0");
        assert_eq!(text_of(&drained[2]), "msg 2");
        assert!(q.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut q = PendingQueue::new(DEFAULT_QUEUE_CAPACITY);
        for n in 1..=51 {
            q.push(request(n));
        }
        assert_eq!(q.len(), 50);
        assert_eq!(q.dropped(), 1);
        let drained = q.drain();
        // Requests #2..=#51 survive; #1 was evicted.
        assert_eq!(text_of(&drained[0]), "msg 2");
        assert_eq!(text_of(&drained[49]), "msg 51");
    }

    #[test]
    fn eviction_returns_the_evicted_request() {
        let mut q = PendingQueue::new(2);
        q.push(request(0));
        q.push(request(1));
        let evicted = q.push(request(2)).expect("oldest should be evicted");
        assert_eq!(text_of(&evicted), "msg 0");
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn requeue_front_preserves_order() {
        let mut q = PendingQueue::new(10);
        q.push(request(3));
        q.requeue_front(vec![request(1), request(2)]);
        let drained = q.drain();
        assert_eq!(text_of(&drained[0]), "msg 1");
        assert_eq!(text_of(&drained[1]), "msg 2");
        assert_eq!(text_of(&drained[2]), "msg 3");
    }

    #[test]
    fn drain_on_empty_queue() {
        let mut q = PendingQueue::default();
        assert!(q.drain().is_empty());
        assert_eq!(q.capacity(), DEFAULT_QUEUE_CAPACITY);
    }
}
