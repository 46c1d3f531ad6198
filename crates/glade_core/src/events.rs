use std::sync::mpsc;

/// Sending half cloned into background jobs. Every item sent counts as one
/// completed unit of work on the receiving side.
pub struct CompletionSender<T> {
    tx: mpsc::Sender<T>,
}

/// Receiving half polled once per frame by the render loop.
pub struct CompletionQueue<T> {
    rx: mpsc::Receiver<T>,
    expected: usize,
    received: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadProgress {
    pub loaded: usize,
    pub total: usize,
}

impl LoadProgress {
    pub fn ratio(self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.loaded as f32 / self.total as f32).clamp(0.0, 1.0)
    }

    pub fn is_complete(self) -> bool {
        self.loaded >= self.total
    }
}

pub fn completion_channel<T>(expected: usize) -> (CompletionSender<T>, CompletionQueue<T>) {
    let (tx, rx) = mpsc::channel();
    (
        CompletionSender { tx },
        CompletionQueue {
            rx,
            expected,
            received: 0,
        },
    )
}

impl<T> Clone for CompletionSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> CompletionSender<T> {
    pub fn send(&self, item: T) -> Result<(), mpsc::SendError<T>> {
        self.tx.send(item)
    }
}

impl<T> CompletionQueue<T> {
    pub fn expect_more(&mut self, count: usize) {
        self.expected += count;
    }

    /// Takes everything that finished since the last call without blocking.
    pub fn drain(&mut self) -> Vec<T> {
        let mut completed = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            completed.push(item);
        }
        self.received += completed.len();
        completed
    }

    pub fn progress(&self) -> LoadProgress {
        LoadProgress {
            loaded: self.received.min(self.expected),
            total: self.expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{completion_channel, LoadProgress};

    #[test]
    fn drain_counts_received_items_towards_progress() {
        let (tx, mut queue) = completion_channel::<u32>(3);
        assert_eq!(queue.progress(), LoadProgress { loaded: 0, total: 3 });

        tx.send(1).unwrap();
        tx.clone().send(2).unwrap();
        assert_eq!(queue.drain(), vec![1, 2]);
        assert!(!queue.progress().is_complete());
        assert!((queue.progress().ratio() - 2.0 / 3.0).abs() < 1e-6);

        assert!(queue.drain().is_empty());

        tx.send(3).unwrap();
        assert_eq!(queue.drain(), vec![3]);
        assert!(queue.progress().is_complete());
        assert_eq!(queue.progress().ratio(), 1.0);
    }

    #[test]
    fn empty_manifest_counts_as_complete() {
        let (_tx, mut queue) = completion_channel::<()>(0);
        assert!(queue.drain().is_empty());
        assert!(queue.progress().is_complete());
        assert_eq!(queue.progress().ratio(), 1.0);

        queue.expect_more(2);
        assert!(!queue.progress().is_complete());
    }
}
