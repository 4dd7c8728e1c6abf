//! Bounded queue of files waiting for a worker.
//!
//! Producers never wait: a push onto a full queue hands the path straight
//! back. Consumers share one receiver and keep taking paths until the queue is
//! empty and either the shutdown token fired or the queue was closed.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Returned by [`WorkQueue::try_push`] when no slot is free.
#[derive(Debug, Error)]
#[error("work queue is full or closed, dropped {}", .0.display())]
pub struct QueueFull(pub PathBuf);

impl QueueFull {
    pub fn into_inner(self) -> PathBuf {
        self.0
    }
}

/// Cloneable multi-producer, multi-consumer FIFO of file paths.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<PathBuf>,
    rx: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    closed: CancellationToken,
    capacity: usize,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` paths (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            closed: CancellationToken::new(),
            capacity,
        }
    }

    pub fn try_push(&self, path: PathBuf) -> Result<(), QueueFull> {
        if self.closed.is_cancelled() {
            return Err(QueueFull(path));
        }
        self.tx.try_send(path).map_err(|e| match e {
            TrySendError::Full(path) | TrySendError::Closed(path) => QueueFull(path),
        })
    }

    /// Wait for the next path.
    ///
    /// Paths already queued are always handed out first. `None` means the
    /// queue is empty and `cancel` fired or [`close`](Self::close) was called.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<PathBuf> {
        // the holder of this lock always wakes on cancel or close
        let mut rx = self.rx.lock().await;

        match rx.try_recv() {
            Ok(path) => return Some(path),
            Err(TryRecvError::Disconnected) => return None,
            Err(TryRecvError::Empty) => {}
        }
        if cancel.is_cancelled() || self.closed.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            path = rx.recv() => return path,
            _ = cancel.cancelled() => {}
            _ = self.closed.cancelled() => {}
        }
        // a push may have landed as the token fired
        rx.try_recv().ok()
    }

    /// Stop accepting paths. Consumers drain what is left, then `pop`
    /// returns `None`. Safe to call while consumers are waiting.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Paths currently waiting.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = WorkQueue::new(4);
        let cancel = CancellationToken::new();
        for name in ["a", "b", "c"] {
            queue.try_push(PathBuf::from(name)).unwrap();
        }
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.pop(&cancel).await, Some(PathBuf::from("a")));
        assert_eq!(queue.pop(&cancel).await, Some(PathBuf::from("b")));
        assert_eq!(queue.pop(&cancel).await, Some(PathBuf::from("c")));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_hands_path_back() {
        let queue = WorkQueue::new(2);
        queue.try_push(PathBuf::from("a")).unwrap();
        queue.try_push(PathBuf::from("b")).unwrap();

        let err = queue.try_push(PathBuf::from("c")).unwrap_err();
        assert_eq!(err.into_inner(), PathBuf::from("c"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let queue = WorkQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.try_push(PathBuf::from("a")).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_wakes_idle_consumer() {
        let queue = WorkQueue::new(1);
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.pop(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_closed_queue_drains_then_ends() {
        let queue = WorkQueue::new(4);
        let cancel = CancellationToken::new();
        queue.try_push(PathBuf::from("a")).unwrap();
        queue.close();

        assert!(queue.try_push(PathBuf::from("b")).is_err());
        assert_eq!(queue.pop(&cancel).await, Some(PathBuf::from("a")));
        assert_eq!(queue.pop(&cancel).await, None);
    }

    #[tokio::test]
    async fn test_cancelled_pop_drains_queue_first() {
        let queue = WorkQueue::new(2);
        let cancel = CancellationToken::new();
        queue.try_push(PathBuf::from("a")).unwrap();
        queue.try_push(PathBuf::from("b")).unwrap();
        cancel.cancel();

        assert_eq!(queue.pop(&cancel).await, Some(PathBuf::from("a")));
        assert_eq!(queue.pop(&cancel).await, Some(PathBuf::from("b")));
        assert_eq!(queue.pop(&cancel).await, None);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_close_wakes_parked_consumers() {
        let queue = WorkQueue::new(1);
        let cancel = CancellationToken::new();

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let queue = queue.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { queue.pop(&cancel).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.close();
        for waiter in waiters {
            let result = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(result, None);
        }
    }

    #[tokio::test]
    async fn test_many_consumers_share_items() {
        let queue = WorkQueue::new(8);
        let cancel = CancellationToken::new();
        for i in 0..8 {
            queue.try_push(PathBuf::from(format!("{}.tsv", i))).unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Ok(Some(path)) =
                    tokio::time::timeout(Duration::from_millis(50), queue.pop(&cancel)).await
                {
                    got.push(path);
                }
                got
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        assert_eq!(all.len(), 8);
        all.dedup();
        assert_eq!(all.len(), 8);
    }
}
