use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Work queue closed")]
pub struct QueueClosed;

/// Bounded FIFO shared by one producer side and many workers.
///
/// `enqueue` waits while the queue is full, which is what pushes back on
/// the broker consumer.
pub fn work_queue<T>(capacity: usize) -> (WorkQueueSender<T>, WorkQueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        WorkQueueSender { tx },
        WorkQueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

#[derive(Debug)]
pub struct WorkQueueSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for WorkQueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> WorkQueueSender<T> {
    pub async fn enqueue(&self, item: T) -> Result<(), QueueClosed> {
        self.tx.send(item).await.map_err(|_| QueueClosed)
    }
}

#[derive(Debug)]
pub struct WorkQueueReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for WorkQueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> WorkQueueReceiver<T> {
    /// Wait for the next item. Returns `None` once every sender is gone and
    /// the queue is empty.
    pub async fn dequeue(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Refuse further items. Items already queued can still be taken.
    pub async fn close(&self) {
        self.rx.lock().await.close();
    }

    /// Take an item only if one is already waiting.
    pub async fn try_dequeue(&self) -> Option<T> {
        self.rx.lock().await.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_enqueue_blocks_when_full() {
        let (tx, rx) = work_queue(2);
        tx.enqueue(1).await.unwrap();
        tx.enqueue(2).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.enqueue(3)).await;
        assert!(blocked.is_err(), "third enqueue should wait for space");

        assert_eq!(rx.dequeue().await, Some(1));
        tokio::time::timeout(Duration::from_secs(1), tx.enqueue(3))
            .await
            .expect("enqueue should proceed once a slot frees")
            .unwrap();

        assert_eq!(rx.dequeue().await, Some(2));
        assert_eq!(rx.dequeue().await, Some(3));
    }

    #[tokio::test]
    async fn test_workers_share_items_without_duplicates() {
        let (tx, rx) = work_queue(10);
        for i in 0..6 {
            tx.enqueue(i).await.unwrap();
        }
        drop(tx);

        let other = rx.clone();
        let mut seen = Vec::new();
        while let Some(item) = rx.dequeue().await {
            seen.push(item);
            if let Some(item) = other.dequeue().await {
                seen.push(item);
            }
        }

        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_enqueue_after_receivers_dropped() {
        let (tx, rx) = work_queue::<u32>(1);
        drop(rx);
        assert_eq!(tx.enqueue(1).await, Err(QueueClosed));
    }

    #[tokio::test]
    async fn test_close_keeps_queued_items() {
        let (tx, rx) = work_queue(4);
        tx.enqueue(1).await.unwrap();
        rx.close().await;

        assert_eq!(tx.enqueue(2).await, Err(QueueClosed));
        assert_eq!(rx.try_dequeue().await, Some(1));
        assert_eq!(rx.try_dequeue().await, None);
    }

    #[tokio::test]
    async fn test_try_dequeue_on_empty_queue() {
        let (_tx, rx) = work_queue::<u32>(1);
        assert_eq!(rx.try_dequeue().await, None);
    }
}
