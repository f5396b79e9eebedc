//! Single-flight render queue.
//!
//! The engine instance is shared and non-reentrant, so batches of elements
//! must go through it strictly one after another. The queue is an explicit
//! FIFO chain of completion signals: enqueueing claims a slot behind the
//! current tail *synchronously*, so slot order is fixed at discovery time
//! even though batch work runs in spawned tasks that may start in any
//! order.
//!
//! Each [`BatchTicket`] holds the previous batch's completion receiver and
//! its own completion sender. Waiting on the ticket resolves once the
//! predecessor finishes. A ticket dropped while its predecessor is still
//! pending (an abandoned batch, or a batch task cancelled mid-wait)
//! forwards that predecessor to the successor, so a dropped slot neither
//! wedges the queue nor lets two batches overlap.

use std::sync::Mutex;

use tokio::sync::oneshot;

/// Link passed to a successor when a ticket is abandoned: the predecessor
/// receiver the abandoned batch was still responsible for.
struct Forwarded(Option<oneshot::Receiver<Forwarded>>);

/// FIFO queue of batch-completion signals.
///
/// At most one batch is active at any instant; batches complete in the
/// order [`enqueue`](Self::enqueue) was called.
#[derive(Default)]
pub struct RenderQueue {
    tail: Mutex<Option<oneshot::Receiver<Forwarded>>>,
}

impl RenderQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next queue slot.
    ///
    /// Synchronous on purpose: callers claim their slot in discovery order
    /// before handing the actual work to a task.
    #[must_use]
    pub fn enqueue(&self) -> BatchTicket {
        let (done_tx, done_rx) = oneshot::channel();
        let previous = self.tail.lock().unwrap().replace(done_rx);
        BatchTicket {
            previous,
            done: Some(done_tx),
        }
    }
}

/// Pending-operation handle for one batch.
///
/// Dropping the ticket (normally, after the batch's last element resolves)
/// signals the successor batch to start.
pub struct BatchTicket {
    previous: Option<oneshot::Receiver<Forwarded>>,
    done: Option<oneshot::Sender<Forwarded>>,
}

impl BatchTicket {
    /// Wait until every earlier batch has fully completed.
    ///
    /// Cancellation safe: the pending receiver stays in the ticket across
    /// suspension, so a ticket whose wait was cancelled still forwards its
    /// predecessor on drop.
    pub async fn wait(&mut self) {
        while let Some(receiver) = self.previous.as_mut() {
            match receiver.await {
                // Predecessor was abandoned and handed us its own
                // predecessor; keep waiting on that.
                Ok(Forwarded(older)) => self.previous = older,
                // Sender dropped after its work: predecessor completed.
                Err(_) => self.previous = None,
            }
        }
    }
}

impl Drop for BatchTicket {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take()
            && let Some(done) = self.done.take()
        {
            // Never waited: pass the pending predecessor to the successor
            // instead of falsely signalling completion.
            let _ = done.send(Forwarded(Some(previous)));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;

    fn spawn_batch(
        queue: &RenderQueue,
        log: &Arc<Mutex<Vec<String>>>,
        name: &str,
        work: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let mut ticket = queue.enqueue();
        let log = Arc::clone(log);
        let name = name.to_owned();
        tokio::spawn(async move {
            ticket.wait().await;
            log.lock().unwrap().push(format!("{name}:start"));
            sleep(work).await;
            log.lock().unwrap().push(format!("{name}:done"));
        })
    }

    #[tokio::test]
    async fn test_batches_complete_in_fifo_order() {
        let queue = RenderQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        // A is slow; B and C are instant but enqueued after it.
        let a = spawn_batch(&queue, &log, "a", Duration::from_millis(100));
        let b = spawn_batch(&queue, &log, "b", Duration::ZERO);
        let c = spawn_batch(&queue, &log, "c", Duration::ZERO);

        for task in [a, b, c] {
            task.await.unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec!["a:start", "a:done", "b:start", "b:done", "c:start", "c:done"]
        );
    }

    #[tokio::test]
    async fn test_later_batch_never_starts_before_predecessor_finishes() {
        let queue = RenderQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = spawn_batch(&queue, &log, "a", Duration::from_millis(50));
        let b = spawn_batch(&queue, &log, "b", Duration::ZERO);
        a.await.unwrap();
        b.await.unwrap();

        let log = log.lock().unwrap();
        let a_done = log.iter().position(|e| e == "a:done").unwrap();
        let b_start = log.iter().position(|e| e == "b:start").unwrap();
        assert!(a_done < b_start);
    }

    #[tokio::test]
    async fn test_abandoned_batch_unblocks_successor() {
        let queue = RenderQueue::new();

        // First batch claims a slot and is dropped without running.
        let abandoned = queue.enqueue();
        drop(abandoned);

        let mut ticket = queue.enqueue();
        // Must resolve promptly instead of hanging.
        tokio::time::timeout(Duration::from_millis(100), ticket.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_batch_does_not_break_ordering() {
        let queue = RenderQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        // A runs slowly, B is abandoned, C must still wait for A.
        let a = spawn_batch(&queue, &log, "a", Duration::from_millis(50));
        let abandoned = queue.enqueue();
        let c = spawn_batch(&queue, &log, "c", Duration::ZERO);
        drop(abandoned);

        a.await.unwrap();
        c.await.unwrap();

        let log = log.lock().unwrap();
        let a_done = log.iter().position(|e| e == "a:done").unwrap();
        let c_start = log.iter().position(|e| e == "c:start").unwrap();
        assert!(a_done < c_start);
    }

    #[tokio::test]
    async fn test_cancelled_mid_wait_batch_does_not_break_ordering() {
        let queue = RenderQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        // A runs slowly; B's task is aborted while parked in wait(); C
        // must still wait for A to finish.
        let a = spawn_batch(&queue, &log, "a", Duration::from_millis(50));
        let mut ticket_b = queue.enqueue();
        let b = tokio::spawn(async move {
            ticket_b.wait().await;
        });
        let c = spawn_batch(&queue, &log, "c", Duration::ZERO);

        // Let B reach its suspension point before killing it.
        sleep(Duration::from_millis(10)).await;
        b.abort();

        a.await.unwrap();
        c.await.unwrap();

        let log = log.lock().unwrap();
        let a_done = log.iter().position(|e| e == "a:done").unwrap();
        let c_start = log.iter().position(|e| e == "c:start").unwrap();
        assert!(a_done < c_start);
    }

    #[tokio::test]
    async fn test_first_batch_starts_immediately() {
        let queue = RenderQueue::new();
        let mut ticket = queue.enqueue();
        tokio::time::timeout(Duration::from_millis(10), ticket.wait())
            .await
            .unwrap();
    }
}
