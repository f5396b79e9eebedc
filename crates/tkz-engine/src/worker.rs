//! Dedicated worker thread for the single engine instance.
//!
//! The engine has shared linear memory and a shared virtual filesystem, so
//! concurrent calls would corrupt its internal state. [`spawn`] moves the
//! instance onto one `std::thread` and hands out an [`EngineHandle`] whose
//! `texify` submits a job over a channel and awaits the reply. The channel
//! is the serialization point: the worker processes exactly one job at a
//! time, in submission order.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use tokio::sync::{oneshot, watch};

use crate::{EngineError, EngineStatus, TexOptions, Typesetter};

struct Job {
    document: String,
    options: TexOptions,
    reply: oneshot::Sender<Result<String, EngineError>>,
}

enum Message {
    Render(Job),
    Shutdown,
}

/// Owner of the worker thread.
///
/// Call [`shutdown`](Self::shutdown) to stop the thread and wait for it to
/// exit. Dropping the worker without shutting down signals the thread to
/// stop but does not wait for it.
pub struct EngineWorker {
    thread: Option<thread::JoinHandle<()>>,
    tx: mpsc::Sender<Message>,
}

impl EngineWorker {
    /// Stop the worker and wait for the thread to exit.
    ///
    /// Jobs queued before the shutdown signal are still processed; calls
    /// submitted afterwards get [`EngineError::WorkerGone`].
    pub fn shutdown(mut self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("engine worker thread panicked");
        }
    }
}

impl Drop for EngineWorker {
    fn drop(&mut self) {
        // Not joining here: drop may run on an async thread and the worker
        // could still be mid-render.
        let _ = self.tx.send(Message::Shutdown);
    }
}

/// Cloneable, asynchronous handle to the engine worker.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Message>,
    status: watch::Receiver<EngineStatus>,
}

impl EngineHandle {
    /// Current lifecycle state of the engine instance.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    /// Typeset one document on the worker thread.
    ///
    /// Calls are queued and processed strictly one at a time. Submitting
    /// while the engine is still initializing is fine; the job waits.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Render`] when the engine produced no output page
    /// - [`EngineError::Unavailable`] when engine initialization failed
    /// - [`EngineError::WorkerGone`] when the worker has shut down
    pub async fn texify(
        &self,
        document: &str,
        options: &TexOptions,
    ) -> Result<String, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            document: document.to_owned(),
            options: options.clone(),
            reply: reply_tx,
        };
        self.tx
            .send(Message::Render(job))
            .map_err(|_| EngineError::WorkerGone)?;
        reply_rx.await.map_err(|_| EngineError::WorkerGone)?
    }
}

/// Move `typesetter` onto a dedicated worker thread.
///
/// The thread loads the engine from `asset_root` first, publishing
/// [`EngineStatus`] transitions through the handle, then serves jobs until
/// shut down. If loading fails the thread stays alive and answers every job
/// with [`EngineError::Unavailable`], so callers observe a definite failure
/// instead of a hang.
#[must_use]
pub fn spawn<T: Typesetter>(typesetter: T, asset_root: PathBuf) -> (EngineWorker, EngineHandle) {
    let (tx, rx) = mpsc::channel::<Message>();
    let (status_tx, status_rx) = watch::channel(EngineStatus::Initializing);

    let thread = thread::spawn(move || run_worker(typesetter, &asset_root, &rx, &status_tx));

    let worker = EngineWorker {
        thread: Some(thread),
        tx: tx.clone(),
    };
    let handle = EngineHandle {
        tx,
        status: status_rx,
    };
    (worker, handle)
}

fn run_worker<T: Typesetter>(
    mut typesetter: T,
    asset_root: &std::path::Path,
    rx: &mpsc::Receiver<Message>,
    status: &watch::Sender<EngineStatus>,
) {
    match typesetter.load(asset_root) {
        Ok(()) => {
            tracing::debug!("engine loaded from {}", asset_root.display());
            let _ = status.send(EngineStatus::Ready);
        }
        Err(e) => {
            tracing::error!("engine failed to load: {e}");
            let _ = status.send(EngineStatus::Failed);
            let reason = e.to_string();
            // Keep answering so queued callers are not left hanging.
            while let Ok(message) = rx.recv() {
                match message {
                    Message::Render(job) => {
                        let _ = job.reply.send(Err(EngineError::Unavailable(reason.clone())));
                    }
                    Message::Shutdown => break,
                }
            }
            return;
        }
    }

    while let Ok(message) = rx.recv() {
        match message {
            Message::Render(job) => {
                let result = typesetter.texify(&job.document, &job.options);
                if let Err(e) = &result {
                    tracing::debug!("engine call failed: {e}");
                }
                // Receiver may have been dropped on teardown; nothing to do then.
                let _ = job.reply.send(result);
            }
            Message::Shutdown => break,
        }
    }
    tracing::debug!("engine worker exiting");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::MockTypesetter;

    #[tokio::test]
    async fn test_texify_returns_markup() {
        let (worker, handle) = spawn(MockTypesetter::fixed("<svg>ok</svg>"), "assets".into());

        let markup = handle.texify("doc", &TexOptions::default()).await.unwrap();
        assert_eq!(markup, "<svg>ok</svg>");

        worker.shutdown();
    }

    #[tokio::test]
    async fn test_status_becomes_ready() {
        let (worker, handle) = spawn(MockTypesetter::fixed("<svg/>"), "assets".into());

        // A completed call implies load finished
        handle.texify("doc", &TexOptions::default()).await.unwrap();
        assert_eq!(handle.status(), EngineStatus::Ready);

        worker.shutdown();
    }

    #[tokio::test]
    async fn test_failed_load_answers_unavailable() {
        let (worker, handle) = spawn(
            MockTypesetter::failing_load("snapshot corrupt"),
            "assets".into(),
        );

        let err = handle
            .texify("doc", &TexOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
        assert!(err.to_string().contains("snapshot corrupt"));
        assert_eq!(handle.status(), EngineStatus::Failed);

        worker.shutdown();
    }

    #[tokio::test]
    async fn test_render_error_carries_log() {
        let (worker, handle) = spawn(
            MockTypesetter::with_response(|_, _| {
                Err(EngineError::Render {
                    log: "! Undefined control sequence.".to_owned(),
                })
            }),
            "assets".into(),
        );

        let err = handle
            .texify("doc", &TexOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Render { .. }));
        assert!(err.to_string().contains("Undefined control sequence"));

        worker.shutdown();
    }

    #[tokio::test]
    async fn test_calls_are_serialized() {
        // Counter of concurrently running texify calls; must never exceed 1.
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (active2, peak2) = (Arc::clone(&active), Arc::clone(&peak));

        let (worker, handle) = spawn(
            MockTypesetter::with_response(move |doc, _| {
                let now = active2.fetch_add(1, Ordering::SeqCst) + 1;
                peak2.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                active2.fetch_sub(1, Ordering::SeqCst);
                Ok(format!("<svg>{doc}</svg>"))
            }),
            "assets".into(),
        );

        let mut tasks = Vec::new();
        for i in 0..4 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .texify(&format!("doc-{i}"), &TexOptions::default())
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        worker.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_fails_new_calls() {
        let (worker, handle) = spawn(MockTypesetter::fixed("<svg/>"), "assets".into());
        worker.shutdown();

        let err = handle
            .texify("doc", &TexOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::WorkerGone));
    }
}
