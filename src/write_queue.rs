use crate::errors::{AppError, AppResult};
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single-consumer queue that runs blocking storage writes one at a time, in
/// submission order.
#[derive(Clone)]
pub struct WriteQueue {
    name: &'static str,
    sender: mpsc::UnboundedSender<Job>,
}

impl WriteQueue {
    /// Spawns the consumer loop; must be called from inside a tokio runtime.
    pub fn start(name: &'static str) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                if let Err(error) = tokio::task::spawn_blocking(job).await {
                    tracing::error!(queue = name, error = %error, "write job aborted");
                }
            }
            tracing::debug!(queue = name, "write queue closed");
        });
        Self { name, sender }
    }

    /// Enqueues immediately; the returned handle only waits for the result.
    pub fn submit<T, F>(&self, operation: F) -> PendingWrite<T>
    where
        T: Send + 'static,
        F: FnOnce() -> AppResult<T> + Send + 'static,
    {
        let (reply, receiver) = oneshot::channel();
        let job: Job = Box::new(move || {
            let _ = reply.send(operation());
        });
        if self.sender.send(job).is_err() {
            tracing::warn!(queue = self.name, "write submitted after queue shutdown");
        }
        PendingWrite {
            queue: self.name,
            receiver,
        }
    }
}

#[must_use = "a pending write does nothing observable unless awaited"]
pub struct PendingWrite<T> {
    queue: &'static str,
    receiver: oneshot::Receiver<AppResult<T>>,
}

impl<T> PendingWrite<T> {
    pub async fn outcome(self) -> AppResult<T> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(AppError::Internal(format!(
                "{} write queue dropped the job",
                self.queue
            ))),
        }
    }
}
