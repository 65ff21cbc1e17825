//! Background training queue
//!
//! Log writes submit a user id; a single worker drains the channel and runs
//! each training job on the blocking pool. Callers never observe the result.
//! A user with a job still waiting in the queue is not queued again: that job
//! will already see the new events when it runs.

use crate::trainer::ModelTrainer;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// User ids with a job queued but not yet started
type Pending = Arc<Mutex<HashSet<String>>>;

/// Fire-and-forget executor for training jobs
pub struct TrainingQueue {
    sender: mpsc::UnboundedSender<String>,
    pending: Pending,
    worker: JoinHandle<usize>,
}

impl TrainingQueue {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn spawn(trainer: Arc<ModelTrainer>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
        let pending: Pending = Arc::default();
        let worker_pending = Arc::clone(&pending);

        let worker = tokio::spawn(async move {
            let mut completed = 0;
            while let Some(user_id) = receiver.recv().await {
                // Released before training so later logs queue a fresh run
                if let Ok(mut pending) = worker_pending.lock() {
                    pending.remove(&user_id);
                }

                let trainer = Arc::clone(&trainer);
                let job_user = user_id.clone();
                match tokio::task::spawn_blocking(move || trainer.train(&job_user)).await {
                    Ok(Ok(trained)) => {
                        log::debug!("training job for user {user_id} finished (trained: {trained})")
                    }
                    Ok(Err(e)) => log::warn!("training job for user {user_id} failed: {e}"),
                    Err(e) => log::warn!("training job for user {user_id} panicked: {e}"),
                }
                completed += 1;
            }
            completed
        });

        Self {
            sender,
            pending,
            worker,
        }
    }

    /// Queue a training job, or fold it into one already waiting for the same
    /// user. Returns false if the worker has stopped.
    pub fn submit(&self, user_id: &str) -> bool {
        if let Ok(mut pending) = self.pending.lock() {
            if !pending.insert(user_id.to_string()) {
                log::debug!("training job for user {user_id} already queued");
                return true;
            }
        }

        if self.sender.send(user_id.to_string()).is_ok() {
            return true;
        }
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(user_id);
        }
        false
    }

    /// Close the queue and wait for queued jobs to finish. Returns the number
    /// of jobs processed.
    pub async fn shutdown(self) -> usize {
        let TrainingQueue { sender, worker, .. } = self;
        drop(sender);
        match worker.await {
            Ok(completed) => completed,
            Err(e) => {
                log::warn!("training worker stopped abnormally: {e}");
                0
            }
        }
    }
}
