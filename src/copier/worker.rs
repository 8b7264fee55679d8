use anyhow::{Error, Result};
use async_channel::{Receiver, Sender};
use tracing::{error, info, trace};

use crate::Config;
use crate::copier::object_copier::ObjectCopier;
use crate::storage::Storage;
use crate::types::error::is_cancelled_error;
use crate::types::token::PipelineCancellationToken;
use crate::types::{CopyStatistics, ObjectReference};

/// Pulls keys from the job queue and copies them until the queue is closed,
/// the run is cancelled, or a copy fails.
pub struct ObjectCopyWorker {
    worker_index: u16,
    source_bucket: String,
    target_bucket: String,
    dry_run: bool,
    object_copier: ObjectCopier,
    job_receiver: Receiver<String>,
    done_sender: Sender<String>,
    error_sender: Sender<Error>,
    cancellation_token: PipelineCancellationToken,
}

impl ObjectCopyWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_index: u16,
        config: Config,
        source: Storage,
        target: Storage,
        job_receiver: Receiver<String>,
        done_sender: Sender<String>,
        error_sender: Sender<Error>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            worker_index,
            source_bucket: source.bucket().to_string(),
            target_bucket: target.bucket().to_string(),
            dry_run: config.dry_run,
            object_copier: ObjectCopier::new(
                worker_index,
                config,
                source,
                target,
                cancellation_token.clone(),
            ),
            job_receiver,
            done_sender,
            error_sender,
            cancellation_token,
        }
    }

    pub async fn run(&self) {
        trace!(worker_index = self.worker_index, "copy worker has started.");

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    trace!(worker_index = self.worker_index, "copy worker has been cancelled.");
                    return;
                }
                recv_result = self.job_receiver.recv() => {
                    match recv_result {
                        Ok(key) => {
                            if let Err(e) = self.copy_key(&key).await {
                                self.report_error(&key, e).await;
                                return;
                            }

                            if self.done_sender.send(key).await.is_err() {
                                return;
                            }
                        }
                        Err(_) => {
                            // normal shutdown
                            trace!(worker_index = self.worker_index, "copy worker has been completed.");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn copy_key(&self, key: &str) -> Result<()> {
        if self.dry_run {
            info!(
                worker_index = self.worker_index,
                key = key,
                "[dry-run] copy completed."
            );
            return Ok(());
        }

        self.object_copier
            .copy(
                &ObjectReference::new(&self.source_bucket, key),
                &ObjectReference::new(&self.target_bucket, key),
            )
            .await?;

        self.object_copier.send_stats(CopyStatistics::CopyComplete {
            key: key.to_string(),
        })
        .await;

        Ok(())
    }

    async fn report_error(&self, key: &str, e: Error) {
        if !is_cancelled_error(&e) {
            self.object_copier.send_stats(CopyStatistics::CopyError {
                key: key.to_string(),
            })
            .await;

            error!(
                worker_index = self.worker_index,
                key = key,
                error = e.to_string(),
                source = e.source(),
                "copy worker has been cancelled with error."
            );
        }

        if let Err(e) = self.error_sender.try_send(e) {
            trace!(
                worker_index = self.worker_index,
                key = key,
                error = e.into_inner().to_string(),
                "another error has already been reported."
            );
        }
    }
}
