use anyhow::{Error, Result, anyhow};
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::Config;
use crate::copier::lister::ObjectLister;
use crate::copier::worker::ObjectCopyWorker;
use crate::storage::s3::S3StorageFactory;
use crate::storage::{Storage, StorageFactory, StoragePair};
use crate::types::CopyStatistics;
use crate::types::error::S3CopierError;
use crate::types::token::PipelineCancellationToken;

pub mod lister;
pub mod multipart_copier;
pub mod object_copier;
pub mod part_planner;
pub mod worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingEvent {
    /// One key has been queued.
    Planned,
    /// The last page has been listed.
    Completed,
}

/// Counters owned by the control loop of [`Copier::copy_with_prefix`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunAccounting {
    pub planned_count: u64,
    pub completed_count: u64,
}

impl RunAccounting {
    pub fn is_fully_copied(&self) -> bool {
        self.completed_count == self.planned_count
    }
}

/// Copies every object under the source prefix to the target bucket with a pool of workers.
///
/// The first error stops the run. The cancellation token is cancelled, all spawned
/// tasks are joined and the error is returned.
pub struct Copier {
    config: Config,
    source: Storage,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    stats_receiver: Receiver<CopyStatistics>,
}

impl Copier {
    pub async fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Result<Self> {
        let (stats_sender, stats_receiver) = async_channel::unbounded();

        let source = S3StorageFactory::create(
            config.source.clone(),
            cancellation_token.clone(),
            stats_sender.clone(),
            config.source_client_config.clone(),
        )
        .await?;
        let target = S3StorageFactory::create(
            config.target.clone(),
            cancellation_token.clone(),
            stats_sender,
            config.target_client_config.clone(),
        )
        .await?;

        Ok(Self::with_storage_pair(
            config,
            StoragePair { source, target },
            cancellation_token,
            stats_receiver,
        ))
    }

    /// `stats_receiver` must belong to the channel the storages report to.
    pub fn with_storage_pair(
        config: Config,
        storage_pair: StoragePair,
        cancellation_token: PipelineCancellationToken,
        stats_receiver: Receiver<CopyStatistics>,
    ) -> Self {
        Self {
            config,
            source: storage_pair.source,
            target: storage_pair.target,
            cancellation_token,
            stats_receiver,
        }
    }

    pub fn get_stats_receiver(&self) -> Receiver<CopyStatistics> {
        self.stats_receiver.clone()
    }

    /// Runs the copy once. The stats channel is closed when this returns, and the
    /// cancellation token stays cancelled after a failed run.
    pub async fn copy_with_prefix(self) -> Result<()> {
        debug!(
            source_bucket = self.source.bucket(),
            prefix = self.config.source.prefix,
            target_bucket = self.target.bucket(),
            worker_size = self.config.worker_size,
            "copy has started."
        );

        let queue_capacity = self.config.queue_capacity.max(1);
        let (job_sender, job_receiver) = async_channel::bounded(queue_capacity);
        let (done_sender, done_receiver) = async_channel::bounded(queue_capacity);
        let (event_sender, event_receiver) = async_channel::bounded(queue_capacity);
        let (error_sender, error_receiver) = async_channel::bounded(1);

        let mut join_handles = self.spawn_workers(&job_receiver, &done_sender, &error_sender);
        join_handles.push(self.spawn_lister(job_sender, event_sender, error_sender));
        drop(job_receiver);
        drop(done_sender);

        let result = self
            .wait_for_completion(event_receiver, done_receiver, error_receiver)
            .await;

        if result.is_err() {
            self.cancellation_token.cancel();
        }

        for join_handle in join_handles {
            if let Err(e) = join_handle.await {
                error!(error = e.to_string(), "copy task has panicked.");
            }
        }

        self.source.get_stats_sender().close();

        result
    }

    fn spawn_workers(
        &self,
        job_receiver: &Receiver<String>,
        done_sender: &Sender<String>,
        error_sender: &Sender<Error>,
    ) -> Vec<JoinHandle<()>> {
        (0..self.config.worker_size.max(1))
            .map(|worker_index| {
                let worker = ObjectCopyWorker::new(
                    worker_index,
                    self.config.clone(),
                    dyn_clone::clone_box(&*self.source),
                    dyn_clone::clone_box(&*self.target),
                    job_receiver.clone(),
                    done_sender.clone(),
                    error_sender.clone(),
                    self.cancellation_token.clone(),
                );

                tokio::spawn(async move { worker.run().await })
            })
            .collect()
    }

    fn spawn_lister(
        &self,
        job_sender: Sender<String>,
        event_sender: Sender<ListingEvent>,
        error_sender: Sender<Error>,
    ) -> JoinHandle<()> {
        let lister = ObjectLister::new(
            dyn_clone::clone_box(&*self.source),
            &self.config.source.prefix,
            self.config.max_keys,
            job_sender,
            event_sender,
            error_sender,
            self.cancellation_token.clone(),
        );

        tokio::spawn(async move { lister.list().await })
    }

    async fn wait_for_completion(
        &self,
        event_receiver: Receiver<ListingEvent>,
        done_receiver: Receiver<String>,
        error_receiver: Receiver<Error>,
    ) -> Result<()> {
        let mut accounting = RunAccounting::default();
        let mut listing_completed = false;
        let mut listing_closed = false;
        let mut workers_closed = false;
        let mut errors_closed = false;

        loop {
            if listing_completed && accounting.is_fully_copied() {
                info!(
                    planned_count = accounting.planned_count,
                    completed_count = accounting.completed_count,
                    "copy has been completed."
                );
                return Ok(());
            }

            if errors_closed && (workers_closed || (listing_closed && !listing_completed)) {
                return Err(anyhow!(
                    "copy tasks have exited before all objects were copied. planned={} completed={}",
                    accounting.planned_count,
                    accounting.completed_count
                ));
            }

            tokio::select! {
                biased;
                error = error_receiver.recv(), if !errors_closed => {
                    match error {
                        Ok(e) => return Err(e),
                        Err(_) => errors_closed = true,
                    }
                }
                _ = self.cancellation_token.cancelled() => {
                    trace!("copy has been cancelled.");
                    return Err(anyhow!(S3CopierError::Cancelled));
                }
                event = event_receiver.recv(), if !listing_closed => {
                    match event {
                        Ok(ListingEvent::Planned) => accounting.planned_count += 1,
                        Ok(ListingEvent::Completed) => listing_completed = true,
                        Err(_) => listing_closed = true,
                    }
                }
                done = done_receiver.recv(), if !workers_closed => {
                    match done {
                        Ok(key) => {
                            accounting.completed_count += 1;
                            trace!(key = key, completed_count = accounting.completed_count, "copy job done.");
                        }
                        Err(_) => workers_closed = true,
                    }
                }
            }
        }
    }
}
