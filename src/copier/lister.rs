use anyhow::{Error, Result};
use async_channel::Sender;
use tracing::{debug, error, trace};

use crate::copier::ListingEvent;
use crate::storage::Storage;
use crate::types::error::{S3CopierError, is_cancelled_error};
use crate::types::token::PipelineCancellationToken;

/// Walks every ListObjectsV2 page under a prefix and enqueues each key as a copy job.
pub struct ObjectLister {
    source: Storage,
    prefix: String,
    max_keys: i32,
    job_sender: Sender<String>,
    event_sender: Sender<ListingEvent>,
    error_sender: Sender<Error>,
    cancellation_token: PipelineCancellationToken,
}

impl ObjectLister {
    pub fn new(
        source: Storage,
        prefix: &str,
        max_keys: i32,
        job_sender: Sender<String>,
        event_sender: Sender<ListingEvent>,
        error_sender: Sender<Error>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            source,
            prefix: prefix.to_string(),
            max_keys,
            job_sender,
            event_sender,
            error_sender,
            cancellation_token,
        }
    }

    pub async fn list(&self) {
        trace!(prefix = self.prefix, "list objects has started.");

        match self.list_all_pages().await {
            Ok(true) => {
                let _ = self.event_sender.send(ListingEvent::Completed).await;
                debug!(prefix = self.prefix, "list objects has been completed.");
            }
            Ok(false) => {
                trace!(prefix = self.prefix, "list objects has been stopped.");
            }
            Err(e) => {
                if is_cancelled_error(&e) {
                    trace!(prefix = self.prefix, "list objects has been cancelled.");
                } else {
                    error!(
                        bucket = self.source.bucket(),
                        prefix = self.prefix,
                        error = e.to_string(),
                        source = e.source(),
                        "list objects has failed."
                    );
                }
                let _ = self.error_sender.try_send(e);
            }
        }
    }

    // Ok(false) means the run was stopped before the last page.
    async fn list_all_pages(&self) -> Result<bool> {
        let mut continuation_token = None;

        loop {
            if self.cancellation_token.is_cancelled() {
                return Ok(false);
            }

            // A ListingError context would shadow Cancelled on downcast.
            let list_objects_output = match self
                .source
                .list_objects_page(&self.prefix, continuation_token, self.max_keys)
                .await
            {
                Ok(list_objects_output) => list_objects_output,
                Err(e) if is_cancelled_error(&e) => return Err(e),
                Err(e) => {
                    return Err(e.context(S3CopierError::ListingError {
                        bucket: self.source.bucket().to_string(),
                        prefix: self.prefix.clone(),
                    }));
                }
            };

            for object in list_objects_output.contents() {
                let Some(key) = object.key() else {
                    continue;
                };

                if self.event_sender.send(ListingEvent::Planned).await.is_err()
                    || self.job_sender.send(key.to_string()).await.is_err()
                {
                    return Ok(false);
                }

                trace!(key = key, "copy job queued.");
            }

            continuation_token = list_objects_output
                .next_continuation_token()
                .map(|token| token.to_string());
            if !list_objects_output.is_truncated().unwrap_or_default()
                || continuation_token.is_none()
            {
                return Ok(true);
            }
        }
    }
}
