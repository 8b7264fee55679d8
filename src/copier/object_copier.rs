use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::Config;
use crate::copier::multipart_copier::MultipartCopier;
use crate::storage::Storage;
use crate::types::error::S3CopierError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{CopyStatistics, ObjectReference};

/// Chooses how a single object is copied.
///
/// Objects up to `multipart_threshold` bytes are copied with one CopyObject call,
/// larger ones with [`MultipartCopier`]. Keys matching the manifest pattern get their
/// source content type rewritten before the data copy.
pub struct ObjectCopier {
    worker_index: u16,
    config: Config,
    source: Storage,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
}

impl ObjectCopier {
    pub fn new(
        worker_index: u16,
        config: Config,
        source: Storage,
        target: Storage,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            worker_index,
            config,
            source,
            target,
            cancellation_token,
        }
    }

    pub async fn copy(&self, source: &ObjectReference, target: &ObjectReference) -> Result<()> {
        let head_object_output = self
            .source
            .head_object(source.key())
            .await
            .with_context(|| S3CopierError::MetadataFetchError {
                bucket: source.bucket().to_string(),
                key: source.key().to_string(),
            })?;
        let content_length = head_object_output.content_length().unwrap_or_default() as u64;

        if self.config.manifest_config.is_manifest_key(source.key()) {
            self.rewrite_manifest_content_type(source).await?;
        }

        if self
            .config
            .transfer_config
            .is_multipart_copy_required(content_length)
        {
            debug!(
                worker_index = self.worker_index,
                key = source.key(),
                content_length = content_length,
                "multipart copy selected."
            );

            MultipartCopier::new(
                self.worker_index,
                &self.source,
                &self.target,
                self.config.transfer_config.multipart_chunksize,
                &self.cancellation_token,
            )
            .copy(source, target)
            .await?;
        } else {
            self.copy_single_part(source, target, content_length).await?;
        }

        info!(
            worker_index = self.worker_index,
            key = target.key(),
            size = content_length,
            "copy completed."
        );

        Ok(())
    }

    pub async fn send_stats(&self, stats: CopyStatistics) {
        self.target.send_stats(stats).await;
    }

    async fn copy_single_part(
        &self,
        source: &ObjectReference,
        target: &ObjectReference,
        content_length: u64,
    ) -> Result<()> {
        let copy_object_output = self
            .target
            .copy_object(target.key(), &source.copy_source(), None)
            .await
            .with_context(|| S3CopierError::SinglePartCopyError {
                bucket: target.bucket().to_string(),
                key: target.key().to_string(),
            })?;

        debug!(
            worker_index = self.worker_index,
            key = target.key(),
            e_tag = copy_object_output
                .copy_object_result()
                .and_then(|result| result.e_tag()),
            "single part copy completed."
        );

        self.target
            .send_stats(CopyStatistics::CopyBytes(content_length))
            .await;

        Ok(())
    }

    // Same-object copy on the source with the content type replaced.
    async fn rewrite_manifest_content_type(&self, source: &ObjectReference) -> Result<()> {
        let content_type = self.config.manifest_config.content_type.clone();

        self.source
            .copy_object(source.key(), &source.copy_source(), Some(content_type.clone()))
            .await
            .with_context(|| S3CopierError::MetadataRewriteError {
                bucket: source.bucket().to_string(),
                key: source.key().to_string(),
            })?;

        self.source
            .send_stats(CopyStatistics::MetadataRewritten {
                key: source.key().to_string(),
            })
            .await;

        debug!(
            worker_index = self.worker_index,
            key = source.key(),
            content_type = content_type,
            "manifest content type rewritten."
        );

        Ok(())
    }
}
