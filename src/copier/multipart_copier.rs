use anyhow::{Context, Result, anyhow};
use aws_sdk_s3::types::CompletedPart;
use tracing::{debug, trace, warn};

use crate::copier::part_planner::{PartDescriptor, plan_parts};
use crate::storage::Storage;
use crate::types::error::S3CopierError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{CopyStatistics, ObjectReference};

/// Copies one object with CreateMultipartUpload, UploadPartCopy and CompleteMultipartUpload.
///
/// Parts are copied one at a time in ascending order. Once an upload has been created,
/// every failure exit aborts it before the error is returned.
pub struct MultipartCopier<'a> {
    worker_index: u16,
    source: &'a Storage,
    target: &'a Storage,
    multipart_chunksize: u64,
    cancellation_token: &'a PipelineCancellationToken,
}

impl<'a> MultipartCopier<'a> {
    pub fn new(
        worker_index: u16,
        source: &'a Storage,
        target: &'a Storage,
        multipart_chunksize: u64,
        cancellation_token: &'a PipelineCancellationToken,
    ) -> Self {
        Self {
            worker_index,
            source,
            target,
            multipart_chunksize,
            cancellation_token,
        }
    }

    pub async fn copy(&self, source: &ObjectReference, target: &ObjectReference) -> Result<()> {
        let source_head_object_output = self
            .source
            .head_object(source.key())
            .await
            .with_context(|| S3CopierError::MetadataFetchError {
                bucket: source.bucket().to_string(),
                key: source.key().to_string(),
            })?;
        let content_length = source_head_object_output.content_length().unwrap_or_default() as u64;
        let parts = plan_parts(content_length, self.multipart_chunksize)?;

        let init_error = || S3CopierError::MultipartInitError {
            bucket: target.bucket().to_string(),
            key: target.key().to_string(),
        };
        let create_multipart_upload_output = self
            .target
            .create_multipart_upload(target.key(), &source_head_object_output)
            .await
            .with_context(init_error)?;
        let upload_id = create_multipart_upload_output
            .upload_id()
            .context("upload_id is missing in CreateMultipartUpload response.")
            .with_context(init_error)?
            .to_string();

        debug!(
            worker_index = self.worker_index,
            key = target.key(),
            upload_id = upload_id,
            content_length = content_length,
            "multipart upload created."
        );

        let result = self
            .copy_parts_and_complete(source, target, parts, &upload_id)
            .await;
        if result.is_err() {
            self.abort(target, &upload_id).await;
        }

        result
    }

    async fn copy_parts_and_complete(
        &self,
        source: &ObjectReference,
        target: &ObjectReference,
        parts: Vec<PartDescriptor>,
        upload_id: &str,
    ) -> Result<()> {
        let copy_source = source.copy_source();
        let mut completed_parts = Vec::with_capacity(parts.len());

        for part in parts {
            if self.cancellation_token.is_cancelled() {
                trace!(
                    worker_index = self.worker_index,
                    key = target.key(),
                    part_number = part.part_number,
                    "multipart copy has been cancelled."
                );
                return Err(anyhow!(S3CopierError::Cancelled));
            }

            let part_copy_error = || S3CopierError::PartCopyError {
                bucket: target.bucket().to_string(),
                key: target.key().to_string(),
                upload_id: upload_id.to_string(),
                part_number: part.part_number,
            };

            let upload_part_copy_output = self
                .target
                .upload_part_copy(
                    target.key(),
                    &copy_source,
                    &part.range_header(),
                    part.part_number,
                    upload_id,
                )
                .await
                .with_context(part_copy_error)?;
            let e_tag = upload_part_copy_output
                .copy_part_result()
                .and_then(|copy_part_result| copy_part_result.e_tag())
                .context("e_tag is missing in UploadPartCopy response.")
                .with_context(part_copy_error)?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(normalize_e_tag(e_tag))
                    .build(),
            );

            self.target
                .send_stats(CopyStatistics::PartCopied {
                    key: target.key().to_string(),
                    part_number: part.part_number,
                })
                .await;
            self.target
                .send_stats(CopyStatistics::CopyBytes(part.size()))
                .await;

            trace!(
                worker_index = self.worker_index,
                key = target.key(),
                part_number = part.part_number,
                range = part.range_header(),
                "part copied."
            );
        }

        let complete_multipart_upload_output = self
            .target
            .complete_multipart_upload(target.key(), upload_id, completed_parts)
            .await
            .with_context(|| S3CopierError::CompleteUploadError {
                bucket: target.bucket().to_string(),
                key: target.key().to_string(),
                upload_id: upload_id.to_string(),
            })?;

        trace!(key = target.key(), "{complete_multipart_upload_output:?}");

        Ok(())
    }

    async fn abort(&self, target: &ObjectReference, upload_id: &str) {
        match self
            .target
            .abort_multipart_upload(target.key(), upload_id)
            .await
        {
            Ok(_) => {
                debug!(
                    worker_index = self.worker_index,
                    key = target.key(),
                    upload_id = upload_id,
                    "multipart upload aborted."
                );
            }
            Err(e) => {
                self.target
                    .send_stats(CopyStatistics::CopyWarning {
                        key: target.key().to_string(),
                    })
                    .await;
                warn!(
                    worker_index = self.worker_index,
                    key = target.key(),
                    upload_id = upload_id,
                    error = e.to_string(),
                    source = e.source(),
                    "failed to abort multipart upload."
                );
            }
        }
    }
}

/// Strips one pair of surrounding double quotes.
pub fn normalize_e_tag(e_tag: &str) -> &str {
    e_tag
        .strip_prefix('"')
        .and_then(|e_tag| e_tag.strip_suffix('"'))
        .unwrap_or(e_tag)
}
