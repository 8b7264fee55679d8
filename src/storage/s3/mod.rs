use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::operation::abort_multipart_upload::AbortMultipartUploadOutput;
use aws_sdk_s3::operation::complete_multipart_upload::CompleteMultipartUploadOutput;
use aws_sdk_s3::operation::copy_object::CopyObjectOutput;
use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::operation::upload_part_copy::UploadPartCopyOutput;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, MetadataDirective};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::storage::{Storage, StorageFactory, StorageTrait};
use crate::types::error::S3CopierError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{CopyStatistics, StoragePath};

mod client_builder;

// RFC 3986 unreserved characters and the path separator are left as is.
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const CLIENT_CONFIG_REQUIRED: &str = "s3 storage requires a client config.";

pub struct S3StorageFactory {}

#[async_trait]
impl StorageFactory for S3StorageFactory {
    async fn create(
        path: StoragePath,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<CopyStatistics>,
        client_config: Option<ClientConfig>,
    ) -> Result<Storage> {
        let client_config = client_config.ok_or_else(|| anyhow!(CLIENT_CONFIG_REQUIRED))?;

        Ok(S3Storage::boxed_new(
            path,
            cancellation_token,
            stats_sender,
            Some(Arc::new(client_config.create_client().await)),
        ))
    }
}

#[derive(Clone)]
struct S3Storage {
    bucket: String,
    cancellation_token: PipelineCancellationToken,
    client: Option<Arc<Client>>,
    stats_sender: Sender<CopyStatistics>,
}

impl S3Storage {
    fn boxed_new(
        path: StoragePath,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<CopyStatistics>,
        client: Option<Arc<Client>>,
    ) -> Storage {
        let storage = S3Storage {
            bucket: path.bucket,
            cancellation_token,
            client,
            stats_sender,
        };

        Box::new(storage)
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_deref()
            .ok_or_else(|| anyhow!(CLIENT_CONFIG_REQUIRED))
    }
}

#[async_trait]
impl StorageTrait for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> Result<ListObjectsV2Output> {
        if self.cancellation_token.is_cancelled() {
            trace!(bucket = self.bucket, "list_objects_page() canceled.");
            return Err(anyhow!(S3CopierError::Cancelled));
        }

        let list_objects_output = self
            .client()?
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token)
            .max_keys(max_keys)
            .send()
            .await
            .context("aws_sdk_s3::client::list_objects_v2() failed.")?;

        debug!(
            bucket = self.bucket,
            prefix = prefix,
            key_count = list_objects_output.key_count(),
            is_truncated = list_objects_output.is_truncated(),
            "list_objects_v2() page received."
        );

        Ok(list_objects_output)
    }

    async fn head_object(&self, key: &str) -> Result<HeadObjectOutput> {
        let result = self
            .client()?
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("aws_sdk_s3::client::head_object() failed.")?;

        Ok(result)
    }

    async fn copy_object(
        &self,
        key: &str,
        copy_source: &str,
        content_type: Option<String>,
    ) -> Result<CopyObjectOutput> {
        let metadata_directive = content_type.as_ref().map(|_| MetadataDirective::Replace);

        let copy_object_output = self
            .client()?
            .copy_object()
            .bucket(&self.bucket)
            .key(key)
            .copy_source(encode_copy_source(copy_source))
            .set_metadata_directive(metadata_directive)
            .set_content_type(content_type)
            .send()
            .await
            .context("aws_sdk_s3::client::copy_object() failed.")?;

        trace!(key = key, "{copy_object_output:?}");

        Ok(copy_object_output)
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        source_head_object_output: &HeadObjectOutput,
    ) -> Result<CreateMultipartUploadOutput> {
        let create_multipart_upload_output = self
            .client()?
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_metadata(source_head_object_output.metadata().cloned())
            .set_content_type(
                source_head_object_output
                    .content_type()
                    .map(|value| value.to_string()),
            )
            .set_content_encoding(
                source_head_object_output
                    .content_encoding()
                    .map(|value| value.to_string()),
            )
            .set_cache_control(
                source_head_object_output
                    .cache_control()
                    .map(|value| value.to_string()),
            )
            .set_content_disposition(
                source_head_object_output
                    .content_disposition()
                    .map(|value| value.to_string()),
            )
            .set_content_language(
                source_head_object_output
                    .content_language()
                    .map(|value| value.to_string()),
            )
            .send()
            .await
            .context("aws_sdk_s3::client::create_multipart_upload() failed.")?;

        trace!(key = key, "{create_multipart_upload_output:?}");

        Ok(create_multipart_upload_output)
    }

    async fn upload_part_copy(
        &self,
        key: &str,
        copy_source: &str,
        copy_source_range: &str,
        part_number: i32,
        upload_id: &str,
    ) -> Result<UploadPartCopyOutput> {
        let upload_part_copy_output = self
            .client()?
            .upload_part_copy()
            .bucket(&self.bucket)
            .key(key)
            .copy_source(encode_copy_source(copy_source))
            .copy_source_range(copy_source_range)
            .part_number(part_number)
            .upload_id(upload_id)
            .send()
            .await
            .context("aws_sdk_s3::client::upload_part_copy() failed.")?;

        trace!(key = key, "{upload_part_copy_output:?}");

        Ok(upload_part_copy_output)
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        completed_parts: Vec<CompletedPart>,
    ) -> Result<CompleteMultipartUploadOutput> {
        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        let complete_multipart_upload_output = self
            .client()?
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .context("aws_sdk_s3::client::complete_multipart_upload() failed.")?;

        trace!(
            key = key,
            upload_id = upload_id,
            "{complete_multipart_upload_output:?}"
        );

        Ok(complete_multipart_upload_output)
    }

    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
    ) -> Result<AbortMultipartUploadOutput> {
        let abort_multipart_upload_output = self
            .client()?
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .context("aws_sdk_s3::client::abort_multipart_upload() failed.")?;

        Ok(abort_multipart_upload_output)
    }

    fn get_stats_sender(&self) -> Sender<CopyStatistics> {
        self.stats_sender.clone()
    }

    async fn send_stats(&self, stats: CopyStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}

pub fn encode_copy_source(copy_source: &str) -> String {
    utf8_percent_encode(copy_source, COPY_SOURCE_ENCODE_SET).to_string()
}
