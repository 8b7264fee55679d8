use anyhow::Result;
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::operation::abort_multipart_upload::AbortMultipartUploadOutput;
use aws_sdk_s3::operation::complete_multipart_upload::CompleteMultipartUploadOutput;
use aws_sdk_s3::operation::copy_object::CopyObjectOutput;
use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::operation::upload_part_copy::UploadPartCopyOutput;
use aws_sdk_s3::types::CompletedPart;
use dyn_clone::DynClone;

use crate::config::ClientConfig;
use crate::types::token::PipelineCancellationToken;
use crate::types::{CopyStatistics, StoragePath};

pub mod s3;

pub type Storage = Box<dyn StorageTrait + Send + Sync>;

pub struct StoragePair {
    pub source: Storage,
    pub target: Storage,
}

#[async_trait]
pub trait StorageFactory {
    async fn create(
        path: StoragePath,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<CopyStatistics>,
        client_config: Option<ClientConfig>,
    ) -> Result<Storage>;
}

/// Object storage bound to a single bucket.
///
/// Every operation addresses objects by full key. `copy_source` arguments are
/// `bucket/key` locators as produced by [`crate::types::ObjectReference::copy_source`].
#[async_trait]
pub trait StorageTrait: DynClone {
    fn bucket(&self) -> &str;

    /// One page of ListObjectsV2. The caller drives the continuation token.
    async fn list_objects_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> Result<ListObjectsV2Output>;

    async fn head_object(&self, key: &str) -> Result<HeadObjectOutput>;

    /// Server-side copy of `copy_source` into `key`.
    ///
    /// With `content_type` the object metadata is replaced and the content type is
    /// overridden. Without it the metadata is copied from the source.
    async fn copy_object(
        &self,
        key: &str,
        copy_source: &str,
        content_type: Option<String>,
    ) -> Result<CopyObjectOutput>;

    /// The content type, user-defined metadata and other system metadata of
    /// `source_head_object_output` are carried to the new upload.
    async fn create_multipart_upload(
        &self,
        key: &str,
        source_head_object_output: &HeadObjectOutput,
    ) -> Result<CreateMultipartUploadOutput>;

    async fn upload_part_copy(
        &self,
        key: &str,
        copy_source: &str,
        copy_source_range: &str,
        part_number: i32,
        upload_id: &str,
    ) -> Result<UploadPartCopyOutput>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        completed_parts: Vec<CompletedPart>,
    ) -> Result<CompleteMultipartUploadOutput>;

    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
    ) -> Result<AbortMultipartUploadOutput>;

    fn get_stats_sender(&self) -> Sender<CopyStatistics>;
    async fn send_stats(&self, stats: CopyStatistics);
}
