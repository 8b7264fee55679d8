use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::operation::abort_multipart_upload::AbortMultipartUploadOutput;
use aws_sdk_s3::operation::complete_multipart_upload::CompleteMultipartUploadOutput;
use aws_sdk_s3::operation::copy_object::CopyObjectOutput;
use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::operation::upload_part_copy::UploadPartCopyOutput;
use aws_sdk_s3::types::{CompletedPart, CopyPartResult, Object};

use crate::Config;
use crate::storage::{Storage, StoragePair, StorageTrait};
use crate::types::error::S3CopierError;
use crate::types::{CopyStatistics, StoragePath};

pub const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct MockObject {
    pub size: u64,
    pub content_type: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageCall {
    ListObjectsPage {
        bucket: String,
        prefix: String,
        continuation_token: Option<String>,
    },
    HeadObject {
        bucket: String,
        key: String,
    },
    CopyObject {
        bucket: String,
        key: String,
        copy_source: String,
        content_type: Option<String>,
    },
    CreateMultipartUpload {
        bucket: String,
        key: String,
        content_type: Option<String>,
    },
    UploadPartCopy {
        bucket: String,
        key: String,
        copy_source: String,
        copy_source_range: String,
        part_number: i32,
        upload_id: String,
    },
    CompleteMultipartUpload {
        bucket: String,
        key: String,
        upload_id: String,
        parts: Vec<(i32, String)>,
    },
    AbortMultipartUpload {
        bucket: String,
        key: String,
        upload_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    ListObjects,
    // Fails the listing the way a cancelled S3 storage does.
    ListObjectsCancelled,
    HeadObject { key: String },
    CopyObject { bucket: String, key: String },
    CreateMultipartUpload { key: String },
    UploadPartCopy { key: String, part_number: i32 },
    CompleteMultipartUpload { key: String },
    AbortMultipartUpload { key: String },
}

#[derive(Debug, Clone)]
struct PendingUpload {
    bucket: String,
    key: String,
    content_type: Option<String>,
    metadata: Option<HashMap<String, String>>,
    part_sizes: BTreeMap<i32, u64>,
}

/// In-memory object service shared by every `MockStorage` created on it.
#[derive(Debug, Default)]
pub struct MockBackend {
    buckets: HashMap<String, BTreeMap<String, MockObject>>,
    uploads: HashMap<String, PendingUpload>,
    calls: Vec<StorageCall>,
    failures: HashSet<FailurePoint>,
    page_size: Option<usize>,
    copy_delay: Option<Duration>,
    omit_upload_id: bool,
    omit_e_tag: bool,
    next_upload_id: u32,
}

pub type SharedMockBackend = Arc<Mutex<MockBackend>>;

pub fn create_mock_backend() -> SharedMockBackend {
    Arc::new(Mutex::new(MockBackend::default()))
}

impl MockBackend {
    pub fn put_object(&mut self, bucket: &str, key: &str, size: u64, content_type: Option<&str>) {
        self.buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            MockObject {
                size,
                content_type: content_type.map(|value| value.to_string()),
                metadata: Some(HashMap::from([(
                    "origin".to_string(),
                    "mock".to_string(),
                )])),
            },
        );
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Option<MockObject> {
        self.buckets.get(bucket)?.get(key).cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn fail_on(&mut self, failure_point: FailurePoint) {
        self.failures.insert(failure_point);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = Some(page_size);
    }

    pub fn set_copy_delay(&mut self, copy_delay: Duration) {
        self.copy_delay = Some(copy_delay);
    }

    pub fn omit_upload_id(&mut self) {
        self.omit_upload_id = true;
    }

    pub fn omit_e_tag(&mut self) {
        self.omit_e_tag = true;
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.clone()
    }

    pub fn pending_upload_count(&self) -> usize {
        self.uploads.len()
    }

    fn check_failure(&self, failure_point: FailurePoint) -> Result<()> {
        if self.failures.contains(&failure_point) {
            return Err(anyhow!("injected failure: {failure_point:?}"));
        }
        Ok(())
    }

    fn resolve_copy_source(&self, copy_source: &str) -> Result<MockObject> {
        let (bucket, key) = copy_source
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid copy source: {copy_source}"))?;
        self.get_object(bucket, key)
            .ok_or_else(|| anyhow!("NoSuchKey: {copy_source}"))
    }
}

#[derive(Clone)]
pub struct MockStorage {
    bucket: String,
    backend: SharedMockBackend,
    stats_sender: Sender<CopyStatistics>,
}

impl MockStorage {
    pub fn boxed_new(
        bucket: &str,
        backend: SharedMockBackend,
        stats_sender: Sender<CopyStatistics>,
    ) -> Storage {
        Box::new(MockStorage {
            bucket: bucket.to_string(),
            backend,
            stats_sender,
        })
    }

    fn backend(&self) -> std::sync::MutexGuard<'_, MockBackend> {
        self.backend.lock().unwrap()
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> Result<ListObjectsV2Output> {
        let mut backend = self.backend();
        backend.calls.push(StorageCall::ListObjectsPage {
            bucket: self.bucket.clone(),
            prefix: prefix.to_string(),
            continuation_token: continuation_token.clone(),
        });
        backend.check_failure(FailurePoint::ListObjects)?;
        if backend.failures.contains(&FailurePoint::ListObjectsCancelled) {
            return Err(anyhow!(S3CopierError::Cancelled));
        }

        let page_size = backend
            .page_size
            .unwrap_or(usize::MAX)
            .min(max_keys as usize);
        let matched_keys: Vec<String> = backend
            .keys(&self.bucket)
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| {
                continuation_token
                    .as_ref()
                    .is_none_or(|token| key.as_str() > token.as_str())
            })
            .collect();

        let page: Vec<String> = matched_keys.iter().take(page_size).cloned().collect();
        let is_truncated = matched_keys.len() > page.len();

        Ok(ListObjectsV2Output::builder()
            .set_contents(Some(
                page.iter()
                    .map(|key| {
                        let size = backend
                            .get_object(&self.bucket, key)
                            .map(|object| object.size as i64);
                        Object::builder().key(key).set_size(size).build()
                    })
                    .collect(),
            ))
            .key_count(page.len() as i32)
            .is_truncated(is_truncated)
            .set_next_continuation_token(if is_truncated {
                page.last().cloned()
            } else {
                None
            })
            .build())
    }

    async fn head_object(&self, key: &str) -> Result<HeadObjectOutput> {
        let mut backend = self.backend();
        backend.calls.push(StorageCall::HeadObject {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        });
        backend.check_failure(FailurePoint::HeadObject {
            key: key.to_string(),
        })?;

        let object = backend
            .get_object(&self.bucket, key)
            .ok_or_else(|| anyhow!("NotFound: {key}"))?;

        Ok(HeadObjectOutput::builder()
            .content_length(object.size as i64)
            .set_content_type(object.content_type)
            .set_metadata(object.metadata)
            .e_tag("\"mock-e-tag\"")
            .build())
    }

    async fn copy_object(
        &self,
        key: &str,
        copy_source: &str,
        content_type: Option<String>,
    ) -> Result<CopyObjectOutput> {
        let copy_delay = {
            let mut backend = self.backend();
            backend.calls.push(StorageCall::CopyObject {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                copy_source: copy_source.to_string(),
                content_type: content_type.clone(),
            });
            backend.copy_delay
        };

        if let Some(copy_delay) = copy_delay {
            tokio::time::sleep(copy_delay).await;
        }

        let mut backend = self.backend();
        backend.check_failure(FailurePoint::CopyObject {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        })?;

        let mut object = backend.resolve_copy_source(copy_source)?;
        if content_type.is_some() {
            object.content_type = content_type;
            object.metadata = None;
        }
        backend
            .buckets
            .entry(self.bucket.clone())
            .or_default()
            .insert(key.to_string(), object);

        Ok(CopyObjectOutput::builder().build())
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        source_head_object_output: &HeadObjectOutput,
    ) -> Result<CreateMultipartUploadOutput> {
        let mut backend = self.backend();
        backend.calls.push(StorageCall::CreateMultipartUpload {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            content_type: source_head_object_output
                .content_type()
                .map(|value| value.to_string()),
        });
        backend.check_failure(FailurePoint::CreateMultipartUpload {
            key: key.to_string(),
        })?;

        backend.next_upload_id += 1;
        let upload_id = format!("upload-{}", backend.next_upload_id);
        backend.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                content_type: source_head_object_output
                    .content_type()
                    .map(|value| value.to_string()),
                metadata: source_head_object_output.metadata().cloned(),
                part_sizes: BTreeMap::new(),
            },
        );

        if backend.omit_upload_id {
            return Ok(CreateMultipartUploadOutput::builder().build());
        }

        Ok(CreateMultipartUploadOutput::builder()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .build())
    }

    async fn upload_part_copy(
        &self,
        key: &str,
        copy_source: &str,
        copy_source_range: &str,
        part_number: i32,
        upload_id: &str,
    ) -> Result<UploadPartCopyOutput> {
        let mut backend = self.backend();
        backend.calls.push(StorageCall::UploadPartCopy {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            copy_source: copy_source.to_string(),
            copy_source_range: copy_source_range.to_string(),
            part_number,
            upload_id: upload_id.to_string(),
        });
        backend.check_failure(FailurePoint::UploadPartCopy {
            key: key.to_string(),
            part_number,
        })?;

        backend.resolve_copy_source(copy_source)?;
        let (start_byte, end_byte) = copy_source_range
            .strip_prefix("bytes=")
            .and_then(|range| range.split_once('-'))
            .and_then(|(start, end)| Some((start.parse::<u64>().ok()?, end.parse::<u64>().ok()?)))
            .ok_or_else(|| anyhow!("invalid range: {copy_source_range}"))?;

        let omit_e_tag = backend.omit_e_tag;
        let upload = backend
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| anyhow!("NoSuchUpload: {upload_id}"))?;
        upload
            .part_sizes
            .insert(part_number, end_byte - start_byte + 1);

        let copy_part_result = if omit_e_tag {
            CopyPartResult::builder().build()
        } else {
            CopyPartResult::builder()
                .e_tag(format!("\"e-tag-{part_number}\""))
                .build()
        };

        Ok(UploadPartCopyOutput::builder()
            .copy_part_result(copy_part_result)
            .build())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        completed_parts: Vec<CompletedPart>,
    ) -> Result<CompleteMultipartUploadOutput> {
        let mut backend = self.backend();
        backend.calls.push(StorageCall::CompleteMultipartUpload {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            parts: completed_parts
                .iter()
                .map(|part| {
                    (
                        part.part_number().unwrap_or_default(),
                        part.e_tag().unwrap_or_default().to_string(),
                    )
                })
                .collect(),
        });
        backend.check_failure(FailurePoint::CompleteMultipartUpload {
            key: key.to_string(),
        })?;

        let upload = backend
            .uploads
            .remove(upload_id)
            .ok_or_else(|| anyhow!("NoSuchUpload: {upload_id}"))?;
        backend.buckets.entry(upload.bucket).or_default().insert(
            upload.key,
            MockObject {
                size: upload.part_sizes.values().sum(),
                content_type: upload.content_type,
                metadata: upload.metadata,
            },
        );

        Ok(CompleteMultipartUploadOutput::builder()
            .bucket(&self.bucket)
            .key(key)
            .build())
    }

    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
    ) -> Result<AbortMultipartUploadOutput> {
        let mut backend = self.backend();
        backend.calls.push(StorageCall::AbortMultipartUpload {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
        });
        backend.check_failure(FailurePoint::AbortMultipartUpload {
            key: key.to_string(),
        })?;

        backend.uploads.remove(upload_id);

        Ok(AbortMultipartUploadOutput::builder().build())
    }

    fn get_stats_sender(&self) -> Sender<CopyStatistics> {
        self.stats_sender.clone()
    }

    async fn send_stats(&self, stats: CopyStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}

pub fn create_mock_storage_pair(
    backend: &SharedMockBackend,
    source_bucket: &str,
    target_bucket: &str,
    stats_sender: Sender<CopyStatistics>,
) -> StoragePair {
    StoragePair {
        source: MockStorage::boxed_new(source_bucket, backend.clone(), stats_sender.clone()),
        target: MockStorage::boxed_new(target_bucket, backend.clone(), stats_sender),
    }
}

pub fn make_test_config(source_bucket: &str, prefix: &str, target_bucket: &str) -> Config {
    Config::new(
        StoragePath {
            bucket: source_bucket.to_string(),
            prefix: prefix.to_string(),
        },
        StoragePath {
            bucket: target_bucket.to_string(),
            prefix: "".to_string(),
        },
    )
}
