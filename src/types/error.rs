use anyhow::Error;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum S3CopierError {
    #[error("cancelled")]
    Cancelled,
    #[error("failed to list objects. bucket={bucket} prefix={prefix}")]
    ListingError { bucket: String, prefix: String },
    #[error("failed to fetch the source object metadata. bucket={bucket} key={key}")]
    MetadataFetchError { bucket: String, key: String },
    #[error("failed to rewrite the manifest content type. bucket={bucket} key={key}")]
    MetadataRewriteError { bucket: String, key: String },
    #[error("failed to copy an object. bucket={bucket} key={key}")]
    SinglePartCopyError { bucket: String, key: String },
    #[error(
        "too many parts for a multipart copy. object_size={object_size} part_size={part_size} parts_count={parts_count} max_parts_count={max_parts_count}"
    )]
    TooManyParts {
        object_size: u64,
        part_size: u64,
        parts_count: u64,
        max_parts_count: u64,
    },
    #[error("failed to create a multipart upload. bucket={bucket} key={key}")]
    MultipartInitError { bucket: String, key: String },
    #[error(
        "failed to copy a part. bucket={bucket} key={key} upload_id={upload_id} part_number={part_number}"
    )]
    PartCopyError {
        bucket: String,
        key: String,
        upload_id: String,
        part_number: i32,
    },
    #[error("failed to complete a multipart upload. bucket={bucket} key={key} upload_id={upload_id}")]
    CompleteUploadError {
        bucket: String,
        key: String,
        upload_id: String,
    },
}

pub fn is_cancelled_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<S3CopierError>(),
        Some(S3CopierError::Cancelled)
    )
}
