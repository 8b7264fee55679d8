use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod token;

/// A (bucket, key) pair. Both sides of every copy are addressed with one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    bucket: String,
    key: String,
}

impl ObjectReference {
    pub fn new(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Locator passed as the copy source of CopyObject/UploadPartCopy.
    ///
    /// The key is not validated here. An illegal key is reported by the storage service.
    pub fn copy_source(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

impl Display for ObjectReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, PartialEq)]
pub enum CopyStatistics {
    CopyBytes(u64),
    CopyComplete { key: String },
    CopyError { key: String },
    CopyWarning { key: String },
    MetadataRewritten { key: String },
    PartCopied { key: String, part_number: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoragePath {
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
