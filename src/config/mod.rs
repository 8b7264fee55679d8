use regex::Regex;

use crate::types::{ClientConfigLocation, S3Credentials, StoragePath};

pub mod args;

pub const DEFAULT_WORKER_SIZE: u16 = 50;
pub const DEFAULT_QUEUE_CAPACITY: usize = 20000;
pub const DEFAULT_MAX_KEYS: i32 = 1000;
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MULTIPART_CHUNKSIZE: u64 = DEFAULT_MULTIPART_THRESHOLD * 2;
pub const DEFAULT_MANIFEST_KEY_REGEX: &str = r"\.m3u8$";
pub const DEFAULT_MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

#[derive(Debug, Clone)]
pub struct Config {
    pub source: StoragePath,
    pub target: StoragePath,
    pub source_client_config: Option<ClientConfig>,
    pub target_client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
    pub transfer_config: TransferConfig,
    pub manifest_config: ManifestConfig,
    pub worker_size: u16,
    pub queue_capacity: usize,
    pub max_keys: i32,
    pub dry_run: bool,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// A configuration with the default thresholds, for library use without the CLI.
    pub fn new(source: StoragePath, target: StoragePath) -> Self {
        Self {
            source,
            target,
            source_client_config: None,
            target_client_config: None,
            tracing_config: None,
            transfer_config: TransferConfig::default(),
            manifest_config: ManifestConfig::default(),
            worker_size: DEFAULT_WORKER_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_keys: DEFAULT_MAX_KEYS,
            dry_run: false,
            auto_complete_shell: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

#[derive(Debug, Clone)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

/// `multipart_threshold` is the largest object size copied with a single CopyObject.
/// `multipart_chunksize` is the size of each UploadPartCopy range.
#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    pub multipart_threshold: u64,
    pub multipart_chunksize: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            multipart_chunksize: DEFAULT_MULTIPART_CHUNKSIZE,
        }
    }
}

impl TransferConfig {
    pub fn is_multipart_copy_required(&self, content_length: u64) -> bool {
        self.multipart_threshold < content_length
    }
}

#[derive(Debug, Clone)]
pub struct ManifestConfig {
    /// `None` disables the content type rewrite.
    pub key_regex: Option<Regex>,
    pub content_type: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            key_regex: Regex::new(DEFAULT_MANIFEST_KEY_REGEX).ok(),
            content_type: DEFAULT_MANIFEST_CONTENT_TYPE.to_string(),
        }
    }
}

impl ManifestConfig {
    pub fn is_manifest_key(&self, key: &str) -> bool {
        self.key_regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(key))
    }
}
