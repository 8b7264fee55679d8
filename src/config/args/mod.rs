use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use clap::builder::{ArgPredicate, NonEmptyStringValueParser, RangedU64ValueParser};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use regex::Regex;
#[cfg(feature = "version")]
use shadow_rs::shadow;

use crate::Config;
use crate::config::args::value_parser::{human_bytes, storage_path, url};
use crate::config::{
    CLITimeoutConfig, ClientConfig, DEFAULT_MANIFEST_CONTENT_TYPE, DEFAULT_MANIFEST_KEY_REGEX,
    DEFAULT_MAX_KEYS, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKER_SIZE, ManifestConfig, RetryConfig,
    TracingConfig, TransferConfig,
};
use crate::types::{AccessKeys, ClientConfigLocation, S3Credentials};

mod value_parser;

const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 1;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_MULTIPART_THRESHOLD: &str = "5MiB";
const DEFAULT_MULTIPART_CHUNKSIZE: &str = "10MiB";
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_DISABLE_MANIFEST_CONTENT_TYPE_REWRITE: bool = false;
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;

const TARGET_PREFIX_SPECIFIED: &str = "TARGET must be s3://<BUCKET_NAME> without prefix\n";
const SAME_BUCKET_SPECIFIED: &str = "SOURCE and TARGET must be different buckets\n";

#[cfg(feature = "version")]
shadow!(build);

#[derive(Parser, Clone, Debug)]
#[cfg_attr(feature = "version", command(version=format!("{} ({} {}), {}", build::PKG_VERSION, build::SHORT_COMMIT, build::BUILD_TARGET, build::RUST_VERSION)))]
pub struct CLIArgs {
    #[arg(env, help = "s3://<BUCKET_NAME>[/prefix]", value_parser = storage_path::check_storage_path, default_value_if("auto_complete_shell", ArgPredicate::IsPresent, "s3://ignored"), required = false)]
    source: String,

    #[arg(env, help = "s3://<BUCKET_NAME>", value_parser = storage_path::check_storage_path, default_value_if("auto_complete_shell", ArgPredicate::IsPresent, "s3://ignored-target"), required = false)]
    target: String,

    /// list and plan only. no copy will be performed
    #[arg(long, env, default_value_t = DEFAULT_DRY_RUN, help_heading = "General")]
    dry_run: bool,

    /// location of the file that the AWS CLI uses to store configuration profiles
    #[arg(long, env, value_name = "FILE", help_heading = "AWS Configuration")]
    aws_config_file: Option<PathBuf>,

    /// location of the file that the AWS CLI uses to store access keys
    #[arg(long, env, value_name = "FILE", help_heading = "AWS Configuration")]
    aws_shared_credentials_file: Option<PathBuf>,

    /// source AWS CLI profile
    #[arg(long, env, conflicts_with_all = ["source_access_key", "source_secret_access_key", "source_session_token"], help_heading = "AWS Configuration")]
    source_profile: Option<String>,

    /// source access key
    #[arg(long, env, conflicts_with_all = ["source_profile"], requires = "source_secret_access_key", help_heading = "AWS Configuration")]
    source_access_key: Option<String>,

    /// source secret access key
    #[arg(long, env, conflicts_with_all = ["source_profile"], requires = "source_access_key", help_heading = "AWS Configuration")]
    source_secret_access_key: Option<String>,

    /// source session token
    #[arg(long, env, conflicts_with_all = ["source_profile"], requires = "source_access_key", help_heading = "AWS Configuration")]
    source_session_token: Option<String>,

    /// target AWS CLI profile
    #[arg(long, env, conflicts_with_all = ["target_access_key", "target_secret_access_key", "target_session_token"], help_heading = "AWS Configuration")]
    target_profile: Option<String>,

    /// target access key
    #[arg(long, env, conflicts_with_all = ["target_profile"], requires = "target_secret_access_key", help_heading = "AWS Configuration")]
    target_access_key: Option<String>,

    /// target secret access key
    #[arg(long, env, conflicts_with_all = ["target_profile"], requires = "target_access_key", help_heading = "AWS Configuration")]
    target_secret_access_key: Option<String>,

    /// target session token
    #[arg(long, env, conflicts_with_all = ["target_profile"], requires = "target_access_key", help_heading = "AWS Configuration")]
    target_session_token: Option<String>,

    /// source region
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "Source Options")]
    source_region: Option<String>,

    /// source endpoint url
    #[arg(long, env, value_parser = url::check_scheme, help_heading = "Source Options")]
    source_endpoint_url: Option<String>,

    /// force path-style addressing for source endpoint
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "Source Options")]
    source_force_path_style: bool,

    /// target region
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "Target Options")]
    target_region: Option<String>,

    /// target endpoint url
    #[arg(long, env, value_parser = url::check_scheme, help_heading = "Target Options")]
    target_endpoint_url: Option<String>,

    /// force path-style addressing for target endpoint
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "Target Options")]
    target_force_path_style: bool,

    /// objects larger than this size are copied with multipart upload.
    /// A suffix like KiB, MiB, GiB is supported.
    #[arg(long, env, default_value = DEFAULT_MULTIPART_THRESHOLD, value_parser = human_bytes::check_human_bytes, help_heading = "Multipart Settings")]
    multipart_threshold: String,

    /// size of each part copied with UploadPartCopy.
    /// A suffix like KiB, MiB, GiB is supported.
    #[arg(long, env, default_value = DEFAULT_MULTIPART_CHUNKSIZE, value_parser = human_bytes::check_human_bytes, help_heading = "Multipart Settings")]
    multipart_chunksize: String,

    /// keys matching this regular expression get the manifest content type before being copied
    #[arg(long, env, default_value = DEFAULT_MANIFEST_KEY_REGEX, value_parser = value_parser::regex::parse_regex, help_heading = "Manifest Options")]
    manifest_key_regex: String,

    /// content type set on manifest keys
    #[arg(long, env, default_value = DEFAULT_MANIFEST_CONTENT_TYPE, value_parser = NonEmptyStringValueParser::new(), help_heading = "Manifest Options")]
    manifest_content_type: String,

    /// do not rewrite the content type of manifest keys
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_MANIFEST_CONTENT_TYPE_REWRITE, help_heading = "Manifest Options")]
    disable_manifest_content_type_rewrite: bool,

    /// trace verbosity(-v: show info, -vv: show debug, -vvv show trace)
    #[clap(flatten)]
    verbosity: Verbosity<WarnLevel>,

    /// show trace as json format
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Tracing/Logging")]
    json_tracing: bool,

    /// enable aws sdk tracing
    #[arg(long, env, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Tracing/Logging")]
    aws_sdk_tracing: bool,

    /// show span event tracing
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Tracing/Logging")]
    span_events_tracing: bool,

    /// disable ANSI terminal colors
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Tracing/Logging")]
    disable_color_tracing: bool,

    /// maximum attempts of each AWS SDK request. 1 disables retries
    #[arg(long, env, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..), value_name = "max_attempts", help_heading = "Retry Options")]
    aws_max_attempts: u32,

    /// a multiplier value used when calculating backoff times as part of an exponential backoff with jitter strategy.
    #[arg(long, env, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, value_name = "initial_backoff", help_heading = "Retry Options")]
    initial_backoff_milliseconds: u64,

    /// operation timeout (milliseconds). For details, see the AWS SDK for Rust TimeoutConfig documentation.
    /// The default has no timeout.
    #[arg(
        long,
        env,
        value_name = "operation_timeout",
        help_heading = "Timeout Options"
    )]
    operation_timeout_milliseconds: Option<u64>,

    /// operation attempt timeout (milliseconds). For details, see the AWS SDK for Rust TimeoutConfig documentation.
    /// The default has no timeout.
    #[arg(
        long,
        env,
        value_name = "operation_attempt_timeout",
        help_heading = "Timeout Options"
    )]
    operation_attempt_timeout_milliseconds: Option<u64>,

    /// connect timeout (milliseconds).
    /// The default has AWS SDK default timeout (Currently 3100 milliseconds).
    #[arg(
        long,
        env,
        value_name = "connect_timeout",
        help_heading = "Timeout Options"
    )]
    connect_timeout_milliseconds: Option<u64>,

    /// read timeout (milliseconds).
    /// The default has no timeout.
    #[arg(
        long,
        env,
        value_name = "read_timeout",
        help_heading = "Timeout Options"
    )]
    read_timeout_milliseconds: Option<u64>,

    /// number of workers copying objects concurrently
    #[arg(long, env, default_value_t = DEFAULT_WORKER_SIZE, value_parser = clap::value_parser!(u16).range(1..), help_heading = "Advanced")]
    worker_size: u16,

    /// capacity of the queue between the lister and the workers
    #[arg(long, env, default_value_t = DEFAULT_QUEUE_CAPACITY, value_parser = RangedU64ValueParser::<usize>::new().range(1..), help_heading = "Advanced")]
    queue_capacity: usize,

    /// maximum number of keys returned by one ListObjectsV2 request
    #[arg(long, env, default_value_t = DEFAULT_MAX_KEYS, value_parser = clap::value_parser!(i32).range(1..=32767), help_heading = "Advanced")]
    max_keys: i32,

    /// disable stalled stream protection
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "Advanced")]
    disable_stalled_stream_protection: bool,

    /// generate a auto completions script.
    /// Valid choices: bash, fish, zsh, powershell, elvish.
    #[arg(long, env, value_name = "SHELL", value_parser = clap_complete::shells::Shell::from_str, help_heading = "Advanced")]
    auto_complete_shell: Option<clap_complete::shells::Shell>,
}

pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    crate::Config::try_from(config_args)
}

impl CLIArgs {
    fn validate_storage_config(&self) -> Result<(), String> {
        if self.auto_complete_shell.is_some() {
            return Ok(());
        }

        self.check_target_prefix()?;
        self.check_same_bucket()?;

        Ok(())
    }

    fn check_target_prefix(&self) -> Result<(), String> {
        let target = storage_path::parse_storage_path(&self.target)?;
        if !target.prefix.is_empty() {
            return Err(TARGET_PREFIX_SPECIFIED.to_string());
        }

        Ok(())
    }

    fn check_same_bucket(&self) -> Result<(), String> {
        let source = storage_path::parse_storage_path(&self.source)?;
        let target = storage_path::parse_storage_path(&self.target)?;
        if source.bucket == target.bucket {
            return Err(SAME_BUCKET_SPECIFIED.to_string());
        }

        Ok(())
    }

    fn build_client_configs(&self) -> (ClientConfig, ClientConfig) {
        let source_credential = build_credential(
            self.source_profile.as_ref(),
            self.source_access_key.as_ref(),
            self.source_secret_access_key.as_ref(),
            self.source_session_token.as_ref(),
        );
        let target_credential = build_credential(
            self.target_profile.as_ref(),
            self.target_access_key.as_ref(),
            self.target_secret_access_key.as_ref(),
            self.target_session_token.as_ref(),
        );

        (
            self.build_client_config(
                source_credential,
                self.source_region.clone(),
                self.source_endpoint_url.clone(),
                self.source_force_path_style,
            ),
            self.build_client_config(
                target_credential,
                self.target_region.clone(),
                self.target_endpoint_url.clone(),
                self.target_force_path_style,
            ),
        )
    }

    fn build_client_config(
        &self,
        credential: S3Credentials,
        region: Option<String>,
        endpoint_url: Option<String>,
        force_path_style: bool,
    ) -> ClientConfig {
        ClientConfig {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            credential,
            region,
            endpoint_url,
            force_path_style,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self.operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
            disable_stalled_stream_protection: self.disable_stalled_stream_protection,
        }
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let tracing_config = self
            .verbosity
            .log_level()
            .map(|log_level| TracingConfig {
                tracing_level: log_level,
                json_tracing: self.json_tracing,
                aws_sdk_tracing: self.aws_sdk_tracing,
                span_events_tracing: self.span_events_tracing,
                disable_color_tracing: self.disable_color_tracing,
            });

        if !self.dry_run {
            return tracing_config;
        }

        // dry-run results are reported at info level
        match tracing_config {
            None => Some(TracingConfig {
                tracing_level: log::Level::Info,
                json_tracing: DEFAULT_JSON_TRACING,
                aws_sdk_tracing: DEFAULT_AWS_SDK_TRACING,
                span_events_tracing: DEFAULT_SPAN_EVENTS_TRACING,
                disable_color_tracing: DEFAULT_DISABLE_COLOR_TRACING,
            }),
            Some(tracing_config) if tracing_config.tracing_level < log::Level::Info => {
                Some(TracingConfig {
                    tracing_level: log::Level::Info,
                    ..tracing_config
                })
            }
            tracing_config => tracing_config,
        }
    }
}

fn build_credential(
    profile: Option<&String>,
    access_key: Option<&String>,
    secret_access_key: Option<&String>,
    session_token: Option<&String>,
) -> S3Credentials {
    if let Some(profile) = profile {
        return S3Credentials::Profile(profile.to_string());
    }

    match access_key.zip(secret_access_key) {
        Some((access_key, secret_access_key)) => S3Credentials::Credentials {
            access_keys: AccessKeys {
                access_key: access_key.to_string(),
                secret_access_key: secret_access_key.to_string(),
                session_token: session_token.cloned(),
            },
        },
        None => S3Credentials::FromEnvironment,
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(value: CLIArgs) -> Result<Self, Self::Error> {
        value.validate_storage_config()?;

        let (source_client_config, target_client_config) = value.build_client_configs();
        let tracing_config = value.build_tracing_config();

        let transfer_config = TransferConfig {
            multipart_threshold: human_bytes::parse_human_bytes(&value.multipart_threshold)?,
            multipart_chunksize: human_bytes::parse_human_bytes(&value.multipart_chunksize)?,
        };

        let key_regex = if value.disable_manifest_content_type_rewrite {
            None
        } else {
            Some(Regex::new(&value.manifest_key_regex).map_err(|e| e.to_string())?)
        };

        Ok(Config {
            source: storage_path::parse_storage_path(&value.source)?,
            target: storage_path::parse_storage_path(&value.target)?,
            source_client_config: Some(source_client_config),
            target_client_config: Some(target_client_config),
            tracing_config,
            transfer_config,
            manifest_config: ManifestConfig {
                key_regex,
                content_type: value.manifest_content_type,
            },
            worker_size: value.worker_size,
            queue_capacity: value.queue_capacity,
            max_keys: value.max_keys,
            dry_run: value.dry_run,
            auto_complete_shell: value.auto_complete_shell,
        })
    }
}
