#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time;

use async_channel::Receiver;
use aws_config::meta::region::{ProvideRegion, RegionProviderChain};
use aws_config::{BehaviorVersion, ConfigLoader};
use aws_sdk_s3::client::Client;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Object};
use aws_types::SdkConfig;
use once_cell::sync::Lazy;
use tokio::sync::Semaphore;
use uuid::Uuid;

use s3copier::Config;
use s3copier::config::args::parse_from_args;
use s3copier::copier::Copier;
use s3copier::types::CopyStatistics;
use s3copier::types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};

pub const REGION: &str = "ap-northeast-1";
pub const PROFILE_NAME: &str = "s3copier-e2e-test";

pub const MIB: usize = 1024 * 1024;
pub const TEST_CONTENT_TYPE: &str = "video/mp2t";
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const TEST_CACHE_CONTROL: &str = "s-maxage=1604800";

pub const SLEEP_SECS_AFTER_DELETE_BUCKET: u64 = 10;

pub static TEST_METADATA: Lazy<HashMap<String, String>> = Lazy::new(|| {
    HashMap::from([
        ("key1".to_string(), "value1".to_string()),
        ("key2".to_string(), "value2".to_string()),
    ])
});

pub static BUCKET1: Lazy<String> = Lazy::new(|| format!("s3copier-src-{}", Uuid::new_v4()));
pub static BUCKET2: Lazy<String> = Lazy::new(|| format!("s3copier-dst-{}", Uuid::new_v4()));

pub static SEMAPHORE: Lazy<Arc<Semaphore>> = Lazy::new(|| Arc::new(Semaphore::new(1)));

#[derive(Debug, Default)]
pub struct StatsCount {
    pub copy_complete: u64,
    pub copy_bytes: u64,
    pub copy_error: u64,
    pub copy_warning: u64,
    pub part_copied: u64,
    pub metadata_rewritten: u64,
}

#[cfg(feature = "e2e_test")]
pub struct TestHelper {
    client: Client,
}

#[cfg(feature = "e2e_test")]
impl TestHelper {
    pub async fn new() -> Self {
        Self {
            client: Self::create_client().await,
        }
    }

    pub async fn create_client() -> Client {
        Client::from_conf(Builder::from(&Self::load_sdk_config().await).build())
    }

    async fn load_sdk_config() -> SdkConfig {
        let config_loader =
            Self::load_config_credential(aws_config::defaults(BehaviorVersion::latest()))
                .region(Self::build_provider_region());

        config_loader.load().await
    }

    fn load_config_credential(config_loader: ConfigLoader) -> ConfigLoader {
        let builder = aws_config::profile::ProfileFileCredentialsProvider::builder();

        config_loader.credentials_provider(builder.profile_name(PROFILE_NAME).build())
    }

    fn build_provider_region() -> Box<dyn ProvideRegion> {
        let builder =
            aws_config::profile::ProfileFileRegionProvider::builder().profile_name(PROFILE_NAME);

        Box::new(RegionProviderChain::first_try(builder.build()))
    }

    pub async fn create_bucket(&self, bucket: &str, region: &str) {
        let constraint = BucketLocationConstraint::from(region);
        let cfg = CreateBucketConfiguration::builder()
            .location_constraint(constraint)
            .build();

        self.client
            .create_bucket()
            .create_bucket_configuration(cfg)
            .bucket(bucket)
            .send()
            .await
            .unwrap();
    }

    pub async fn is_bucket_exist(&self, bucket: &str) -> bool {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => true,
            Err(e) => !e.into_service_error().is_not_found(),
        }
    }

    pub async fn delete_bucket_with_cascade(&self, bucket: &str) {
        if !self.is_bucket_exist(bucket).await {
            return;
        }

        self.abort_all_multipart_uploads(bucket).await;
        self.delete_all_objects(bucket).await;

        if let Err(e) = self.client.delete_bucket().bucket(bucket).send().await {
            let service_error = e.into_service_error();
            if let Some(code) = service_error.meta().code() {
                assert_eq!(code, "NoSuchBucket");
            } else {
                panic!("S3 API error has occurred.")
            }
        }

        tokio::time::sleep(time::Duration::from_secs(SLEEP_SECS_AFTER_DELETE_BUCKET)).await;
    }

    pub async fn delete_all_objects(&self, bucket: &str) {
        for object in self.list_objects(bucket, "").await {
            self.client
                .delete_object()
                .bucket(bucket)
                .key(object.key().unwrap())
                .send()
                .await
                .unwrap();
        }
    }

    pub async fn abort_all_multipart_uploads(&self, bucket: &str) {
        for upload in self.list_multipart_uploads(bucket).await {
            self.client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(upload.0)
                .upload_id(upload.1)
                .send()
                .await
                .unwrap();
        }
    }

    // (key, upload_id)
    pub async fn list_multipart_uploads(&self, bucket: &str) -> Vec<(String, String)> {
        let output = self
            .client
            .list_multipart_uploads()
            .bucket(bucket)
            .send()
            .await
            .unwrap();

        output
            .uploads()
            .iter()
            .map(|upload| {
                (
                    upload.key().unwrap().to_string(),
                    upload.upload_id().unwrap().to_string(),
                )
            })
            .collect()
    }

    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Vec<Object> {
        let mut objects = vec![];
        let mut continuation_token = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .unwrap();

            objects.extend_from_slice(output.contents());

            continuation_token = output.next_continuation_token().map(|t| t.to_string());
            if continuation_token.is_none() {
                return objects;
            }
        }
    }

    pub async fn head_object(&self, bucket: &str, key: &str) -> HeadObjectOutput {
        self.client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .unwrap()
    }

    pub async fn get_object_bytes(&self, bucket: &str, key: &str) -> Vec<u8> {
        self.client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .unwrap()
            .body
            .collect()
            .await
            .unwrap()
            .into_bytes()
            .to_vec()
    }

    pub async fn put_sized_object(&self, bucket: &str, key: &str, size: usize) {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(Self::build_test_data(size)))
            .send()
            .await
            .unwrap();
    }

    pub async fn put_sized_object_with_metadata(&self, bucket: &str, key: &str, size: usize) {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(TEST_CONTENT_TYPE)
            .cache_control(TEST_CACHE_CONTROL)
            .set_metadata(Some(TEST_METADATA.clone()))
            .body(ByteStream::from(Self::build_test_data(size)))
            .send()
            .await
            .unwrap();
    }

    // repeating byte pattern so that misplaced part ranges are detected
    pub fn build_test_data(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i % 251) as u8).collect()
    }

    pub fn build_config(args: Vec<&str>) -> Config {
        let mut cli_args = vec![
            "s3copier",
            "--source-profile",
            PROFILE_NAME,
            "--target-profile",
            PROFILE_NAME,
        ];
        cli_args.extend(args);

        Config::try_from(parse_from_args(cli_args).unwrap()).unwrap()
    }

    pub async fn run_copier(
        config: Config,
        cancellation_token: PipelineCancellationToken,
    ) -> (anyhow::Result<()>, StatsCount) {
        let copier = Copier::new(config, cancellation_token).await.unwrap();
        let stats_receiver = copier.get_stats_receiver();

        let result = copier.copy_with_prefix().await;

        (result, Self::get_stats_count(stats_receiver))
    }

    pub async fn copy_prefix(source_url: &str, target_url: &str) -> StatsCount {
        let config = Self::build_config(vec![source_url, target_url]);
        let (result, stats) =
            Self::run_copier(config, create_pipeline_cancellation_token()).await;
        result.unwrap();

        stats
    }

    pub fn get_stats_count(stats_receiver: Receiver<CopyStatistics>) -> StatsCount {
        let mut stats = StatsCount::default();
        while let Ok(copy_stats) = stats_receiver.try_recv() {
            match copy_stats {
                CopyStatistics::CopyComplete { .. } => stats.copy_complete += 1,
                CopyStatistics::CopyBytes(size) => stats.copy_bytes += size,
                CopyStatistics::CopyError { .. } => stats.copy_error += 1,
                CopyStatistics::CopyWarning { .. } => stats.copy_warning += 1,
                CopyStatistics::PartCopied { .. } => stats.part_copied += 1,
                CopyStatistics::MetadataRewritten { .. } => stats.metadata_rewritten += 1,
            }
        }

        stats
    }

    pub fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
