/*!
# Overview
s3copier copies every object under a key prefix from one S3 bucket to another.
All data movement is server-side. Object bytes never pass through the host running s3copier.

## Features
- Concurrent: a pool of workers (50 by default) copies objects while the source prefix is still being listed.

- Size aware
  Objects up to the multipart threshold (5 MiB by default) are copied with a single `CopyObject` request.
  Larger objects are copied part by part with `UploadPartCopy` and assembled with `CompleteMultipartUpload`.
  Content type, user-defined metadata and the other system metadata are carried to the multipart copy.

- Clean failure
  The first error stops the whole run. Sibling workers are cancelled between objects,
  and any multipart upload that cannot be completed is aborted.

- HLS friendly
  Keys matching `\.m3u8$` have their source content type rewritten to `application/vnd.apple.mpegurl`
  before being copied.

## As a library
s3copier CLI is a thin wrapper of the s3copier library.
You can pass the same arguments as the CLI to [`config::args::parse_from_args`], or build a [`Config`] directly.

Example usage
=============

```Toml
[dependencies]
s3copier = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3copier::config::Config;
use s3copier::config::args::parse_from_args;
use s3copier::copier::Copier;
use s3copier::types::CopyStatistics;
use s3copier::types::token::create_pipeline_cancellation_token;

#[tokio::main]
async fn main() {
    // You can use all the arguments for s3copier CLI.
    let args = vec![
        "program_name",
        "--worker-size",
        "16",
        "s3://source-bucket/hls/",
        "s3://target-bucket",
    ];

    let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();

    // Cancelling this token stops the run. The run returns `S3CopierError::Cancelled`.
    let cancellation_token = create_pipeline_cancellation_token();
    let copier = Copier::new(config, cancellation_token).await.unwrap();
    let stats_receiver = copier.get_stats_receiver();

    let result = copier.copy_with_prefix().await;

    let mut total_copy_count = 0;
    while let Ok(copy_stats) = stats_receiver.try_recv() {
        if matches!(copy_stats, CopyStatistics::CopyComplete { .. }) {
            total_copy_count += 1;
        }
    }
    println!("Total copy count: {total_copy_count}");

    if let Err(e) = result {
        println!("An error has occurred: {e:?}");
    }
}
```
*/

pub use config::Config;
pub use config::args::CLIArgs;

pub mod config;
pub mod copier;
pub mod storage;
pub mod types;

#[cfg(test)]
mod test_utils;
