use anyhow::Result;
use tokio::time::Instant;
use tracing::{error, trace};

use s3copier::Config;
use s3copier::copier::Copier;
use s3copier::types::error::is_cancelled_error;
use s3copier::types::token::create_pipeline_cancellation_token;

mod ctrl_c_handler;
mod indicator;
mod ui_config;

pub async fn run(config: Config) -> Result<()> {
    let cancellation_token = create_pipeline_cancellation_token();

    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = Instant::now();
    trace!("copy start.");

    let copier = Copier::new(config.clone(), cancellation_token).await?;
    let indicator_join_handle = indicator::show_indicator(
        copier.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
        config.dry_run,
    );

    let result = copier.copy_with_prefix().await;
    indicator_join_handle.await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
    if let Err(e) = result {
        error!(
            duration_sec = duration_sec,
            cancelled = is_cancelled_error(&e),
            error = e.to_string(),
            "s3copier failed."
        );

        return Err(e.context("s3copier failed."));
    }

    trace!(duration_sec = duration_sec, "s3copier has been completed.");

    Ok(())
}
