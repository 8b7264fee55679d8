use std::io;
use std::io::Write;
use std::time::Duration;

use async_channel::Receiver;
use indicatif::{HumanBytes, HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3copier::types::CopyStatistics;
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

const MOVING_AVERAGE_PERIOD_SECS: usize = 10;
const REFRESH_INTERVAL: f32 = 1.0;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Default)]
struct CopyTotals {
    copied_bytes: u64,
    copied_objects: u64,
    copied_parts: u64,
    rewritten_manifests: u64,
    errors: u64,
    warnings: u64,
}

impl CopyTotals {
    // returns (bytes, objects) added by this statistic
    fn add(&mut self, copy_stats: CopyStatistics) -> (u64, u64) {
        match copy_stats {
            CopyStatistics::CopyBytes(size) => {
                self.copied_bytes += size;
                return (size, 0);
            }
            CopyStatistics::CopyComplete { .. } => {
                self.copied_objects += 1;
                return (0, 1);
            }
            CopyStatistics::PartCopied { .. } => self.copied_parts += 1,
            CopyStatistics::MetadataRewritten { .. } => self.rewritten_manifests += 1,
            CopyStatistics::CopyError { .. } => self.errors += 1,
            CopyStatistics::CopyWarning { .. } => self.warnings += 1,
        }

        (0, 0)
    }

    fn counters_message(&self) -> String {
        format!(
            "parts {},  manifests rewritten {},  error {} objects,  warning {}",
            self.copied_parts, self.rewritten_manifests, self.errors, self.warnings
        )
    }
}

pub fn show_indicator(
    stats_receiver: Receiver<CopyStatistics>,
    show_progress: bool,
    show_result: bool,
    dry_run: bool,
) -> JoinHandle<()> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template("{wide_msg}") {
        progress_text.set_style(progress_style);
    }

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_copied_bytes = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut ma_copied_objects = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut totals = CopyTotals::default();

        loop {
            let mut period_bytes: u64 = 0;
            let mut period_objects: u64 = 0;

            let period = Instant::now();
            loop {
                while let Ok(copy_stats) = stats_receiver.try_recv() {
                    let (bytes, objects) = totals.add(copy_stats);
                    period_bytes += bytes;
                    period_objects += objects;
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() && stats_receiver.is_empty() {
                    show_summary(&progress_text, &totals, start_time, show_result, dry_run);
                    return;
                }

                tokio::time::sleep(POLL_INTERVAL).await;
            }

            ma_copied_bytes.add_sample(period_bytes);
            if !dry_run {
                ma_copied_objects.add_sample(period_objects);
            }

            if show_progress {
                progress_text.set_message(format!(
                    "{:>3} | {:>3}/sec,  copied {:>3} objects | {:>3} objects/sec,  {}",
                    HumanBytes(totals.copied_bytes),
                    HumanBytes(ma_copied_bytes.get_average()).to_string(),
                    totals.copied_objects,
                    HumanCount(ma_copied_objects.get_average()).to_string(),
                    totals.counters_message(),
                ));
            }
        }
    })
}

fn show_summary(
    progress_text: &ProgressBar,
    totals: &CopyTotals,
    start_time: Instant,
    show_result: bool,
    dry_run: bool,
) {
    let elapsed = start_time.elapsed();
    let elapsed_secs_f64 = elapsed.as_secs_f64();

    let (objects_per_sec, bytes_per_sec) = if dry_run {
        (0, 0)
    } else if elapsed_secs_f64 < REFRESH_INTERVAL as f64 {
        (totals.copied_objects, totals.copied_bytes)
    } else {
        (
            (totals.copied_objects as f64 / elapsed_secs_f64) as u64,
            (totals.copied_bytes as f64 / elapsed_secs_f64) as u64,
        )
    };

    info!(
        message = "copy summary",
        copied_byte = totals.copied_bytes,
        copied_byte_per_sec = bytes_per_sec,
        copied_object = totals.copied_objects,
        copied_object_per_sec = objects_per_sec,
        copied_part = totals.copied_parts,
        manifest_rewritten = totals.rewritten_manifests,
        error = totals.errors,
        warning = totals.warnings,
        duration_sec = elapsed_secs_f64,
    );

    if !show_result {
        return;
    }

    if let Ok(result_style) = ProgressStyle::with_template("{msg}") {
        progress_text.set_style(result_style);
    }
    progress_text.finish_with_message(format!(
        "{:>3} | {:>3}/sec,  copied {:>3} objects | {:>3} objects/sec,  {},  duration {}",
        HumanBytes(totals.copied_bytes),
        HumanBytes(bytes_per_sec),
        totals.copied_objects,
        HumanCount(objects_per_sec),
        totals.counters_message(),
        HumanDuration(elapsed),
    ));

    println!();
    let _ = io::stdout().flush();
}
