use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use s3copier::types::token::PipelineCancellationToken;

/// Cancels the copy run when ctrl-c is received.
/// The handler exits silently once the run itself cancels or finishes with the token.
pub fn spawn_ctrl_c_handler(cancellation_token: PipelineCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                debug!("ctrl-c handler has been stopped by the cancellation token.");
            }
            signal_result = signal::ctrl_c() => {
                if let Err(e) = signal_result {
                    error!(error = e.to_string(), "failed to listen for ctrl-c signal.");
                    return;
                }

                warn!("ctrl-c received, cancelling the copy.");
                cancellation_token.cancel();
            }
        }
    })
}
