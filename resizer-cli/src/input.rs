use pipeline_common::CancellationToken;
use tracing::{error, warn};

/// Cancels `token` on Ctrl-C.
///
/// Returns once the interrupt was handled or the token was cancelled elsewhere.
pub async fn interrupt_handler(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                warn!("Interrupt received. Shutting down gracefully...");
                token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {e}"),
        },
    }
}
