//! Background reaper for expired upload sessions.
//!
//! Expired sessions are already invisible to the API, but their rows and the
//! backend's staged parts linger. The sweep walks them in batches, aborting
//! each backend transaction before dropping the row, so abandoned uploads
//! stop holding storage within one interval of expiring.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::services::upload_service::UploadService;

/// Spawn the periodic sweep. The first pass runs immediately, which clears
/// anything left over from a previous process.
pub fn spawn(service: UploadService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match service.reap_expired().await {
                Ok(0) => {}
                Ok(reaped) => info!("expiry sweep reclaimed {} abandoned uploads", reaped),
                Err(err) => warn!("expiry sweep failed: {}", err),
            }
        }
    })
}
