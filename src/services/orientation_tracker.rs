//! Orientation tracker - fuses compass samples with screen rotation
//!
//! Emits `raw + rotation_offset` for every compass sample. The sum is NOT
//! wrapped into [0, 360); consumers that need a bearing normalize it
//! (the session stores `Heading::from_degrees(raw)`).

use crate::io::orientation::OrientationSource;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to a running orientation subscription
///
/// Dropping the handle detaches both listeners, same as `unsubscribe()`.
#[derive(Debug)]
pub struct OrientationSubscription {
    task: Option<JoinHandle<()>>,
}

impl OrientationSubscription {
    /// Detach both listeners; safe to call repeatedly
    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("orientation_unsubscribed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for OrientationSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Start tracking; with no source this is a no-op that never calls back
pub fn start<F>(source: Option<OrientationSource>, mut on_heading: F) -> OrientationSubscription
where
    F: FnMut(f64) + Send + 'static,
{
    let Some(OrientationSource { mut compass, mut rotation }) = source else {
        info!("orientation_unsupported");
        return OrientationSubscription { task: None };
    };

    let task = tokio::spawn(async move {
        // Reset point: a fresh subscription starts unrotated
        let mut rotation_offset = 0.0_f64;
        let mut compass_open = true;
        let mut rotation_open = true;

        while compass_open || rotation_open {
            // A queued rotation always applies before the next compass sample
            tokio::select! {
                biased;

                change = rotation.recv(), if rotation_open => {
                    match change {
                        Some(change) => {
                            rotation_offset = change.offset_degrees();
                            debug!(offset = %rotation_offset, "screen_rotation_changed");
                        }
                        None => rotation_open = false,
                    }
                }
                sample = compass.recv(), if compass_open => {
                    match sample {
                        Some(sample) => {
                            if let Some(raw) = sample.raw_degrees() {
                                on_heading(raw + rotation_offset);
                            }
                        }
                        None => compass_open = false,
                    }
                }
            }
        }

        debug!("orientation_streams_closed");
    });

    OrientationSubscription { task: Some(task) }
}
