//! Timer driven playback of a replay session.

use std::{future::Future, io, time::Duration};

use samba::{Error, Progress, ReplaySession};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

/// Why auto-play stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayEnd {
    /// The replay reached its final step.
    Finished {
        /// The number of steps played.
        steps: usize,
    },
    /// The stop signal fired before the end of the replay.
    Stopped {
        /// The number of steps played.
        steps: usize,
    },
}

/// Advances `session` once per `period` until the replay ends or `stop` completes.
///
/// The first step is taken one period after the call. Stopping leaves the session at the last
/// position reached, so that playback can be resumed with another call.
pub async fn autoplay(
    session: &mut ReplaySession,
    period: Duration,
    stop: impl Future<Output = ()>,
) -> Result<AutoplayEnd, Error> {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    interval.tick().await;

    tokio::pin!(stop);
    let mut steps = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if session.advance()? == Progress::AtBoundary {
                    debug!(steps, "auto-play reached the end of the replay");
                    return Ok(AutoplayEnd::Finished { steps });
                }
                steps += 1;
            }
            _ = &mut stop => {
                debug!(steps, "auto-play stopped");
                return Ok(AutoplayEnd::Stopped { steps });
            }
        }
    }
}

/// Completes once `signal` fires.
///
/// If the signal cannot be listened for, the error is logged and the returned future never
/// completes.
pub async fn until_signal(signal: impl Future<Output = io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!("cannot listen for the stop signal: {e}");
        std::future::pending::<()>().await;
    }
}
