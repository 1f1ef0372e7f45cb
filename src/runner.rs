/// The control loop: a periodic timer drives idle sampling and
/// level-triggered start/stop decisions, Unix signal streams deliver child
/// exits and termination requests, and cleanup force-kills whatever child is
/// still tracked on the way out.
use crate::child::ProcessController;
use crate::config::Config;
use crate::idle::{IdleMonitor, SampleError};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Fatal loop failures. By the time one is returned, cleanup has run.
#[derive(Debug)]
pub enum RunError {
    /// Could not install a signal stream.
    Signals { source: std::io::Error },
    /// The tick source failed; sampling errors are not retried.
    Sample(SampleError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Signals { source } => {
                write!(f, "failed to install signal handling: {}", source)
            }
            RunError::Sample(source) => write!(f, "{}", source),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Signals { source } => Some(source),
            RunError::Sample(source) => Some(source),
        }
    }
}

impl RunError {
    /// OS error code reported as the exit status.
    pub fn errno(&self) -> i32 {
        match self {
            RunError::Signals { source } => source.raw_os_error().unwrap_or(Errno::EINVAL as i32),
            RunError::Sample(source) => source.errno(),
        }
    }
}

/// Drive the loop until a termination request or a fatal error, then
/// force-kill any tracked child.
pub async fn run(
    config: &Config,
    monitor: &mut IdleMonitor,
    controller: &mut ProcessController,
) -> Result<(), RunError> {
    let result = drive(config, monitor, controller).await;
    controller.force_kill();
    result
}

async fn drive(
    config: &Config,
    monitor: &mut IdleMonitor,
    controller: &mut ProcessController,
) -> Result<(), RunError> {
    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|source| RunError::Signals { source })?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|source| RunError::Signals { source })?;
    let mut sigchld = signal(SignalKind::child()).map_err(|source| RunError::Signals { source })?;

    let period = Duration::from_secs(config.interval_secs.max(1));
    // first sample one full period from now; a slow tick coalesces rather
    // than bunching up
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let idle = monitor.sample().map_err(RunError::Sample)?;
                apply_sample(controller, idle, config.threshold_percent);
            }
            _ = sigchld.recv() => {
                reap_exited(controller);
            }
            _ = sigint.recv() => {
                debug!("interrupt received, shutting down");
                return Ok(());
            }
            _ = sigterm.recv() => {
                debug!("termination requested, shutting down");
                return Ok(());
            }
        }
    }
}

/// One level-triggered decision. `None` means no percentage was defined for
/// this interval (warm-up, or no elapsed ticks): hold the current state.
fn apply_sample(controller: &mut ProcessController, idle: Option<f64>, threshold: f64) {
    let Some(idle) = idle else {
        debug!("no idle percentage for this interval, holding");
        return;
    };
    if idle > threshold {
        debug!(idle, threshold, "processor idle over trigger threshold");
        controller.ensure_running();
    } else {
        debug!(idle, threshold, "processor idle under trigger threshold");
        controller.ensure_stopped();
    }
}

/// Collect every child the kernel has finished with. One notification can
/// stand for several exits, so keep draining until there is nothing left.
fn reap_exited(controller: &mut ProcessController) {
    loop {
        match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => {
                if let Some(pid) = status.pid() {
                    controller.reap(pid);
                }
            }
            // ECHILD: no children left to wait for
            Err(_) => break,
        }
    }
}
