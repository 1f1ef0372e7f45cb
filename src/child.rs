/// Lifecycle control for the one supervised command: spawn, signal, reap,
/// force-kill. Every operation is idempotent against the current state so
/// the loop can re-issue decisions on every tick.
use crate::config::{Config, TerminationMode};
use crate::signals;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::Command;

/// Where the supervised command stands, as far as decisions go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotRunning,
    Running,
    Suspended,
}

/// Tracks and drives at most one child process.
///
/// The pid stays tracked after a terminate signal until the exit
/// notification reaps it; an idle tick arriving in that window resolves to
/// "already running" instead of a duplicate spawn.
#[derive(Debug)]
pub struct ProcessController {
    command: PathBuf,
    args: Vec<String>,
    mode: TerminationMode,
    pid: Option<Pid>,
    state: ProcessState,
}

impl ProcessController {
    pub fn new(config: &Config) -> Self {
        ProcessController {
            command: config.command.clone(),
            args: config.args.clone(),
            mode: config.mode,
            pid: None,
            state: ProcessState::NotRunning,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// The processor is idle: make sure the command runs. Spawns when no
    /// live child is tracked, resumes a suspended child exactly once, and
    /// leaves a running child alone.
    pub fn ensure_running(&mut self) {
        if self.alive() {
            if self.state == ProcessState::Suspended {
                self.send(Signal::SIGCONT);
            }
            self.state = ProcessState::Running;
        } else {
            self.spawn();
            self.state = ProcessState::Running;
        }
    }

    /// The processor is busy: deactivate the command according to the
    /// configured mode. Acts once per running phase; repeat calls while
    /// nothing runs (or while suspended) do nothing.
    pub fn ensure_stopped(&mut self) {
        if self.state != ProcessState::Running {
            return;
        }
        let alive = self.alive();
        if alive {
            match self.mode {
                TerminationMode::Terminate => self.send(Signal::SIGTERM),
                TerminationMode::Kill => self.send(Signal::SIGKILL),
                TerminationMode::Suspend => self.send(Signal::SIGSTOP),
            }
        }
        self.state = if alive && self.mode == TerminationMode::Suspend {
            ProcessState::Suspended
        } else {
            ProcessState::NotRunning
        };
    }

    /// An exit notification arrived for `pid`. Clears tracking when the pid
    /// is ours; exits of unrelated processes are ignored.
    pub fn reap(&mut self, pid: Pid) {
        if self.pid == Some(pid) {
            tracing::info!(
                signal = signals::name(Signal::SIGCHLD),
                command = %self.command.display(),
                pid = pid.as_raw(),
                "child exited"
            );
            self.pid = None;
            self.state = ProcessState::NotRunning;
        }
    }

    /// Shutdown path: whatever the mode, a tracked child is killed outright.
    /// KILL also takes down a stopped child, so no resume is needed first.
    pub fn force_kill(&mut self) {
        if let Some(pid) = self.pid.take() {
            tracing::debug!(pid = pid.as_raw(), "force-killing child on shutdown");
            let _ = kill(pid, Signal::SIGKILL);
        }
        self.state = ProcessState::NotRunning;
    }

    fn spawn(&mut self) {
        match Command::new(&self.command)
            .args(self.args.iter().skip(1))
            .spawn()
        {
            Ok(child) => {
                let pid = Pid::from_raw(child.id() as i32);
                tracing::info!(
                    command = %self.command.display(),
                    pid = pid.as_raw(),
                    "starting process"
                );
                self.pid = Some(pid);
            }
            Err(e) => {
                tracing::warn!(
                    command = %self.command.display(),
                    error = %e,
                    "failed to start process"
                );
                self.pid = None;
            }
        }
    }

    /// Signal-0 probe. An unreaped zombie still accepts signals and counts
    /// as alive until the exit notification clears it.
    fn alive(&self) -> bool {
        self.pid.is_some_and(|pid| kill(pid, None).is_ok())
    }

    fn send(&mut self, signal: Signal) {
        let Some(pid) = self.pid else { return };
        tracing::info!(
            signal = signals::name(signal),
            command = %self.command.display(),
            pid = pid.as_raw(),
            "issuing signal"
        );
        if let Err(e) = kill(pid, signal) {
            tracing::warn!(
                signal = signals::name(signal),
                pid = pid.as_raw(),
                error = %e,
                "failed to signal process"
            );
        }
    }
}
