//! Supervisor owning the reader process and its restart cycle.
//!
//! Each iteration spawns the reader, starts an exchange task that polls
//! it on a fixed interval, and waits for the process to exit. On exit the
//! exchange task is signalled through a one-shot channel and joined
//! before the cooldown starts, so two exchange tasks never overlap.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use gw_core::{ReportSink, GET_SENSORS_COMMAND, REPORT_INTERVAL};

use crate::error::SupervisorError;
use crate::exchange::exchange;

/// Shortest tick interval the exchange loop accepts.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// How to run and poll the reader process.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Extra environment on top of the inherited one.
    pub envs: Vec<(OsString, OsString)>,
    /// Time between requests. Values below [`MIN_INTERVAL`] are raised to it.
    pub interval: Duration,
    /// Pause between process exit and respawn.
    pub cooldown: Duration,
    /// Line written to the process on every tick.
    pub request: Vec<u8>,
}

impl SupervisorConfig {
    /// Poll `program` every five seconds with `get_sensors`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            interval: REPORT_INTERVAL,
            cooldown: REPORT_INTERVAL,
            request: GET_SENSORS_COMMAND.to_vec(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the tick interval and the cooldown together.
    ///
    /// The interval is clamped to [`MIN_INTERVAL`]; the cooldown is not.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self.cooldown = interval;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Lifecycle notifications, emitted in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Spawned { pid: Option<u32> },
    LineReceived { pid: Option<u32> },
    ReadFailed { pid: Option<u32> },
    /// `code` is `None` when the process was killed by a signal.
    Exited { pid: Option<u32>, code: Option<i32> },
}

type EventSender = mpsc::UnboundedSender<SupervisorEvent>;

/// Keeps one reader process running and feeds its output to a sink.
pub struct Supervisor {
    config: SupervisorConfig,
    sink: Arc<dyn ReportSink>,
    events: Option<EventSender>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            config,
            sink,
            events: None,
        }
    }

    /// Publish lifecycle events on `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the spawn/poll/restart cycle until shutdown is requested.
    ///
    /// A dropped shutdown sender counts as a request. Returns an error only
    /// if the reader cannot be started.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), SupervisorError> {
        info!(
            program = %self.config.program.display(),
            interval_ms = self.config.interval.as_millis() as u64,
            "supervisor started"
        );

        loop {
            let mut child = self.spawn()?;
            let pid = child.id();
            info!(?pid, "process started");
            self.emit(SupervisorEvent::Spawned { pid });

            let stdin = child.stdin.take().ok_or(SupervisorError::MissingPipe("stdin"))?;
            let stdout = child.stdout.take().ok_or(SupervisorError::MissingPipe("stdout"))?;

            let (done_tx, done_rx) = oneshot::channel();
            let exchange_handle = tokio::spawn(run_exchange_loop(ExchangeLoop {
                pid,
                stdin,
                stdout,
                request: self.config.request.clone(),
                interval: self.config.interval,
                sink: self.sink.clone(),
                events: self.events.clone(),
                done: done_rx,
            }));

            let exit = tokio::select! {
                status = child.wait() => Some(status),
                _ = shutdown_requested(&mut shutdown) => None,
            };

            let _ = done_tx.send(());
            if let Err(e) = exchange_handle.await {
                error!(?pid, error = %e, "exchange task failed");
            }

            match exit {
                Some(Ok(status)) => self.on_exit(pid, status),
                Some(Err(e)) => {
                    error!(?pid, error = %e, "failed waiting for process");
                    if let Err(e) = child.kill().await {
                        warn!(?pid, error = %e, "failed to kill process");
                    }
                    self.emit(SupervisorEvent::Exited { pid, code: None });
                }
                None => {
                    info!(?pid, "shutdown requested, stopping process");
                    if let Err(e) = child.kill().await {
                        warn!(?pid, error = %e, "failed to kill process");
                    }
                    return Ok(());
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.cooldown) => {}
                _ = shutdown_requested(&mut shutdown) => {
                    info!("supervisor shutting down");
                    return Ok(());
                }
            }
        }
    }

    fn spawn(&self) -> Result<Child, SupervisorError> {
        Command::new(&self.config.program)
            .args(&self.config.args)
            .envs(self.config.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: self.config.program.clone(),
                source,
            })
    }

    fn on_exit(&self, pid: Option<u32>, status: ExitStatus) {
        let code = status.code();
        info!(
            ?pid,
            exit_code = code.unwrap_or(-1),
            %status,
            "process exited"
        );
        self.emit(SupervisorEvent::Exited { pid, code });
    }

    fn emit(&self, event: SupervisorEvent) {
        if let Some(ref events) = self.events {
            let _ = events.send(event);
        }
    }
}

/// Everything the exchange task owns for one process lifetime.
struct ExchangeLoop {
    pid: Option<u32>,
    stdin: ChildStdin,
    stdout: ChildStdout,
    request: Vec<u8>,
    interval: Duration,
    sink: Arc<dyn ReportSink>,
    events: Option<EventSender>,
    done: oneshot::Receiver<()>,
}

/// Poll the process once per tick until `done` fires.
///
/// The first exchange happens immediately. `done` is also watched during
/// an exchange so a process that stops answering cannot hold up a restart.
async fn run_exchange_loop(mut ctx: ExchangeLoop) {
    let mut ticker = tokio::time::interval(ctx.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut ctx.done => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = &mut ctx.done => break,
            result = exchange(&mut ctx.stdin, &mut ctx.stdout, &ctx.request) => result,
        };

        let event = match result {
            Ok(line) => {
                ctx.sink.report(&line);
                SupervisorEvent::LineReceived { pid: ctx.pid }
            }
            Err(e) => {
                warn!(pid = ?ctx.pid, error = %e, "unable to read bytes from stdout");
                SupervisorEvent::ReadFailed { pid: ctx.pid }
            }
        };
        if let Some(ref events) = ctx.events {
            let _ = events.send(event);
        }
    }

    debug!(pid = ?ctx.pid, "exchange loop stopped");
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
