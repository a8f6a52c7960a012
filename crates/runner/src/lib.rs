//! A concurrent application runner for long-running service processes.
//!
//! The runner owns the process lifecycle of the loader:
//! - Named app processes run concurrently on a shared cancellation token
//! - SIGTERM/SIGINT cancel the token
//! - Cancelled processes get a bounded grace period to drain before being aborted
//! - Closers always run afterwards, under their own timeout
//!
//! # Example
//!
//! ```no_run
//! use ja3_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = Runner::new()
//!         .with_app_process(|ctx| async move {
//!             ctx.cancelled().await;
//!             tracing::info!("Process stopping gracefully");
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("Cleaning up resources");
//!             Ok(())
//!         })
//!         .with_shutdown_timeout(Duration::from_secs(10));
//!
//!     std::process::exit(runner.run().await);
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Boxed future returned by app processes and closers.
pub type BoxedResultFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

/// An app process: takes the shared cancellation token and runs until it is cancelled or fails.
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedResultFuture + Send>;

/// A cleanup function executed after all app processes have stopped.
pub type Closer = Box<dyn FnOnce() -> BoxedResultFuture + Send>;

/// Exit code returned when every process stopped cleanly.
pub const EXIT_OK: i32 = 0;
/// Exit code returned when an app process failed or panicked.
pub const EXIT_FAILURE: i32 = 1;

struct NamedProcess {
    name: String,
    process: AppProcess,
}

/// Runs named app processes until shutdown, then drains them and runs closers.
pub struct Runner {
    processes: Vec<NamedProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    shutdown_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Creates a new Runner.
    ///
    /// Defaults: 10 second closer timeout, 10 second shutdown (drain) timeout.
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds an anonymous app process, named after its position.
    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        let name = format!("process_{}", self.processes.len());
        self.with_named_process(name, Box::new(move |token| Box::pin(process(token))))
    }

    /// Adds a named app process.
    ///
    /// The name shows up in every lifecycle log line for that process.
    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.processes.push(NamedProcess {
            name: name.into(),
            process,
        });
        self
    }

    /// Adds a closer. Closers run after all processes have stopped, even if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// Sets the timeout for executing closers.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Sets how long cancelled processes may take to drain before they are aborted.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets a custom cancellation token, allowing external control over shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs all processes to completion and returns the process exit code.
    ///
    /// 1. Spawns every process on the shared token
    /// 2. Cancels the token on SIGTERM/SIGINT, or when a process fails or panics
    /// 3. Waits up to the shutdown timeout for the remaining processes, then aborts them
    /// 4. Executes closers under the closer timeout
    pub async fn run(self) -> i32 {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for NamedProcess { name, process } in self.processes {
            let process_token = token.clone();
            info!(process = %name, "Starting app process");
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        spawn_signal_handlers(token.clone());

        let mut failed = false;
        while let Some(joined) = tokio::select! {
            joined = join_set.join_next() => joined,
            _ = token.cancelled() => None,
        } {
            failed |= Self::record_exit(joined, &token);
        }

        if !join_set.is_empty() {
            info!(
                remaining = join_set.len(),
                timeout = ?self.shutdown_timeout,
                "Waiting for app processes to drain"
            );
            let drained = tokio::time::timeout(self.shutdown_timeout, async {
                let mut failed = false;
                while let Some(joined) = join_set.join_next().await {
                    failed |= Self::record_exit(joined, &token);
                }
                failed
            })
            .await;

            match drained {
                Ok(drain_failed) => failed |= drain_failed,
                Err(_) => {
                    warn!(
                        remaining = join_set.len(),
                        "App processes did not drain in time, aborting"
                    );
                    join_set.shutdown().await;
                }
            }
        }

        if !self.closers.is_empty() {
            info!(timeout = ?self.closer_timeout, "Running closers");
            match tokio::time::timeout(self.closer_timeout, Self::run_closers(self.closers)).await
            {
                Ok(()) => info!("All closers completed"),
                Err(_) => error!(timeout = ?self.closer_timeout, "Closers timed out"),
            }
        }

        if failed {
            error!("Application exiting with error");
            EXIT_FAILURE
        } else {
            info!("Application exiting normally");
            EXIT_OK
        }
    }

    /// Logs one finished process and cancels the token on failure.
    /// Returns true when the process failed or panicked.
    fn record_exit(
        joined: Result<(String, Result<(), anyhow::Error>), tokio::task::JoinError>,
        token: &CancellationToken,
    ) -> bool {
        match joined {
            Ok((name, Ok(()))) => {
                debug!(process = %name, "App process completed successfully");
                false
            }
            Ok((name, Err(err))) => {
                error!(process = %name, error = format!("{err:#}"), "App process failed");
                token.cancel();
                true
            }
            Err(err) => {
                error!(error = %err, "App process panicked");
                token.cancel();
                true
            }
        }
    }

    /// Runs all closers concurrently; a failing closer does not stop the others.
    async fn run_closers(closers: Vec<Closer>) {
        let mut closer_set = JoinSet::new();

        for closer in closers {
            closer_set.spawn(async move { closer().await });
        }

        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("Closer completed successfully"),
                Ok(Err(err)) => error!(error = format!("{err:#}"), "Closer error"),
                Err(err) => error!(error = %err, "Closer panicked"),
            }
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => error!(error = %err, "Error setting up signal handler"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM signal");
                token.cancel();
            }
            Err(err) => error!(error = %err, "Error setting up SIGTERM handler"),
        }
    });
}
