//! Concurrent process runner with graceful shutdown.
//!
//! Runs the service's long-lived processes (consumers) side by side, cancels
//! everything on SIGTERM/SIGINT or on the first process failure, then runs
//! cleanup closers under a timeout. `run` returns an exit code so the caller
//! owns process exit and tests can observe the outcome.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A long-running process: receives a cancellation token and runs until
/// cancelled or failed.
pub type Process = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// A cleanup function executed after all processes have stopped.
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

pub struct Runner {
    processes: Vec<Process>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Add a process. If any process fails, all are cancelled.
    pub fn with_process<F, Fut>(mut self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes.push(Box::new(|token| Box::pin(process(token))));
        self
    }

    /// Add a pre-boxed process (as produced by worker wiring)
    pub fn with_boxed_process(mut self, process: Process) -> Self {
        self.processes.push(process);
        self
    }

    /// Add a closer, executed after all processes stop regardless of outcome
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally controlled cancellation token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run until completion, signal, or first failure. Returns the exit code
    /// the caller should terminate with.
    pub async fn run(self) -> i32 {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for process in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move { process(process_token).await });
        }

        spawn_signal_handlers(token.clone());

        let mut failed = false;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => {
                    debug!("Process completed successfully");
                }
                Ok(Err(err)) => {
                    error!("Process error: {:#}", err);
                    failed = true;
                    token.cancel();
                }
                Err(err) => {
                    error!("Process panicked: {}", err);
                    failed = true;
                    token.cancel();
                }
            }
        }

        if !self.closers.is_empty() {
            info!(timeout_secs = self.closer_timeout.as_secs(), "Running closers");
            if tokio::time::timeout(self.closer_timeout, run_closers(self.closers))
                .await
                .is_err()
            {
                error!("Closers timed out");
            }
        }

        if failed {
            1
        } else {
            info!("Runner finished cleanly");
            0
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
            Err(err) => {
                error!("Error setting up signal handler: {}", err);
            }
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
            Err(err) => {
                error!("Error setting up SIGTERM handler: {}", err);
            }
        }
    });
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();

    for closer in closers {
        closer_set.spawn(async move { closer().await });
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => debug!("Closer completed"),
            Ok(Err(err)) => error!("Closer error: {:#}", err),
            Err(err) => error!("Closer panicked: {}", err),
        }
    }
}
