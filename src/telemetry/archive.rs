//! # Archive Publishing
//!
//! Completed log files are handed to an [`ArchivePublisher`] through a
//! [`PublishQueue`]. The queue runs on its own task, so the capture loop
//! only enqueues a path and never waits on the remote.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{CaptureError, Result};

/// What to do once every publish attempt for a file has failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and keep capturing
    Log,

    /// Report the failure to the capture loop, which then shuts down
    Fatal,
}

/// Publishes a completed log file to remote storage
#[async_trait]
pub trait ArchivePublisher: Send + Sync {
    /// Publish `path`; blocking the calling task until done
    async fn publish(&self, path: &Path) -> Result<()>;
}

/// Publishes log files by committing them to a git repository and pushing
#[derive(Debug, Clone)]
pub struct GitPublisher {
    program: PathBuf,
    repo_dir: PathBuf,
    remote: String,
    branch: String,
}

impl GitPublisher {
    /// Create a publisher for the repository checked out at `repo_dir`
    ///
    /// Credentials come from git's own configuration (credential helper or
    /// remote URL); nothing is injected here.
    pub fn new(repo_dir: impl Into<PathBuf>, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from("git"),
            repo_dir: repo_dir.into(),
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    /// Use a specific git executable instead of the one on `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    async fn git(&self, args: &[&str], path: &Path) -> Result<()> {
        debug!(repo = %self.repo_dir.display(), ?args, "Running git");

        // An aborted publish must not leave a hung push behind
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.repo_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CaptureError::Publish {
                path: path.to_path_buf(),
                reason: format!("failed to run git {}: {}", args[0], e),
            })?;

        if !output.status.success() {
            return Err(CaptureError::Publish {
                path: path.to_path_buf(),
                reason: format!(
                    "git {} exited with {}: {}",
                    args[0],
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ArchivePublisher for GitPublisher {
    async fn publish(&self, path: &Path) -> Result<()> {
        // git resolves relative paths against repo_dir, not our cwd
        let file = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let file = file.to_string_lossy();
        let message = commit_message(path);

        self.git(&["add", file.as_ref()], path).await?;
        self.git(&["commit", "-m", message.as_str()], path).await?;
        self.git(&["push", self.remote.as_str(), self.branch.as_str()], path).await?;

        Ok(())
    }
}

/// Commit message for a log file: `Stress test log file: <YYYY-MM-DD>`
///
/// The date comes from the file name (`log_2025-01-21.csv`,
/// `uart_data_2025-01-21_10-00-00.csv`). Files without one fall back to
/// today's local date.
fn commit_message(path: &Path) -> String {
    let date = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| {
            stem.split('_')
                .find_map(|part| NaiveDate::parse_from_str(part, "%Y-%m-%d").ok())
        })
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    format!("Stress test log file: {}", date.format("%Y-%m-%d"))
}

/// Retry behaviour of the publish worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub policy: FailurePolicy,
    pub drain_timeout: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            policy: FailurePolicy::Log,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Cloneable handle used to enqueue closed log files
#[derive(Debug, Clone)]
pub struct ArchiveSender {
    tx: mpsc::UnboundedSender<PathBuf>,
}

impl ArchiveSender {
    /// Enqueue `path` for publishing without waiting
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::Publish` if the worker is no longer running.
    pub fn submit(&self, path: PathBuf) -> Result<()> {
        debug!(path = %path.display(), "Queued log file for archival");
        self.tx.send(path).map_err(|e| CaptureError::Publish {
            path: e.0,
            reason: "archive worker has stopped".to_string(),
        })
    }
}

/// Background publish worker and its channels
pub struct PublishQueue {
    sender: ArchiveSender,
    failures: mpsc::UnboundedReceiver<CaptureError>,
    shutdown: Option<oneshot::Sender<()>>,
    worker: JoinHandle<()>,
    drain_timeout: Duration,
}

impl std::fmt::Debug for PublishQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishQueue")
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}

impl PublishQueue {
    /// Spawn the publish worker on the current tokio runtime
    pub fn spawn<P>(publisher: P, settings: RetrySettings) -> Self
    where
        P: ArchivePublisher + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = tokio::spawn(run_worker(publisher, rx, shutdown_rx, failure_tx, settings));

        Self {
            sender: ArchiveSender { tx },
            failures: failure_rx,
            shutdown: Some(shutdown_tx),
            worker,
            drain_timeout: settings.drain_timeout,
        }
    }

    /// Handle for enqueueing paths
    pub fn sender(&self) -> ArchiveSender {
        self.sender.clone()
    }

    /// Pending fatal failure, if the worker reported one
    ///
    /// Only produces errors under [`FailurePolicy::Fatal`].
    pub fn take_fatal(&mut self) -> Option<CaptureError> {
        self.failures.try_recv().ok()
    }

    /// Publish what is still queued, then stop the worker
    ///
    /// Waits at most the configured drain timeout before aborting the
    /// worker. Failures reported while draining are logged.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        match tokio::time::timeout(self.drain_timeout, &mut self.worker).await {
            Ok(Ok(())) => debug!("Archive worker stopped"),
            Ok(Err(e)) => warn!("Archive worker ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    "Archive worker did not finish within {:?}, aborting",
                    self.drain_timeout
                );
                self.worker.abort();
            }
        }

        while let Ok(err) = self.failures.try_recv() {
            error!("Archive failure during shutdown: {}", err);
        }
    }
}

async fn run_worker<P: ArchivePublisher>(
    publisher: P,
    mut paths: mpsc::UnboundedReceiver<PathBuf>,
    mut shutdown: oneshot::Receiver<()>,
    failures: mpsc::UnboundedSender<CaptureError>,
    settings: RetrySettings,
) {
    loop {
        let path = tokio::select! {
            biased;
            path = paths.recv() => match path {
                Some(path) => path,
                None => break,
            },
            _ = &mut shutdown => {
                paths.close();
                while let Some(path) = paths.recv().await {
                    publish_with_retry(&publisher, path, &failures, &settings).await;
                }
                break;
            }
        };

        publish_with_retry(&publisher, path, &failures, &settings).await;
    }
}

async fn publish_with_retry<P: ArchivePublisher>(
    publisher: &P,
    path: PathBuf,
    failures: &mpsc::UnboundedSender<CaptureError>,
    settings: &RetrySettings,
) {
    let attempts = settings.max_attempts.max(1);

    for attempt in 1..=attempts {
        match publisher.publish(&path).await {
            Ok(()) => {
                info!(path = %path.display(), attempt, "Published log file");
                return;
            }
            Err(e) if attempt < attempts => {
                warn!(path = %path.display(), attempt, "Publish attempt failed: {}", e);
                tokio::time::sleep(settings.retry_delay).await;
            }
            Err(e) => {
                error!(path = %path.display(), attempts, "Giving up on publish: {}", e);
                if settings.policy == FailurePolicy::Fatal {
                    let _ = failures.send(e);
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::MockPublisher;
    use super::*;

    fn fast_settings(policy: FailurePolicy) -> RetrySettings {
        RetrySettings {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
            policy,
            drain_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_queue_publishes_in_order() {
        let publisher = MockPublisher::new();
        let queue = PublishQueue::spawn(publisher.clone(), fast_settings(FailurePolicy::Log));
        let sender = queue.sender();

        sender.submit(PathBuf::from("db/log_2025-01-20.csv")).unwrap();
        sender.submit(PathBuf::from("db/log_2025-01-21.csv")).unwrap();
        queue.shutdown().await;

        assert_eq!(
            publisher.get_published(),
            vec![
                PathBuf::from("db/log_2025-01-20.csv"),
                PathBuf::from("db/log_2025-01-21.csv"),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let publisher = MockPublisher::new();
        publisher.fail_next(2);
        let queue = PublishQueue::spawn(publisher.clone(), fast_settings(FailurePolicy::Fatal));

        queue.sender().submit(PathBuf::from("db/log_2025-01-20.csv")).unwrap();
        queue.shutdown().await;

        assert_eq!(publisher.get_attempts(), 3);
        assert_eq!(publisher.get_published().len(), 1);
    }

    #[tokio::test]
    async fn test_log_policy_never_reports_fatal() {
        let publisher = MockPublisher::new();
        publisher.fail_next(10);
        let mut queue = PublishQueue::spawn(publisher.clone(), fast_settings(FailurePolicy::Log));

        queue.sender().submit(PathBuf::from("db/log_2025-01-20.csv")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(queue.take_fatal().is_none());
        assert_eq!(publisher.get_attempts(), 3);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_fatal_policy_reports_exhausted_retries() {
        let publisher = MockPublisher::new();
        publisher.fail_next(10);
        let mut queue = PublishQueue::spawn(publisher.clone(), fast_settings(FailurePolicy::Fatal));

        queue.sender().submit(PathBuf::from("db/log_2025-01-20.csv")).unwrap();

        let failure = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(err) = queue.take_fatal() {
                    return err;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("fatal failure should be reported");

        assert!(matches!(failure, CaptureError::Publish { .. }));
        assert_eq!(publisher.get_attempts(), 3);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_worker_stopped_fails() {
        let queue = PublishQueue::spawn(MockPublisher::new(), fast_settings(FailurePolicy::Log));
        let sender = queue.sender();
        queue.shutdown().await;

        let result = sender.submit(PathBuf::from("db/log_2025-01-22.csv"));
        assert!(matches!(result, Err(CaptureError::Publish { .. })));
    }

    #[tokio::test]
    async fn test_git_publisher_missing_repo_is_publish_error() {
        let publisher = GitPublisher::new("/nonexistent/repo/dir", "origin", "main");
        let result = publisher.publish(Path::new("db/log_2025-01-20.csv")).await;

        match result {
            Err(CaptureError::Publish { path, reason }) => {
                assert_eq!(path, PathBuf::from("db/log_2025-01-20.csv"));
                assert!(reason.contains("git add"));
            }
            other => panic!("Expected Publish error, got: {:?}", other),
        }
    }

    #[test]
    fn test_commit_message_uses_date_of_daily_log() {
        assert_eq!(
            commit_message(Path::new("db/log_2025-01-20.csv")),
            "Stress test log file: 2025-01-20"
        );
    }

    #[test]
    fn test_commit_message_uses_date_of_session_log() {
        assert_eq!(
            commit_message(Path::new("db/uart_data_2025-01-21_23-59-11.csv")),
            "Stress test log file: 2025-01-21"
        );
    }

    #[test]
    fn test_commit_message_without_date_uses_today() {
        let today = || format!("Stress test log file: {}", chrono::Local::now().format("%Y-%m-%d"));
        let before = today();
        let message = commit_message(Path::new("db/notes.csv"));
        let after = today();
        assert!(message == before || message == after, "{}", message);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_dropped_publish_kills_hung_git() {
        use std::fs;
        use tempfile::TempDir;

        // `sh add <file>` runs the script named `add` from the repo dir
        let repo = TempDir::new().unwrap();
        fs::write(repo.path().join("add"), "echo $$ > pid\nexec sleep 30\n").unwrap();
        let publisher = GitPublisher::new(repo.path(), "origin", "main").with_program("sh");

        let result = tokio::time::timeout(
            Duration::from_millis(500),
            publisher.publish(Path::new("db/log_2025-01-20.csv")),
        )
        .await;
        assert!(result.is_err(), "publish should still be blocked");

        let pid = fs::read_to_string(repo.path().join("pid")).unwrap();
        let stat_path = format!("/proc/{}/stat", pid.trim());
        let is_alive = || match fs::read_to_string(&stat_path) {
            // Field 3 is the state; a killed child is a zombie until reaped
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map_or(false, |rest| !rest.trim_start().starts_with('Z')),
            Err(_) => false,
        };

        for _ in 0..100 {
            if !is_alive() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("git child {} outlived the dropped publish", pid.trim());
    }
}
