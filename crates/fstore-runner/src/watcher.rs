//! Completion watchers.
//!
//! A [`CompletionWatcher`] represents one asynchronous unit of work: a chunk
//! copy, a cluster job, or an aggregate of many. It moves from pending to a
//! terminal success or failure exactly once and never reopens.
//!
//! - [`SyncWatcher`] is a one-shot signal ended by a background task.
//! - [`WatcherMultiplex`] aggregates many watchers into one verdict.
//! - [`CompletedWatcher`] is already terminal, for work that needs no tasks.
//!
//! Terminal errors are shared as `Arc<Error>` so any number of observers can
//! read the same verdict.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{Error, Result};

/// Terminal outcome observed through a watcher.
pub type WatchResult = std::result::Result<(), Arc<Error>>;

/// Handle on an asynchronous unit of work.
#[async_trait]
pub trait CompletionWatcher: Send + Sync + fmt::Display {
    /// Returns true once the work has reached a terminal state. Never blocks.
    fn complete(&self) -> bool;

    /// Waits until the work is terminal and returns its outcome.
    ///
    /// Only the calling task is suspended; the work itself is unaffected.
    /// Deadlines are the caller's responsibility.
    async fn wait(&self) -> WatchResult;

    /// Returns the terminal error, if the work has failed.
    fn err(&self) -> Option<Arc<Error>>;
}

/// One-shot watcher ended by a single call to [`SyncWatcher::end_watch`].
pub struct SyncWatcher {
    description: String,
    state: watch::Sender<Option<WatchResult>>,
}

impl SyncWatcher {
    /// Creates a pending watcher.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            description: description.into(),
            state,
        }
    }

    /// Moves the watcher to its terminal state.
    ///
    /// The first call wins. Later calls leave the recorded outcome untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WatcherAlreadyEnded`] if the watcher was already ended.
    pub fn end_watch(&self, result: Result<()>) -> Result<()> {
        let outcome = result.map_err(Arc::new);
        let ended = self.state.send_if_modified(move |state| {
            if state.is_some() {
                return false;
            }
            *state = Some(outcome);
            true
        });
        if ended {
            Ok(())
        } else {
            tracing::warn!(watcher = %self.description, "watcher ended more than once");
            Err(Error::WatcherAlreadyEnded)
        }
    }
}

impl fmt::Debug for SyncWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncWatcher")
            .field("description", &self.description)
            .field("complete", &self.complete())
            .finish()
    }
}

impl fmt::Display for SyncWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            None => write!(f, "{}: pending", self.description),
            Some(Ok(())) => write!(f, "{}: complete", self.description),
            Some(Err(err)) => write!(f, "{}: failed: {err}", self.description),
        }
    }
}

#[async_trait]
impl CompletionWatcher for SyncWatcher {
    fn complete(&self) -> bool {
        self.state.borrow().is_some()
    }

    async fn wait(&self) -> WatchResult {
        let mut rx = self.state.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map(|state| (*state).clone())
            .map_err(|_| Arc::new(Error::storage("watcher channel closed")))?;
        outcome.unwrap_or(Ok(()))
    }

    fn err(&self) -> Option<Arc<Error>> {
        match &*self.state.borrow() {
            Some(Err(err)) => Some(Arc::clone(err)),
            _ => None,
        }
    }
}

/// Runs `work` on the tokio runtime and returns a watcher ended with its outcome.
///
/// A panic inside `work` ends the watcher with [`Error::WorkerPanicked`].
pub fn spawn_watched<F>(description: impl Into<String>, work: F) -> Arc<SyncWatcher>
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let watcher = Arc::new(SyncWatcher::new(description));
    let ender = Arc::clone(&watcher);
    let handle = tokio::spawn(work);
    tokio::spawn(async move {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(Error::WorkerPanicked {
                message: join_err.to_string(),
            }),
        };
        if let Err(err) = &outcome {
            tracing::warn!(watcher = %ender.description, error = %err, "watched task failed");
        }
        let _ = ender.end_watch(outcome);
    });
    watcher
}

/// Aggregate of many watchers.
///
/// Complete when every member is complete. `wait` visits members in order
/// and returns the first error it meets; members keep running regardless.
#[derive(Clone, Default)]
pub struct WatcherMultiplex {
    watchers: Vec<Arc<dyn CompletionWatcher>>,
}

impl WatcherMultiplex {
    /// Creates a multiplex over the given watchers, in order.
    #[must_use]
    pub fn new(watchers: Vec<Arc<dyn CompletionWatcher>>) -> Self {
        Self { watchers }
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    /// Returns true if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Returns the number of members that are complete.
    #[must_use]
    pub fn complete_count(&self) -> usize {
        self.watchers.iter().filter(|w| w.complete()).count()
    }
}

impl fmt::Display for WatcherMultiplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} complete out of {}",
            self.complete_count(),
            self.watchers.len()
        )
    }
}

impl fmt::Debug for WatcherMultiplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WatcherMultiplex({self})")
    }
}

#[async_trait]
impl CompletionWatcher for WatcherMultiplex {
    fn complete(&self) -> bool {
        self.watchers.iter().all(|w| w.complete())
    }

    async fn wait(&self) -> WatchResult {
        for watcher in &self.watchers {
            watcher.wait().await?;
        }
        Ok(())
    }

    fn err(&self) -> Option<Arc<Error>> {
        self.watchers.iter().find_map(|w| w.err())
    }
}

/// A watcher that is already terminal.
#[derive(Debug, Clone)]
pub struct CompletedWatcher {
    description: String,
    outcome: WatchResult,
}

impl CompletedWatcher {
    /// Creates a successfully completed watcher.
    #[must_use]
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            outcome: Ok(()),
        }
    }

    /// Creates a failed watcher.
    #[must_use]
    pub fn failure(description: impl Into<String>, err: Error) -> Self {
        Self {
            description: description.into(),
            outcome: Err(Arc::new(err)),
        }
    }
}

impl fmt::Display for CompletedWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(()) => write!(f, "{}: complete", self.description),
            Err(err) => write!(f, "{}: failed: {err}", self.description),
        }
    }
}

#[async_trait]
impl CompletionWatcher for CompletedWatcher {
    fn complete(&self) -> bool {
        true
    }

    async fn wait(&self) -> WatchResult {
        self.outcome.clone()
    }

    fn err(&self) -> Option<Arc<Error>> {
        self.outcome.as_ref().err().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sync_watcher_first_end_wins() {
        let watcher = SyncWatcher::new("test");
        assert!(!watcher.complete());
        assert!(watcher.err().is_none());

        watcher.end_watch(Err(Error::dispatch("boom"))).unwrap();
        assert!(matches!(
            watcher.end_watch(Ok(())),
            Err(Error::WatcherAlreadyEnded)
        ));

        assert!(watcher.complete());
        let err = watcher.wait().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(watcher.err().is_some());
        assert!(watcher.to_string().contains("failed"));
    }

    #[tokio::test]
    async fn wait_blocks_until_ended() {
        let watcher = Arc::new(SyncWatcher::new("background"));
        let ender = Arc::clone(&watcher);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ender.end_watch(Ok(())).unwrap();
        });
        assert!(!watcher.complete());
        watcher.wait().await.unwrap();
        assert!(watcher.complete());
        assert!(watcher.err().is_none());
    }

    #[tokio::test]
    async fn many_observers_see_same_error() {
        let watcher = Arc::new(SyncWatcher::new("shared"));
        let observers: Vec<_> = (0..4)
            .map(|_| {
                let w = Arc::clone(&watcher);
                tokio::spawn(async move { w.wait().await })
            })
            .collect();
        watcher.end_watch(Err(Error::dispatch("once"))).unwrap();
        let first = watcher.err().unwrap();
        for observer in observers {
            let err = observer.await.unwrap().unwrap_err();
            assert!(Arc::ptr_eq(&err, &first));
        }
    }

    #[tokio::test]
    async fn multiplex_reports_first_error_in_order() {
        let a = Arc::new(SyncWatcher::new("a"));
        let b = Arc::new(SyncWatcher::new("b"));
        let c = Arc::new(SyncWatcher::new("c"));
        let multiplex = WatcherMultiplex::new(vec![
            Arc::clone(&a) as Arc<dyn CompletionWatcher>,
            Arc::clone(&b) as Arc<dyn CompletionWatcher>,
            Arc::clone(&c) as Arc<dyn CompletionWatcher>,
        ]);
        assert_eq!(multiplex.to_string(), "0 complete out of 3");

        c.end_watch(Err(Error::dispatch("third"))).unwrap();
        b.end_watch(Err(Error::dispatch("second"))).unwrap();
        assert!(!multiplex.complete());
        assert!(multiplex.err().unwrap().to_string().contains("second"));

        a.end_watch(Ok(())).unwrap();
        assert!(multiplex.complete());
        assert_eq!(multiplex.to_string(), "3 complete out of 3");
        let err = multiplex.wait().await.unwrap_err();
        assert!(err.to_string().contains("second"));
    }

    #[tokio::test]
    async fn empty_multiplex_is_complete() {
        let multiplex = WatcherMultiplex::default();
        assert!(multiplex.complete());
        assert!(multiplex.wait().await.is_ok());
        assert!(multiplex.err().is_none());
        assert_eq!(multiplex.to_string(), "0 complete out of 0");
    }

    #[tokio::test]
    async fn spawned_work_ends_its_watcher() {
        let ok = spawn_watched("ok", async { Ok(()) });
        ok.wait().await.unwrap();

        let failed = spawn_watched("failed", async { Err::<(), _>(Error::dispatch("copy failed")) });
        let err = failed.wait().await.unwrap_err();
        assert!(err.to_string().contains("copy failed"));
    }

    #[tokio::test]
    async fn panicking_work_is_reported() {
        async fn explode() -> Result<()> {
            panic!("chunk worker exploded")
        }

        let watcher = spawn_watched("panics", explode());
        let err = watcher.wait().await.unwrap_err();
        assert!(matches!(*err, Error::WorkerPanicked { .. }));
        assert!(watcher.complete());
    }

    #[tokio::test]
    async fn completed_watcher_is_terminal() {
        let ok = CompletedWatcher::success("noop");
        assert!(ok.complete());
        assert!(ok.wait().await.is_ok());

        let failed = CompletedWatcher::failure("noop", Error::dispatch("nope"));
        assert!(failed.complete());
        assert!(failed.err().is_some());
        assert!(failed.wait().await.is_err());
    }
}
