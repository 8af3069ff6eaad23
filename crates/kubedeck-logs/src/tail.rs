//! Log tail controller
//!
//! Drives one pod/container log view: a bounded initial fetch, then a
//! polling loop that appends the since-window delta to the shared buffer
//! once per interval until paused or closed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kubedeck_types::LogTarget;

use crate::buffer::TailBuffer;
use crate::fetch::LogFetcher;

/// Default interval between polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default cap on lines requested per poll
pub const MAX_POLL_LINES: i64 = 100;

/// Default cap on lines for the initial fetch
pub const MAX_INITIAL_LINES: i64 = 100;

/// Lifecycle of one log tail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TailState {
    /// No tail opened yet
    Idle,
    /// Initial fetch in flight
    Loading,
    /// Polling for new lines
    Active,
    /// Follow disabled; buffer retained, no polling
    Paused,
    /// Initial fetch failed; terminal
    Failed,
    /// Closed by the caller; terminal
    Stopped,
}

/// Tunables for the polling loop
#[derive(Clone, Copy, Debug)]
pub struct TailOptions {
    pub poll_interval: Duration,
    pub max_poll_lines: i64,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            max_poll_lines: MAX_POLL_LINES,
        }
    }
}

/// State shared between the controller, its tasks, and handles
struct TailShared {
    state: RwLock<TailState>,
    buffer: TailBuffer,
    /// When the current since window opened; advanced before each fetch
    last_polled: RwLock<Option<Instant>>,
    /// Completed poll ticks, for liveness observation
    poll_seq: AtomicU64,
    follow: AtomicBool,
    /// Token owned by the currently running polling loop, if any
    loop_token: Mutex<Option<CancellationToken>>,
}

impl TailShared {
    /// Fresh state for a tail about to load; follow starts enabled
    fn new() -> Self {
        Self {
            state: RwLock::new(TailState::Loading),
            buffer: TailBuffer::new(),
            last_polled: RwLock::new(None),
            poll_seq: AtomicU64::new(0),
            follow: AtomicBool::new(true),
            loop_token: Mutex::new(None),
        }
    }

    fn state(&self) -> TailState {
        *self.state.read()
    }

    fn set_state(&self, state: TailState) {
        *self.state.write() = state;
    }

    /// Cancel the running polling loop, if any
    fn stop_loop(&self) {
        if let Some(token) = self.loop_token.lock().take() {
            token.cancel();
        }
    }
}

/// Read-only view of a tail for rendering
#[derive(Clone)]
pub struct TailHandle {
    target: LogTarget,
    shared: Arc<TailShared>,
}

impl TailHandle {
    pub fn target(&self) -> &LogTarget {
        &self.target
    }

    pub fn state(&self) -> TailState {
        self.shared.state()
    }

    /// Current buffer contents
    pub fn buffer_snapshot(&self) -> String {
        self.shared.buffer.snapshot()
    }

    /// Number of completed poll ticks
    pub fn poll_sequence(&self) -> u64 {
        self.shared.poll_seq.load(Ordering::SeqCst)
    }

    pub fn follow(&self) -> bool {
        self.shared.follow.load(Ordering::SeqCst)
    }
}

/// One live tail: its shared state plus the tasks driving it
struct ActiveTail {
    target: LogTarget,
    shared: Arc<TailShared>,
    /// Tail-level token covering the initial fetch and any polling loop
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Drives one log tail at a time.
///
/// `open` replaces any previous tail; `set_follow` pauses and resumes the
/// polling loop; `close` tears everything down. At most one polling loop
/// runs per controller instance.
pub struct LogTailController<F: LogFetcher + 'static> {
    fetcher: Arc<F>,
    options: TailOptions,
    active: Option<ActiveTail>,
}

impl<F: LogFetcher + 'static> LogTailController<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self {
            fetcher,
            options: TailOptions::default(),
            active: None,
        }
    }

    pub fn with_options(fetcher: Arc<F>, options: TailOptions) -> Self {
        Self {
            fetcher,
            options,
            active: None,
        }
    }

    /// State of the current tail, `Idle` when none is open
    pub fn state(&self) -> TailState {
        self.active
            .as_ref()
            .map(|active| active.shared.state())
            .unwrap_or(TailState::Idle)
    }

    /// Target of the current tail, if any
    pub fn target(&self) -> Option<&LogTarget> {
        self.active.as_ref().map(|active| &active.target)
    }

    /// Handle for the current tail, if any
    pub fn handle(&self) -> Option<TailHandle> {
        self.active.as_ref().map(|active| TailHandle {
            target: active.target.clone(),
            shared: Arc::clone(&active.shared),
        })
    }

    /// Open a tail for a target, stopping any previous tail first.
    ///
    /// Returns immediately; the initial fetch runs in the background and
    /// the handle's state moves from `Loading` to `Active`, `Paused`, or
    /// `Failed`. Follow is enabled on a fresh tail.
    pub fn open(&mut self, target: LogTarget, max_initial_lines: i64) -> TailHandle {
        self.close();

        let shared = Arc::new(TailShared::new());
        let cancel = CancellationToken::new();
        let init = self.spawn_initial_fetch(
            target.clone(),
            Arc::clone(&shared),
            cancel.clone(),
            max_initial_lines,
        );

        let handle = TailHandle {
            target: target.clone(),
            shared: Arc::clone(&shared),
        };
        self.active = Some(ActiveTail {
            target,
            shared,
            cancel,
            tasks: vec![init],
        });
        handle
    }

    /// Enable or disable follow mode.
    ///
    /// Disabling while `Active` cancels the polling loop and pauses;
    /// enabling while `Paused` starts a fresh loop without repeating the
    /// initial fetch. During `Loading` only the flag is recorded, and the
    /// terminal states ignore the toggle.
    pub fn set_follow(&mut self, enabled: bool) {
        let Some(active) = &mut self.active else {
            return;
        };
        let shared = Arc::clone(&active.shared);
        shared.follow.store(enabled, Ordering::SeqCst);

        let mut loop_token = shared.loop_token.lock();
        match (shared.state(), enabled) {
            (TailState::Active, false) => {
                if let Some(token) = loop_token.take() {
                    token.cancel();
                }
                shared.set_state(TailState::Paused);
            }
            (TailState::Paused, true) if loop_token.is_none() => {
                shared.set_state(TailState::Active);
                let token = active.cancel.child_token();
                *loop_token = Some(token.clone());
                let task = tokio::spawn(run_poll_loop(
                    Arc::clone(&self.fetcher),
                    active.target.clone(),
                    Arc::clone(&shared),
                    token,
                    self.options,
                ));
                active.tasks.push(task);
            }
            _ => {}
        }
    }

    /// Stop the tail: cancel the polling loop and any in-flight initial
    /// fetch, then release the tail's resources. Idempotent.
    pub fn close(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.cancel.cancel();
        active.shared.stop_loop();
        for task in active.tasks.drain(..) {
            task.abort();
        }
        active.shared.set_state(TailState::Stopped);
    }

    fn spawn_initial_fetch(
        &self,
        target: LogTarget,
        shared: Arc<TailShared>,
        cancel: CancellationToken,
        max_initial_lines: i64,
    ) -> JoinHandle<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let options = self.options;

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = fetcher.fetch(&target, None, max_initial_lines) => result,
            };

            match result {
                Ok(text) => {
                    shared.buffer.set_initial(&text);
                    *shared.last_polled.write() = Some(Instant::now());

                    // Decide Active vs Paused under the loop-token lock so a
                    // concurrent follow toggle or close observes a consistent
                    // pair; close holds this lock before writing Stopped, so
                    // the cancellation check must happen inside it.
                    let loop_token = {
                        let mut guard = shared.loop_token.lock();
                        if cancel.is_cancelled() {
                            return;
                        }
                        if shared.follow.load(Ordering::SeqCst) {
                            shared.set_state(TailState::Active);
                            let token = cancel.child_token();
                            *guard = Some(token.clone());
                            Some(token)
                        } else {
                            shared.set_state(TailState::Paused);
                            None
                        }
                    };

                    if let Some(token) = loop_token {
                        run_poll_loop(fetcher, target, shared, token, options).await;
                    }
                }
                Err(err) => {
                    warn!(tail = %target, error = %err, "initial log fetch failed");
                    // Same ordering rule as the Ok arm: a close that raced
                    // this failure keeps the tail Stopped, not Failed.
                    let _guard = shared.loop_token.lock();
                    if cancel.is_cancelled() {
                        return;
                    }
                    shared
                        .buffer
                        .set_message(&format!("Failed to fetch logs for {}: {}", target, err));
                    shared.set_state(TailState::Failed);
                }
            }
        })
    }
}

impl<F: LogFetcher + 'static> Drop for LogTailController<F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Poll for new lines until the token is cancelled.
///
/// Each tick advances the window start before issuing the fetch, so a slow
/// or failed fetch never causes already-requested lines to be re-fetched.
async fn run_poll_loop<F: LogFetcher>(
    fetcher: Arc<F>,
    target: LogTarget,
    shared: Arc<TailShared>,
    cancel: CancellationToken,
    options: TailOptions,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(options.poll_interval) => {}
        }

        let now = Instant::now();
        let since = {
            let mut last = shared.last_polled.write();
            let elapsed = last
                .map(|at| now.duration_since(at))
                .unwrap_or(options.poll_interval);
            *last = Some(now);
            since_seconds(elapsed)
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = fetcher.fetch(&target, Some(since), options.max_poll_lines) => result,
        };

        match result {
            Ok(text) => {
                if !text.is_empty() {
                    shared.buffer.append(&text);
                }
            }
            Err(err) => {
                // Transient; the next tick retries
                debug!(tail = %target, error = %err, "log poll failed");
            }
        }

        shared.poll_seq.fetch_add(1, Ordering::SeqCst);
    }
}

/// Whole-second since window, rounded up, minimum one second
fn since_seconds(elapsed: Duration) -> i64 {
    let secs = elapsed.as_secs() + u64::from(elapsed.subsec_nanos() > 0);
    secs.max(1) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TAIL_HEADER;
    use crate::fetch::LogFetchError;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct FetchCall {
        since_seconds: Option<i64>,
        tail_lines: i64,
    }

    enum Step {
        Text(&'static str),
        Error(&'static str),
        /// Sleep in virtual time, then return text
        Slow(Duration, &'static str),
        /// Never resolve
        Hang,
    }

    /// Scripted fetcher: pops one step per call and records the arguments.
    /// An exhausted script hangs, like a quiet pod with no new lines.
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<FetchCall>>,
    }

    impl ScriptedFetcher {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }

        fn since_values(&self) -> Vec<Option<i64>> {
            self.calls.lock().iter().map(|c| c.since_seconds).collect()
        }
    }

    #[async_trait]
    impl LogFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            _target: &LogTarget,
            since_seconds: Option<i64>,
            tail_lines: i64,
        ) -> Result<String, LogFetchError> {
            self.calls.lock().push(FetchCall {
                since_seconds,
                tail_lines,
            });
            let step = self.script.lock().pop_front();
            match step {
                Some(Step::Text(text)) => Ok(text.to_string()),
                Some(Step::Error(message)) => Err(LogFetchError::Unavailable(message.to_string())),
                Some(Step::Slow(delay, text)) => {
                    tokio::time::sleep(delay).await;
                    Ok(text.to_string())
                }
                Some(Step::Hang) | None => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn target() -> LogTarget {
        LogTarget::new("default", "web-1", "app")
    }

    async fn wait_for(what: &str, cond: impl Fn() -> bool) {
        for _ in 0..2000 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {what}");
    }

    #[test]
    fn test_since_seconds_rounds_up() {
        assert_eq!(since_seconds(Duration::ZERO), 1);
        assert_eq!(since_seconds(Duration::from_millis(1)), 1);
        assert_eq!(since_seconds(Duration::from_secs(1)), 1);
        assert_eq!(since_seconds(Duration::from_millis(1001)), 2);
        assert_eq!(since_seconds(Duration::from_millis(3500)), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_seeds_buffer_and_goes_active() {
        let fetcher = ScriptedFetcher::new(vec![Step::Text("line1\nline2\n")]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));
        let handle = controller.open(target(), 100);

        wait_for("active state", || handle.state() == TailState::Active).await;

        let buffer = handle.buffer_snapshot();
        assert!(buffer.starts_with(TAIL_HEADER));
        assert_eq!(&buffer[TAIL_HEADER.len()..], "line1\nline2\n");
        assert!(handle.follow());

        let calls = fetcher.calls.lock();
        assert_eq!(calls[0].since_seconds, None);
        assert_eq!(calls[0].tail_lines, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_fetch_failure_is_terminal() {
        let fetcher = ScriptedFetcher::new(vec![Step::Error("connection refused")]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));
        let handle = controller.open(target(), 50);

        wait_for("failed state", || handle.state() == TailState::Failed).await;

        let buffer = handle.buffer_snapshot();
        assert!(buffer.contains("Failed to fetch logs for default/web-1/app"));
        assert!(buffer.contains("connection refused"));

        // No polling after a failed initial fetch
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.poll_sequence(), 0);
        assert_eq!(fetcher.call_count(), 1);

        // The toggle has nothing to resume
        controller.set_follow(true);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(handle.state(), TailState::Failed);
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_polls_leave_buffer_unchanged() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Text("start\n"),
            Step::Text(""),
            Step::Text(""),
            Step::Text(""),
            Step::Text(""),
            Step::Text(""),
        ]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));
        let handle = controller.open(target(), 100);

        wait_for("five ticks", || handle.poll_sequence() >= 5).await;

        assert_eq!(handle.buffer_snapshot(), format!("{TAIL_HEADER}start\n"));
        assert_eq!(handle.state(), TailState::Active);
        controller.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_does_not_stop_polling() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Text("start\n"),
            Step::Text("a\n"),
            Step::Text("b\n"),
            Step::Error("gateway timeout"),
            Step::Text("c\n"),
            Step::Text("d\n"),
        ]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));
        let handle = controller.open(target(), 100);

        let mut snapshots = Vec::new();
        for tick in 1..=5u64 {
            wait_for("tick", || handle.poll_sequence() >= tick).await;
            snapshots.push(handle.buffer_snapshot());
        }

        assert_eq!(
            snapshots.last().unwrap().as_str(),
            format!("{TAIL_HEADER}start\na\nb\nc\nd\n")
        );
        assert_eq!(handle.state(), TailState::Active);

        // Append-only: each snapshot extends the previous one
        for pair in snapshots.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
        }
        controller.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_covers_the_gap() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Text("start\n"),
            Step::Text("a\n"),
            Step::Text("b\n"),
            Step::Text("c\n"),
        ]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));
        let handle = controller.open(target(), 100);

        wait_for("two ticks", || handle.poll_sequence() >= 2).await;
        controller.set_follow(false);
        assert_eq!(handle.state(), TailState::Paused);
        assert!(!handle.follow());
        let paused_calls = fetcher.call_count();
        let paused_buffer = handle.buffer_snapshot();

        // Nothing polls while paused
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fetcher.call_count(), paused_calls);
        assert_eq!(handle.buffer_snapshot(), paused_buffer);

        controller.set_follow(true);
        assert_eq!(handle.state(), TailState::Active);
        wait_for("resumed tick", || handle.poll_sequence() >= 3).await;

        let since = fetcher.since_values();
        assert_eq!(since[0], None);
        assert_eq!(since[1], Some(1));
        assert_eq!(since[2], Some(1));
        // The resumed window spans the pause instead of re-reading old lines
        assert!(since[paused_calls].unwrap() >= 30);
        // The initial fetch ran exactly once
        assert_eq!(since.iter().filter(|s| s.is_none()).count(), 1);
        assert_eq!(
            handle.buffer_snapshot(),
            format!("{TAIL_HEADER}start\na\nb\nc\n")
        );
        controller.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_accounts_for_slow_fetch() {
        let fetcher = ScriptedFetcher::new(vec![
            Step::Text("start\n"),
            Step::Slow(Duration::from_millis(2500), "slow\n"),
            Step::Text("after\n"),
        ]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));
        let handle = controller.open(target(), 100);

        wait_for("two ticks", || handle.poll_sequence() >= 2).await;

        // The window opened when the slow fetch was issued, so the next
        // tick covers everything since then: 2.5s fetch + 1s sleep -> 4.
        let since = fetcher.since_values();
        assert_eq!(since[1], Some(1));
        assert_eq!(since[2], Some(4));
        assert_eq!(
            handle.buffer_snapshot(),
            format!("{TAIL_HEADER}start\nslow\nafter\n")
        );
        controller.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_before_initial_fetch_resolves() {
        let fetcher = ScriptedFetcher::new(vec![Step::Hang]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));
        let handle = controller.open(target(), 100);

        wait_for("fetch issued", || fetcher.call_count() == 1).await;
        assert_eq!(handle.state(), TailState::Loading);
        controller.close();
        assert_eq!(handle.state(), TailState::Stopped);

        // No loop ever starts and the in-flight fetch is released
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.poll_sequence(), 0);
        assert_eq!(fetcher.call_count(), 1);

        // Closing again is a no-op
        controller.close();
        assert_eq!(handle.state(), TailState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_off_during_loading_lands_paused() {
        let fetcher = ScriptedFetcher::new(vec![Step::Slow(Duration::from_secs(2), "line1\n")]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));
        let handle = controller.open(target(), 100);

        wait_for("fetch issued", || fetcher.call_count() == 1).await;
        assert_eq!(handle.state(), TailState::Loading);

        // Only the flag is recorded while the initial fetch is in flight;
        // its completion consults it and pauses instead of polling.
        controller.set_follow(false);
        assert_eq!(handle.state(), TailState::Loading);
        assert!(!handle.follow());

        wait_for("paused state", || handle.state() == TailState::Paused).await;
        assert_eq!(
            handle.buffer_snapshot(),
            format!("{TAIL_HEADER}line1\n")
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.poll_sequence(), 0);
        assert_eq!(fetcher.call_count(), 1);
        controller.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_the_tail() {
        let fetcher = ScriptedFetcher::new(vec![Step::Text("start\n"), Step::Text("a\n")]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));
        let handle = controller.open(target(), 100);

        wait_for("active state", || handle.state() == TailState::Active).await;
        drop(controller);
        assert_eq!(handle.state(), TailState::Stopped);

        // Fetching ceases once the controller is gone
        let calls = fetcher.call_count();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.state(), TailState::Stopped);
        assert_eq!(fetcher.call_count(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_new_target_stops_previous_tail() {
        let fetcher = ScriptedFetcher::new(vec![Step::Text("one\n"), Step::Text("two\n")]);
        let mut controller = LogTailController::new(Arc::clone(&fetcher));

        let first = controller.open(target(), 100);
        wait_for("first active", || first.state() == TailState::Active).await;

        let second = controller.open(LogTarget::new("default", "web-2", "app"), 100);
        assert_eq!(first.state(), TailState::Stopped);

        wait_for("second active", || second.state() == TailState::Active).await;
        assert_eq!(second.buffer_snapshot(), format!("{TAIL_HEADER}two\n"));
        assert_eq!(second.target().pod, "web-2");
        controller.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_uses_configured_line_cap() {
        let fetcher = ScriptedFetcher::new(vec![Step::Text("start\n"), Step::Text("a\n")]);
        let mut controller = LogTailController::with_options(
            Arc::clone(&fetcher),
            TailOptions {
                poll_interval: Duration::from_secs(1),
                max_poll_lines: 25,
            },
        );
        let handle = controller.open(target(), 500);

        wait_for("one tick", || handle.poll_sequence() >= 1).await;

        let calls = fetcher.calls.lock();
        assert_eq!(calls[0].tail_lines, 500);
        assert_eq!(calls[1].tail_lines, 25);
    }
}
