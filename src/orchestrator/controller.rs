//! Task lifecycle controller.
//!
//! Owns the active task, its generation token and the poll timer. Submits jobs, polls
//! their progress and emits events for presentation layers.

use crate::api::{ApiError, TaskService};
use crate::format;
use crate::model::{DownloadRequest, HistoryEntry, ProgressSnapshot, TaskEvent, TaskStatus};
use crate::storage::HistoryStore;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Duration, Interval, MissedTickBehavior};

/// Fallback shown when the service reports an error without a message.
pub(crate) const GENERIC_TASK_ERROR: &str = "Download failed";

/// Commands emitted by UI layers to drive the controller.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Start(DownloadRequest),
    /// Stop polling locally and ask the service to cancel the active task.
    Cancel,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControllerPhase {
    Idle,
    Submitting,
    Polling,
    Finished,
    Failed,
}

/// The task currently being polled.
#[derive(Debug, Clone)]
struct ActiveTask {
    task_id: String,
    generation: u64,
}

/// Result of one status check, tagged with the generation that issued it.
#[derive(Debug)]
struct PollOutcome {
    generation: u64,
    task_id: String,
    result: Result<ProgressSnapshot, ApiError>,
}

pub(crate) struct TaskController {
    service: Arc<dyn TaskService>,
    history: HistoryStore,
    event_tx: UnboundedSender<TaskEvent>,
    poll_interval: Duration,
    phase: ControllerPhase,
    generation: u64,
    active: Option<ActiveTask>,
    timer: Option<Interval>,
    poll_tx: UnboundedSender<PollOutcome>,
    poll_rx: UnboundedReceiver<PollOutcome>,
}

impl TaskController {
    pub(crate) fn new(
        service: Arc<dyn TaskService>,
        history: HistoryStore,
        event_tx: UnboundedSender<TaskEvent>,
        poll_interval: Duration,
    ) -> Self {
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();
        Self {
            service,
            history,
            event_tx,
            poll_interval,
            phase: ControllerPhase::Idle,
            generation: 0,
            active: None,
            timer: None,
            poll_tx,
            poll_rx,
        }
    }

    pub(crate) fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub(crate) fn is_polling(&self) -> bool {
        self.timer.is_some()
    }

    fn emit(&self, ev: TaskEvent) {
        let _ = self.event_tx.send(ev);
    }

    /// Submit a job. Any previously active task stops being polled first; no cancel
    /// request is sent for it. On failure nothing is polled and the error is returned
    /// for the submission path to display.
    pub(crate) async fn start(&mut self, request: DownloadRequest) -> Result<String, ApiError> {
        self.stop();
        self.phase = ControllerPhase::Submitting;
        tracing::info!(url = %request.url, quality = %request.quality, format = %request.format, "submitting download");

        let submitted = match self.service.submit(&request).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "download submission failed");
                self.phase = ControllerPhase::Failed;
                return Err(e);
            }
        };

        self.generation += 1;
        self.active = Some(ActiveTask {
            task_id: submitted.task_id.clone(),
            generation: self.generation,
        });
        self.phase = ControllerPhase::Polling;
        tracing::info!(task_id = %submitted.task_id, generation = self.generation, "task accepted");

        self.emit(TaskEvent::Submitted {
            task_id: submitted.task_id.clone(),
            title: submitted.title,
        });

        let entry = HistoryEntry {
            id: submitted.task_id.clone(),
            url: request.url,
            time: format::now_rfc3339(),
            status: TaskStatus::Downloading,
        };
        // The store may touch the filesystem; keep that off the async workers.
        let history = self.history.clone();
        match tokio::task::spawn_blocking(move || history.append(entry)).await {
            Ok(log) => self.emit(TaskEvent::HistoryUpdated(log)),
            Err(e) => tracing::warn!(error = %e, "history update task failed"),
        }

        // The first tick of a tokio interval completes immediately.
        let mut timer = tokio::time::interval(self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);

        Ok(submitted.task_id)
    }

    /// Clear the poll timer and forget the active task. Safe to call repeatedly.
    pub(crate) fn stop(&mut self) {
        if self.timer.take().is_some() {
            tracing::debug!("polling stopped");
        }
        self.active = None;
        if self.phase == ControllerPhase::Polling {
            self.phase = ControllerPhase::Idle;
        }
    }

    /// Stop polling and ask the service to cancel the active task.
    pub(crate) async fn cancel(&mut self) {
        let Some(task) = self.active.clone() else {
            return;
        };
        self.stop();
        match self.service.cancel(&task.task_id).await {
            Ok(()) => {
                tracing::info!(task_id = %task.task_id, "task cancelled");
                self.emit(TaskEvent::Info(format!("Cancelled task {}", task.task_id)));
            }
            Err(e) => {
                tracing::warn!(task_id = %task.task_id, error = %e, "cancel request failed");
                self.emit(TaskEvent::Info(format!("Cancel failed: {}", e.user_message())));
            }
        }
        self.emit(TaskEvent::Busy(false));
    }

    /// Issue one status check for the active task on a spawned task.
    fn spawn_poll(&self) {
        let Some(task) = self.active.clone() else {
            return;
        };
        let service = self.service.clone();
        let poll_tx = self.poll_tx.clone();
        tokio::spawn(async move {
            let result = service.progress(&task.task_id).await;
            let _ = poll_tx.send(PollOutcome {
                generation: task.generation,
                task_id: task.task_id,
                result,
            });
        });
    }

    fn apply_poll(&mut self, outcome: PollOutcome) {
        let current = match &self.active {
            Some(task) if task.generation == outcome.generation && self.is_polling() => task,
            _ => {
                tracing::debug!(
                    task_id = %outcome.task_id,
                    generation = outcome.generation,
                    "discarding stale poll result"
                );
                return;
            }
        };

        let snapshot = match outcome.result {
            Ok(s) => s,
            Err(e) => {
                // Transient: keep polling.
                tracing::warn!(task_id = %current.task_id, error = %e, "progress check failed");
                return;
            }
        };

        match snapshot.status {
            TaskStatus::Finished => {
                tracing::info!(task_id = %current.task_id, "task finished");
                self.stop();
                self.phase = ControllerPhase::Finished;
                self.emit(TaskEvent::Finished(snapshot));
                self.emit(TaskEvent::Busy(false));
                self.emit(TaskEvent::InputReset);
            }
            TaskStatus::Error => {
                tracing::warn!(task_id = %current.task_id, error = ?snapshot.error, "task failed remotely");
                self.stop();
                self.phase = ControllerPhase::Failed;
                let message = snapshot
                    .error
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| GENERIC_TASK_ERROR.to_string());
                self.emit(TaskEvent::Failed { message });
                self.emit(TaskEvent::Busy(false));
            }
            _ => self.emit(TaskEvent::Progress(snapshot)),
        }
    }

    /// Run the submission path for a validated request: start, and on failure show
    /// the error and release the busy state.
    async fn handle_start(&mut self, request: DownloadRequest) {
        if let Err(e) = self.start(request).await {
            self.emit(TaskEvent::Failed {
                message: e.user_message(),
            });
            self.emit(TaskEvent::Busy(false));
        }
    }

    /// Drive the controller until `Quit` or until every command sender is dropped.
    pub(crate) async fn run(mut self, mut cmd_rx: UnboundedReceiver<UiCommand>) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(UiCommand::Start(request)) => self.handle_start(request).await,
                        Some(UiCommand::Cancel) => self.cancel().await,
                        Some(UiCommand::Quit) | None => {
                            self.stop();
                            break;
                        }
                    }
                }
                _ = next_tick(&mut self.timer) => self.spawn_poll(),
                Some(outcome) = self.poll_rx.recv() => self.apply_poll(outcome),
            }
        }
        tracing::debug!(phase = ?self.phase(), "controller stopped");
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(t) => {
            t.tick().await;
        }
        None => futures::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RemoteTask, Submitted};
    use crate::storage::{KeyValueStore, MemoryStore, StorageError};
    use crate::view::{self, ViewState};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted stand-in for the remote service.
    #[derive(Default)]
    struct ScriptedService {
        submits: Mutex<VecDeque<Result<Submitted, ApiError>>>,
        progress: Mutex<HashMap<String, VecDeque<Result<ProgressSnapshot, ApiError>>>>,
        progress_delay: Duration,
        submit_calls: AtomicUsize,
        progress_calls: AtomicUsize,
        cancel_calls: AtomicUsize,
    }

    impl ScriptedService {
        fn accept(self, task_id: &str, title: Option<&str>) -> Self {
            self.submits.lock().unwrap().push_back(Ok(Submitted {
                task_id: task_id.into(),
                title: title.map(str::to_string),
            }));
            self
        }

        fn reject(self, message: &str) -> Self {
            self.submits
                .lock()
                .unwrap()
                .push_back(Err(ApiError::Rejected(message.into())));
            self
        }

        fn then(self, task_id: &str, result: Result<ProgressSnapshot, ApiError>) -> Self {
            self.progress
                .lock()
                .unwrap()
                .entry(task_id.to_string())
                .or_default()
                .push_back(result);
            self
        }

        fn progress_calls(&self) -> usize {
            self.progress_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskService for ScriptedService {
        async fn submit(&self, _request: &DownloadRequest) -> Result<Submitted, ApiError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            self.submits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Rejected("no scripted submit".into())))
        }

        async fn progress(&self, task_id: &str) -> Result<ProgressSnapshot, ApiError> {
            self.progress_calls.fetch_add(1, Ordering::SeqCst);
            if !self.progress_delay.is_zero() {
                tokio::time::sleep(self.progress_delay).await;
            }
            self.progress
                .lock()
                .unwrap()
                .get_mut(task_id)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| {
                    Err(ApiError::Status {
                        status: 503,
                        message: "script exhausted".into(),
                    })
                })
        }

        async fn cancel(&self, _task_id: &str) -> Result<(), ApiError> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn list_tasks(&self) -> Result<Vec<RemoteTask>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn request(url: &str) -> DownloadRequest {
        DownloadRequest {
            url: url.into(),
            quality: "best".into(),
            format: "auto".into(),
        }
    }

    fn progress(status: TaskStatus) -> ProgressSnapshot {
        ProgressSnapshot {
            status,
            ..Default::default()
        }
    }

    struct Harness {
        service: Arc<ScriptedService>,
        history: HistoryStore,
        cmd_tx: UnboundedSender<UiCommand>,
        event_rx: UnboundedReceiver<TaskEvent>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn spawn_controller(service: ScriptedService) -> Harness {
        let service = Arc::new(service);
        let history = HistoryStore::in_memory();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let controller = TaskController::new(
            service.clone(),
            history.clone(),
            event_tx,
            Duration::from_secs(2),
        );
        let handle = tokio::spawn(controller.run(cmd_rx));
        Harness {
            service,
            history,
            cmd_tx,
            event_rx,
            handle,
        }
    }

    /// Collect events until one matches `done`.
    async fn events_until(
        rx: &mut UnboundedReceiver<TaskEvent>,
        done: impl Fn(&TaskEvent) -> bool,
    ) -> Vec<TaskEvent> {
        let mut seen = Vec::new();
        while let Some(ev) = rx.recv().await {
            let stop = done(&ev);
            seen.push(ev);
            if stop {
                break;
            }
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn submit_poll_finish_scenario() {
        let service = ScriptedService::default()
            .accept("t1", Some("Video"))
            .then(
                "t1",
                Ok(ProgressSnapshot {
                    status: TaskStatus::Downloading,
                    percent: Some(42.37),
                    ..Default::default()
                }),
            )
            .then(
                "t1",
                Ok(ProgressSnapshot {
                    status: TaskStatus::Finished,
                    filename: Some("v1.mp4".into()),
                    filesize: Some(10_485_760),
                    ..Default::default()
                }),
            );
        let mut h = spawn_controller(service);
        let mut state = ViewState {
            input: "https://example.com/v/1".into(),
            busy: true,
            ..Default::default()
        };

        h.cmd_tx
            .send(UiCommand::Start(request("https://example.com/v/1")))
            .unwrap();

        let evs = events_until(&mut h.event_rx, |ev| {
            matches!(ev, TaskEvent::HistoryUpdated(_))
        })
        .await;
        for ev in evs {
            view::apply_event(&mut state, ev);
        }
        assert_eq!(state.status().unwrap().title, "Video");
        let log = h.history.read_all();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id, "t1");
        assert_eq!(log[0].url, "https://example.com/v/1");

        let evs = events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::Progress(_))).await;
        for ev in evs {
            view::apply_event(&mut state, ev);
        }
        assert_eq!(state.status().unwrap().percent_text, "42.4%");

        let evs = events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::InputReset)).await;
        for ev in evs {
            view::apply_event(&mut state, ev);
        }
        let success = state.success().unwrap();
        assert!(success.lines.contains(&"File size: 10.00 MB".to_string()));
        assert!(success.lines.contains(&"File name: v1.mp4".to_string()));
        assert!(!state.busy);
        assert!(state.input.is_empty());

        let calls = h.service.progress_calls();
        assert_eq!(calls, 2);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.service.progress_calls(), calls);
        assert!(h.event_rx.try_recv().is_err());

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_submission_never_polls() {
        let service = ScriptedService::default().reject("invalid url");
        let mut h = spawn_controller(service);
        let mut state = ViewState {
            busy: true,
            ..Default::default()
        };

        h.cmd_tx
            .send(UiCommand::Start(request("https://example.com/bad")))
            .unwrap();
        let evs = events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::Busy(false))).await;
        for ev in evs {
            view::apply_event(&mut state, ev);
        }

        assert_eq!(state.error(), Some("invalid url"));
        assert!(!state.busy);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.service.progress_calls(), 0);
        assert!(h.history.read_all().is_empty());

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_failure_keeps_loop_alive() {
        let service = ScriptedService::default()
            .accept("t1", None)
            .then(
                "t1",
                Err(ApiError::Status {
                    status: 502,
                    message: "bad gateway".into(),
                }),
            )
            .then(
                "t1",
                Ok(ProgressSnapshot {
                    status: TaskStatus::Downloading,
                    percent: Some(10.0),
                    ..Default::default()
                }),
            );
        let mut h = spawn_controller(service);

        h.cmd_tx
            .send(UiCommand::Start(request("https://example.com/v/2")))
            .unwrap();
        let evs = events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::Progress(_))).await;

        assert!(!evs.iter().any(|ev| matches!(ev, TaskEvent::Failed { .. })));
        let TaskEvent::Progress(last) = evs.last().unwrap() else {
            panic!("expected progress");
        };
        assert_eq!(last.percent, Some(10.0));
        assert_eq!(h.service.progress_calls(), 2);

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn remote_error_uses_message_or_fallback() {
        let service = ScriptedService::default()
            .accept("t1", None)
            .then("t1", Ok(progress(TaskStatus::Error)));
        let mut h = spawn_controller(service);

        h.cmd_tx
            .send(UiCommand::Start(request("https://example.com/v/3")))
            .unwrap();
        let evs = events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::Busy(false))).await;
        assert!(evs.contains(&TaskEvent::Failed {
            message: GENERIC_TASK_ERROR.into()
        }));
        assert!(!evs.contains(&TaskEvent::InputReset));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.service.progress_calls(), 1);

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn remote_error_message_is_shown() {
        let service = ScriptedService::default().accept("t1", None).then(
            "t1",
            Ok(ProgressSnapshot {
                status: TaskStatus::Error,
                error: Some("unsupported site".into()),
                ..Default::default()
            }),
        );
        let mut h = spawn_controller(service);

        h.cmd_tx
            .send(UiCommand::Start(request("https://example.com/v/4")))
            .unwrap();
        let evs = events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::Busy(false))).await;
        assert!(evs.contains(&TaskEvent::Failed {
            message: "unsupported site".into()
        }));

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_keeps_polling() {
        let service = ScriptedService::default()
            .accept("t1", None)
            .then("t1", Ok(progress(TaskStatus::Other("queued".into()))))
            .then("t1", Ok(progress(TaskStatus::Finished)));
        let mut h = spawn_controller(service);

        h.cmd_tx
            .send(UiCommand::Start(request("https://example.com/v/5")))
            .unwrap();
        let evs = events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::Finished(_))).await;
        assert!(evs.contains(&TaskEvent::Progress(progress(TaskStatus::Other(
            "queued".into()
        )))));

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_task_results_are_discarded() {
        let service = ScriptedService {
            progress_delay: Duration::from_secs(1),
            ..Default::default()
        }
        .accept("t1", None)
        .accept("t2", None)
        .then("t1", Ok(progress(TaskStatus::Finished)))
        .then(
            "t2",
            Ok(ProgressSnapshot {
                status: TaskStatus::Downloading,
                percent: Some(55.0),
                ..Default::default()
            }),
        );
        let mut h = spawn_controller(service);

        h.cmd_tx
            .send(UiCommand::Start(request("https://example.com/a")))
            .unwrap();
        h.cmd_tx
            .send(UiCommand::Start(request("https://example.com/b")))
            .unwrap();

        let evs = events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::Progress(_))).await;
        assert!(!evs.iter().any(|ev| matches!(ev, TaskEvent::Finished(_))));
        let TaskEvent::Progress(last) = evs.last().unwrap() else {
            panic!("expected progress");
        };
        assert_eq!(last.percent, Some(55.0));

        let log = h.history.read_all();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, "t2");

        tokio::time::sleep(Duration::from_secs(5)).await;
        while let Ok(ev) = h.event_rx.try_recv() {
            assert!(!matches!(ev, TaskEvent::Finished(_)));
        }

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_polling_and_notifies_service() {
        let service = ScriptedService::default()
            .accept("t1", None)
            .then("t1", Ok(progress(TaskStatus::Downloading)));
        let mut h = spawn_controller(service);

        h.cmd_tx
            .send(UiCommand::Start(request("https://example.com/v/6")))
            .unwrap();
        events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::Progress(_))).await;

        h.cmd_tx.send(UiCommand::Cancel).unwrap();
        let evs = events_until(&mut h.event_rx, |ev| matches!(ev, TaskEvent::Busy(false))).await;
        assert!(evs
            .iter()
            .any(|ev| matches!(ev, TaskEvent::Info(msg) if msg.contains("t1"))));
        assert_eq!(h.service.cancel_calls.load(Ordering::SeqCst), 1);

        let calls = h.service.progress_calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.service.progress_calls(), calls);

        h.cmd_tx.send(UiCommand::Quit).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut controller = TaskController::new(
            Arc::new(ScriptedService::default().accept("t1", None)),
            HistoryStore::in_memory(),
            event_tx,
            Duration::from_secs(2),
        );

        controller.stop();
        controller.stop();
        assert_eq!(controller.phase(), ControllerPhase::Idle);
        assert!(!controller.is_polling());
        assert!(event_rx.try_recv().is_err());

        controller
            .start(request("https://example.com/v/7"))
            .await
            .unwrap();
        assert_eq!(controller.phase(), ControllerPhase::Polling);
        assert!(controller.is_polling());

        controller.stop();
        controller.stop();
        assert_eq!(controller.phase(), ControllerPhase::Idle);
        assert!(!controller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_reports_phase() {
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let mut controller = TaskController::new(
            Arc::new(ScriptedService::default().reject("nope")),
            HistoryStore::in_memory(),
            event_tx,
            Duration::from_secs(2),
        );

        let err = controller
            .start(request("https://example.com/v/8"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "nope");
        assert_eq!(controller.phase(), ControllerPhase::Failed);
        assert!(!controller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_command_sender_tears_down() {
        let h = spawn_controller(ScriptedService::default());
        drop(h.cmd_tx);
        h.handle.await.unwrap();
    }

    /// Records the thread every write lands on.
    #[derive(Default)]
    struct ThreadRecordingStore {
        inner: MemoryStore,
        writers: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl KeyValueStore for ThreadRecordingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.writers.lock().unwrap().push(std::thread::current().id());
            self.inner.set(key, value)
        }
    }

    #[tokio::test]
    async fn history_is_written_off_the_controller_thread() {
        let store = Arc::new(ThreadRecordingStore::default());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut controller = TaskController::new(
            Arc::new(ScriptedService::default().accept("t1", None)),
            HistoryStore::new(store.clone()),
            event_tx,
            Duration::from_secs(2),
        );

        controller
            .start(request("https://example.com/v/9"))
            .await
            .unwrap();

        let writers = store.writers.lock().unwrap().clone();
        assert_eq!(writers.len(), 1);
        assert_ne!(writers[0], std::thread::current().id());

        let mut saw_history = false;
        while let Ok(ev) = event_rx.try_recv() {
            if let TaskEvent::HistoryUpdated(log) = ev {
                assert_eq!(log[0].id, "t1");
                saw_history = true;
            }
        }
        assert!(saw_history);
    }
}
