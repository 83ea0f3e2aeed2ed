use crate::api::{HttpTaskService, TaskService};
use crate::model::{ClientConfig, TaskEvent};
use crate::orchestrator::{self, Submission, TaskController, UiCommand};
use crate::storage::{self, FileStore, HistoryStore};
use crate::view::{self, ViewState};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "savextube-cli",
    version,
    about = "Submit downloads to a SaveXTube server and follow their progress"
)]
pub struct Cli {
    /// Video link to download (pre-fills the input in the TUI)
    pub url: Option<String>,

    /// Base URL of the SaveXTube server
    #[arg(long, default_value = "http://127.0.0.1:8530")]
    pub server: String,

    /// Requested quality (best, 1080p, 720p, ...)
    #[arg(long, default_value = "best")]
    pub quality: String,

    /// Requested container format (auto, mp4, mp3, ...)
    #[arg(long, default_value = "auto")]
    pub format: String,

    /// Delay between progress checks (must be non-zero)
    #[arg(long, default_value = "2s", value_parser = parse_poll_interval)]
    pub poll_interval: humantime::Duration,

    /// Per-request HTTP timeout
    #[arg(long, default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Directory holding the download history and the TUI log
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Print progress lines and exit when the download ends (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Print the final progress snapshot as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print the local download history and exit
    #[arg(long)]
    pub history: bool,

    /// List the tasks the server currently knows about and exit
    #[arg(long)]
    pub tasks: bool,

    /// Ask the server to cancel a task and exit
    #[arg(long, value_name = "ID")]
    pub cancel: Option<String>,
}

fn parse_poll_interval(raw: &str) -> Result<humantime::Duration, String> {
    let interval: humantime::Duration = raw.parse().map_err(|e| format!("{e}"))?;
    if Duration::from(interval).is_zero() {
        return Err("poll interval must be greater than zero".to_string());
    }
    Ok(interval)
}

impl Cli {
    /// Whether this invocation prints to the terminal instead of drawing the TUI.
    pub fn is_non_tui(&self) -> bool {
        self.text
            || self.json
            || self.history
            || self.tasks
            || self.cancel.is_some()
            || cfg!(not(feature = "tui"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(storage::default_data_dir)
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.text && args.json {
        return Err(anyhow::anyhow!("--text and --json cannot be used together"));
    }

    if args.history {
        return print_history(&args).await;
    }
    if args.tasks {
        return list_tasks(&args).await;
    }
    if let Some(id) = args.cancel.as_deref() {
        return cancel_task(&args, id).await;
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_single(args, false).await;
        }
    }

    let json = args.json;
    run_single(args, json).await
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ClientConfig {
    ClientConfig {
        base_url: args.server.clone(),
        quality: args.quality.clone(),
        format: args.format.clone(),
        poll_interval: Duration::from(args.poll_interval),
        request_timeout: Duration::from(args.timeout),
        user_agent: format!("savextube-cli/{}", env!("CARGO_PKG_VERSION")),
        data_dir: args.data_dir(),
    }
}

/// File-backed history, or a session-only one when the data directory is unusable.
pub fn open_history(cfg: &ClientConfig) -> HistoryStore {
    if let Err(e) = std::fs::create_dir_all(&cfg.data_dir) {
        tracing::warn!(
            dir = %cfg.data_dir.display(),
            error = %e,
            "data directory unavailable, history will not be kept"
        );
        return HistoryStore::in_memory();
    }
    HistoryStore::new(Arc::new(FileStore::new(cfg.data_dir.clone())))
}

async fn print_history(args: &Cli) -> Result<()> {
    let cfg = build_config(args);
    let store = FileStore::new(cfg.data_dir.clone());
    let history = HistoryStore::new(Arc::new(store.clone()));
    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(OutputLine::Stderr(format!(
        "History: {}",
        store.dir().join(format!("{}.json", storage::HISTORY_KEY)).display()
    )));
    for line in view::history_lines(&view::render_history(&history.read_all())) {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn list_tasks(args: &Cli) -> Result<()> {
    let cfg = build_config(args);
    let service = HttpTaskService::new(&cfg).context("failed to build HTTP client")?;
    let tasks = service
        .list_tasks()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("failed to list tasks")?;

    let (out_tx, out_handle) = spawn_output_writer();
    if args.json {
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&tasks)?));
    } else if tasks.is_empty() {
        let _ = out_tx.send(OutputLine::Stderr("No tasks on the server".to_string()));
    } else {
        let active = tasks
            .iter()
            .filter(|t| !t.progress.status.is_terminal())
            .count();
        let _ = out_tx.send(OutputLine::Stderr(format!(
            "{} task(s), {active} active",
            tasks.len()
        )));
        for task in &tasks {
            let p = &task.progress;
            let _ = out_tx.send(OutputLine::Stdout(format!(
                "{}  {:<12} {:>6}  {}",
                task.task_id,
                crate::format::status_label(&p.status),
                crate::format::format_percent(crate::format::clamp_percent(
                    p.percent.unwrap_or(0.0)
                )),
                p.title.as_deref().unwrap_or(&task.url),
            )));
        }
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn cancel_task(args: &Cli, id: &str) -> Result<()> {
    let cfg = build_config(args);
    let service = HttpTaskService::new(&cfg).context("failed to build HTTP client")?;
    service
        .cancel(id)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .with_context(|| format!("failed to cancel task {id}"))?;
    eprintln!("Cancelled task {id}");
    Ok(())
}

/// Anything but a sent command means nothing will be downloaded.
fn submission_result(outcome: Submission) -> Result<()> {
    match outcome {
        Submission::Sent => Ok(()),
        Submission::Invalid(message) => Err(anyhow::anyhow!(message)),
        Submission::Busy => Err(anyhow::anyhow!("a download is already running")),
        Submission::ControllerGone => Err(anyhow::anyhow!("controller is not running")),
    }
}

/// Submit one download, follow it to the end, then exit.
/// `json` prints the final snapshot instead of the success panel.
async fn run_single(args: Cli, json: bool) -> Result<()> {
    let cfg = build_config(&args);
    let url = args
        .url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("a URL is required with --text or --json"))?;

    let service: Arc<dyn TaskService> =
        Arc::new(HttpTaskService::new(&cfg).context("failed to build HTTP client")?);
    let history = open_history(&cfg);

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<TaskEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let controller = TaskController::new(service, history, evt_tx, cfg.poll_interval);
    let handle = tokio::spawn(controller.run(cmd_rx));

    let mut state = ViewState {
        quality: cfg.quality.clone(),
        format: cfg.format.clone(),
        ..Default::default()
    };
    let quality = state.quality.clone();
    let format = state.format.clone();
    let submitted =
        orchestrator::submit(&mut state, &cmd_tx, &url, Some(&quality), Some(&format));
    if let Err(e) = submission_result(submitted) {
        let _ = cmd_tx.send(UiCommand::Quit);
        let _ = handle.await;
        return Err(e);
    }

    let mut outcome: Result<()> = Ok(());
    let mut last_line = String::new();
    loop {
        let ev = tokio::select! {
            ev = evt_rx.recv() => ev,
            _ = tokio::signal::ctrl_c() => {
                let _ = cmd_tx.send(UiCommand::Cancel);
                outcome = Err(anyhow::anyhow!("interrupted"));
                break;
            }
        };
        let Some(ev) = ev else { break };

        let done = match &ev {
            TaskEvent::Submitted { task_id, .. } => {
                let _ = out_tx.send(OutputLine::Stderr(format!("Task: {task_id}")));
                false
            }
            TaskEvent::Finished(snapshot) if json => {
                let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(snapshot)?));
                true
            }
            TaskEvent::Finished(_) => true,
            TaskEvent::Failed { message } => {
                outcome = Err(anyhow::anyhow!(message.clone()));
                true
            }
            TaskEvent::Info(message) => {
                let _ = out_tx.send(OutputLine::Stderr(message.clone()));
                false
            }
            _ => false,
        };

        view::apply_event(&mut state, ev);

        if state.status().is_some() {
            if let Some(line) = view::panel_lines(&state).into_iter().next() {
                if line != last_line {
                    let _ = out_tx.send(OutputLine::Stderr(line.clone()));
                    last_line = line;
                }
            }
        }
        if done {
            if !json && state.success().is_some() {
                for line in view::panel_lines(&state) {
                    let _ = out_tx.send(OutputLine::Stdout(line));
                }
            }
            break;
        }
    }

    let _ = cmd_tx.send(UiCommand::Quit);
    handle.await.context("controller task failed")?;
    drop(out_tx);
    let _ = out_handle.await;
    outcome
}
