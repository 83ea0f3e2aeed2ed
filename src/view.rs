//! Presentation state shared by the TUI and the text writer.
//!
//! `apply_event` is the only place controller events turn into visible state. It holds
//! no business rules: it projects whatever the controller reports.

use crate::format;
use crate::model::{HistoryEntry, ProgressSnapshot, TaskEvent};

pub const DEFAULT_TITLE: &str = "Preparing download...";
pub const IN_PROGRESS_TITLE: &str = "Downloading...";
pub const EMPTY_HISTORY: &str = "No download history yet";

#[derive(Debug, Clone, PartialEq)]
pub struct StatusPanel {
    pub title: String,
    pub status: String,
    pub percent_text: String,
    /// 0.0..=1.0, for gauges.
    pub ratio: f64,
    pub speed: String,
    pub eta: String,
}

impl StatusPanel {
    fn submitted(title: Option<String>) -> Self {
        Self {
            title: title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            status: "Preparing".to_string(),
            percent_text: format::format_percent(0.0),
            ratio: 0.0,
            speed: format::format_speed(None),
            eta: format::format_eta(None),
        }
    }

    fn apply(&mut self, snapshot: &ProgressSnapshot) {
        self.title = snapshot
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| IN_PROGRESS_TITLE.to_string());
        self.status = format::status_label(&snapshot.status).to_string();
        if let Some(percent) = snapshot.percent {
            let clamped = format::clamp_percent(percent);
            self.percent_text = format::format_percent(clamped);
            self.ratio = clamped / 100.0;
        }
        if snapshot.speed.is_some() {
            self.speed = format::format_speed(snapshot.speed);
        }
        if snapshot.eta.is_some() {
            self.eta = format::format_eta(snapshot.eta);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessPanel {
    pub title: Option<String>,
    pub lines: Vec<String>,
}

impl SuccessPanel {
    pub fn from_snapshot(snapshot: &ProgressSnapshot) -> Self {
        let mut lines = Vec::new();
        let filename = snapshot
            .filename
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or("Unknown");
        lines.push(format!("File name: {filename}"));
        if let Some(size) = snapshot.filesize.filter(|s| *s > 0) {
            lines.push(format!("File size: {}", format::format_filesize(size)));
        }
        if let Some(quality) = snapshot.quality.as_deref().filter(|q| !q.is_empty()) {
            lines.push(format!("Quality: {quality}"));
        }
        let path = snapshot
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or("server download directory");
        lines.push(format!("Saved to: {path}"));
        Self {
            title: snapshot.title.clone().filter(|t| !t.is_empty()),
            lines,
        }
    }
}

/// At most one panel is ever visible.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Panel {
    #[default]
    Hidden,
    Status(StatusPanel),
    Error(String),
    Success(SuccessPanel),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryCard {
    pub url: String,
    pub time: String,
    pub status: String,
}

impl HistoryCard {
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        Self {
            url: format::truncate_url(&entry.url),
            time: format::format_local_timestamp(&entry.time),
            status: format::status_label(&entry.status).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryView {
    Empty(&'static str),
    Cards(Vec<HistoryCard>),
}

pub fn render_history(entries: &[HistoryEntry]) -> HistoryView {
    if entries.is_empty() {
        return HistoryView::Empty(EMPTY_HISTORY);
    }
    HistoryView::Cards(entries.iter().map(HistoryCard::from_entry).collect())
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub panel: Panel,
    pub busy: bool,
    pub input: String,
    pub quality: String,
    pub format: String,
    pub show_options: bool,
    pub task_id: Option<String>,
    pub history: HistoryView,
    pub info: String,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            panel: Panel::Hidden,
            busy: false,
            input: String::new(),
            quality: "best".to_string(),
            format: "auto".to_string(),
            show_options: false,
            task_id: None,
            history: HistoryView::Empty(EMPTY_HISTORY),
            info: String::new(),
        }
    }
}

impl ViewState {
    pub fn clear_panels(&mut self) {
        self.panel = Panel::Hidden;
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.panel = Panel::Error(message.into());
    }

    pub fn set_history(&mut self, entries: &[HistoryEntry]) {
        self.history = render_history(entries);
    }

    pub fn status(&self) -> Option<&StatusPanel> {
        match &self.panel {
            Panel::Status(p) => Some(p),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&str> {
        match &self.panel {
            Panel::Error(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn success(&self) -> Option<&SuccessPanel> {
        match &self.panel {
            Panel::Success(p) => Some(p),
            _ => None,
        }
    }
}

pub fn apply_event(state: &mut ViewState, ev: TaskEvent) {
    match ev {
        TaskEvent::Busy(busy) => state.busy = busy,
        TaskEvent::Submitted { task_id, title } => {
            state.task_id = Some(task_id);
            state.panel = Panel::Status(StatusPanel::submitted(title));
        }
        TaskEvent::Progress(snapshot) => {
            // A progress update re-shows the status panel if something else was up.
            match &mut state.panel {
                Panel::Status(panel) => panel.apply(&snapshot),
                _ => {
                    let mut panel = StatusPanel::submitted(None);
                    panel.apply(&snapshot);
                    state.panel = Panel::Status(panel);
                }
            }
        }
        TaskEvent::Finished(snapshot) => {
            state.panel = Panel::Success(SuccessPanel::from_snapshot(&snapshot));
        }
        TaskEvent::Failed { message } => state.show_error(message),
        TaskEvent::InputReset => state.input.clear(),
        TaskEvent::HistoryUpdated(entries) => state.set_history(&entries),
        TaskEvent::Info(message) => state.info = message,
    }
}

/// Plain-text lines describing the visible panel, for text mode and logs.
pub fn panel_lines(state: &ViewState) -> Vec<String> {
    match &state.panel {
        Panel::Hidden => Vec::new(),
        Panel::Status(p) => vec![format!(
            "{} [{}] {} {} ETA {}",
            p.title, p.status, p.percent_text, p.speed, p.eta
        )],
        Panel::Error(msg) => vec![format!("Error: {msg}")],
        Panel::Success(p) => {
            let mut lines = vec![format!(
                "Download complete{}",
                p.title
                    .as_deref()
                    .map(|t| format!(": {t}"))
                    .unwrap_or_default()
            )];
            lines.extend(p.lines.iter().map(|l| format!("  {l}")));
            lines
        }
    }
}

pub fn history_lines(history: &HistoryView) -> Vec<String> {
    match history {
        HistoryView::Empty(placeholder) => vec![placeholder.to_string()],
        HistoryView::Cards(cards) => cards
            .iter()
            .map(|c| format!("{}  {:<12} {}", c.time, c.status, c.url))
            .collect(),
    }
}
