use crate::orchestrator::{self, Submission, UiCommand};
use crate::view::{HistoryView, ViewState};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use tokio::sync::mpsc::UnboundedSender;

pub const QUALITY_CHOICES: &[&str] = &["best", "1080p", "720p", "480p"];
pub const FORMAT_CHOICES: &[&str] = &["auto", "mp4", "mp3"];

pub const TAB_DOWNLOAD: usize = 0;
pub const TAB_HISTORY: usize = 1;
pub const TAB_HELP: usize = 2;
const TAB_COUNT: usize = 3;

pub struct UiState {
    pub tab: usize,
    pub view: ViewState,
    pub server: String,
    pub data_dir: String,
    pub history_scroll_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

/// Next entry after `current` in `choices`, wrapping. Unknown values restart at the first.
fn cycle(choices: &[&str], current: &str) -> String {
    let next = choices
        .iter()
        .position(|c| *c == current)
        .map(|i| (i + 1) % choices.len())
        .unwrap_or(0);
    choices[next].to_string()
}

impl UiState {
    pub fn new(server: String, view: ViewState) -> Self {
        Self {
            tab: TAB_DOWNLOAD,
            view,
            server,
            data_dir: String::new(),
            history_scroll_offset: 0,
        }
    }

    fn history_len(&self) -> usize {
        match &self.view.history {
            HistoryView::Empty(_) => 0,
            HistoryView::Cards(cards) => cards.len(),
        }
    }

    fn submit(&mut self, cmd_tx: &UnboundedSender<UiCommand>) {
        let input = self.view.input.clone();
        let quality = self.view.quality.clone();
        let format = self.view.format.clone();
        match orchestrator::submit(
            &mut self.view,
            cmd_tx,
            &input,
            Some(&quality),
            Some(&format),
        ) {
            Submission::Sent => self.view.info = "Submitting...".into(),
            Submission::Busy => self.view.info = "A download is already running".into(),
            Submission::Invalid(_) | Submission::ControllerGone => {}
        }
    }

    pub fn on_key(&mut self, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) -> KeyOutcome {
        match (k.modifiers, k.code) {
            (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                let _ = cmd_tx.send(UiCommand::Quit);
                return KeyOutcome::Quit;
            }
            (_, KeyCode::Tab) => {
                self.tab = (self.tab + 1) % TAB_COUNT;
                if self.tab == TAB_HISTORY {
                    self.history_scroll_offset = 0;
                }
            }
            (_, KeyCode::F(1)) => self.tab = TAB_HELP,
            (KeyModifiers::CONTROL, KeyCode::Char('o')) => {
                self.view.show_options = !self.view.show_options;
            }
            (_, KeyCode::F(2)) => {
                self.view.show_options = true;
                self.view.quality = cycle(QUALITY_CHOICES, &self.view.quality);
            }
            (_, KeyCode::F(3)) => {
                self.view.show_options = true;
                self.view.format = cycle(FORMAT_CHOICES, &self.view.format);
            }
            (KeyModifiers::CONTROL, KeyCode::Char('x')) => {
                if self.view.busy {
                    let _ = cmd_tx.send(UiCommand::Cancel);
                    self.view.info = "Cancelling...".into();
                } else {
                    self.view.info = "Nothing to cancel".into();
                }
            }
            (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
                if !self.view.busy {
                    self.view.input.clear();
                }
            }
            (_, KeyCode::Up) => {
                if self.tab == TAB_HISTORY {
                    self.history_scroll_offset = self.history_scroll_offset.saturating_sub(1);
                }
            }
            (_, KeyCode::Down) => {
                if self.tab == TAB_HISTORY && self.history_scroll_offset + 1 < self.history_len()
                {
                    self.history_scroll_offset += 1;
                }
            }
            (_, KeyCode::Enter) => {
                if self.tab == TAB_DOWNLOAD {
                    self.submit(cmd_tx);
                }
            }
            (_, KeyCode::Backspace) => {
                if self.tab == TAB_DOWNLOAD && !self.view.busy {
                    self.view.input.pop();
                }
            }
            (m, KeyCode::Char(c))
                if !m.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                if self.tab == TAB_DOWNLOAD && !self.view.busy {
                    self.view.input.push(c);
                }
            }
            _ => {}
        }
        KeyOutcome::Continue
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}
