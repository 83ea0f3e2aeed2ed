mod help;
mod state;

use crate::api::{HttpTaskService, TaskService};
use crate::cli::Cli;
use crate::model::TaskEvent;
use crate::orchestrator::{TaskController, UiCommand};
use crate::view::{self, HistoryView, Panel, StatusPanel, SuccessPanel, ViewState};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{push_wrapped_status_kv, KeyOutcome, UiState, TAB_DOWNLOAD, TAB_HISTORY};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    let cfg = crate::cli::build_config(&args);
    let service: Arc<dyn TaskService> =
        Arc::new(HttpTaskService::new(&cfg).context("failed to build HTTP client")?);
    let history = crate::cli::open_history(&cfg);

    // Unbounded channels avoid backpressure between the UI thread and the controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<TaskEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let mut initial = ViewState {
        input: args.url.clone().unwrap_or_default(),
        quality: cfg.quality.clone(),
        format: cfg.format.clone(),
        ..Default::default()
    };
    initial.set_history(&history.read_all());
    let mut ui_state = UiState::new(cfg.base_url.clone(), initial);
    ui_state.data_dir = cfg.data_dir.display().to_string();

    let controller = TaskController::new(service, history, event_tx, cfg.poll_interval);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(ui_state, event_rx, cmd_tx));

    // Returns once the UI sends Quit or drops its sender.
    controller.run(cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }
    Ok(())
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut event_rx: UnboundedReceiver<TaskEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            match &ev {
                TaskEvent::Submitted { task_id, .. } => {
                    state.view.info = format!("Task {task_id} accepted");
                }
                TaskEvent::Finished(_) => state.view.info = "Download complete".into(),
                TaskEvent::Failed { .. } => state.view.info.clear(),
                _ => {}
            }
            view::apply_event(&mut state.view, ev);
            dirty = true;
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                dirty = true;
                if state.on_key(k, &cmd_tx) == KeyOutcome::Quit {
                    break;
                }
            }
        }
    }

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    Ok(())
}

fn status_color(label: &str) -> Color {
    match label {
        "Finished" => Color::Green,
        "Failed" => Color::Red,
        "Downloading" | "Processing" => Color::Yellow,
        _ => Color::Gray,
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Download"),
        Line::from("History"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("savextube-cli ({})", state.server)),
    )
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_DOWNLOAD => draw_download(chunks[1], f, state),
        TAB_HISTORY => draw_history(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f, &state.data_dir),
    }
}

fn draw_download(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let v = &state.view;
    let options_height = if v.show_options { 3 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(options_height),
                Constraint::Min(0),
                Constraint::Length(4),
            ]
            .as_ref(),
        )
        .split(area);

    let input_title = if v.busy {
        "Video link (working...)"
    } else {
        "Video link"
    };
    let input_style = if v.busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    let input = Paragraph::new(Span::styled(v.input.as_str(), input_style))
        .block(Block::default().borders(Borders::ALL).title(input_title));
    f.render_widget(input, rows[0]);
    if !v.busy {
        let width = rows[0].width.saturating_sub(2);
        let col = (v.input.chars().count() as u16).min(width.saturating_sub(1));
        f.set_cursor_position(Position::new(rows[0].x + 1 + col, rows[0].y + 1));
    }

    if v.show_options {
        let options = Paragraph::new(Line::from(vec![
            Span::styled("Quality: ", Style::default().fg(Color::Gray)),
            Span::styled(v.quality.as_str(), Style::default().fg(Color::Cyan)),
            Span::raw("   "),
            Span::styled("Format: ", Style::default().fg(Color::Gray)),
            Span::styled(v.format.as_str(), Style::default().fg(Color::Cyan)),
            Span::raw("   (F2 / F3 to change)"),
        ]))
        .block(Block::default().borders(Borders::ALL).title("Advanced options"));
        f.render_widget(options, rows[1]);
    }

    match &v.panel {
        Panel::Hidden => {
            let hint = Paragraph::new(Line::from(Span::styled(
                "Paste a link and press Enter.",
                Style::default().fg(Color::Gray),
            )))
            .block(Block::default().borders(Borders::ALL));
            f.render_widget(hint, rows[2]);
        }
        Panel::Status(p) => draw_status_panel(rows[2], f, p, v.task_id.as_deref()),
        Panel::Error(message) => {
            let p = Paragraph::new(Line::from(Span::styled(
                message.as_str(),
                Style::default().fg(Color::Red),
            )))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red))
                    .title("Error"),
            );
            f.render_widget(p, rows[2]);
        }
        Panel::Success(p) => draw_success_panel(rows[2], f, p),
    }

    let footer = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Info: ", Style::default().fg(Color::Gray)),
            Span::raw(v.info.as_str()),
        ]),
        Line::from("Keys: Enter submit | Ctrl-X cancel | Ctrl-O options | Tab switch | Esc quit"),
    ])
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, rows[3]);
}

fn draw_status_panel(
    area: Rect,
    f: &mut ratatui::Frame,
    p: &StatusPanel,
    task_id: Option<&str>,
) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(p.title.as_str()))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(p.ratio.clamp(0.0, 1.0))
        .label(p.percent_text.as_str());
    f.render_widget(gauge, parts[0]);

    let details = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::styled(p.status.as_str(), Style::default().fg(status_color(&p.status))),
        ]),
        Line::from(vec![
            Span::styled("Speed: ", Style::default().fg(Color::Gray)),
            Span::raw(p.speed.as_str()),
            Span::raw("   "),
            Span::styled("ETA: ", Style::default().fg(Color::Gray)),
            Span::raw(p.eta.as_str()),
        ]),
        Line::from(vec![
            Span::styled("Task: ", Style::default().fg(Color::Gray)),
            Span::raw(task_id.unwrap_or("-")),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Progress"));
    f.render_widget(details, parts[1]);
}

fn draw_success_panel(area: Rect, f: &mut ratatui::Frame, p: &SuccessPanel) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    if let Some(title) = &p.title {
        lines.push(Line::from(Span::styled(
            title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }
    for detail in &p.lines {
        match detail.split_once(": ") {
            Some((label, value)) => push_wrapped_status_kv(&mut lines, label, value, area.width),
            None => lines.push(Line::from(detail.clone())),
        }
    }
    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title("Download complete"),
    );
    f.render_widget(panel, area);
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines: Vec<Line> = Vec::new();
    match &state.view.history {
        HistoryView::Empty(placeholder) => {
            lines.push(Line::from(Span::styled(
                *placeholder,
                Style::default().fg(Color::Gray),
            )));
        }
        HistoryView::Cards(cards) => {
            // Each card takes two rows plus a spacer.
            let max_items = (area.height.saturating_sub(2) as usize / 3).max(1);
            for card in cards
                .iter()
                .skip(state.history_scroll_offset)
                .take(max_items)
            {
                lines.push(Line::from(card.url.as_str()));
                lines.push(Line::from(vec![
                    Span::styled(card.time.as_str(), Style::default().fg(Color::Gray)),
                    Span::raw("  "),
                    Span::styled(
                        card.status.as_str(),
                        Style::default().fg(status_color(&card.status)),
                    ),
                ]));
                lines.push(Line::from(""));
            }
        }
    }

    let count = match &state.view.history {
        HistoryView::Empty(_) => 0,
        HistoryView::Cards(cards) => cards.len(),
    };
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("History ({count}) - ↑/↓: scroll")),
    );
    f.render_widget(p, area);
}
