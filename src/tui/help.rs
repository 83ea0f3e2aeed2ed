use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(action),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame, data_dir: &str) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key_line("Esc / Ctrl-C", 2, "Quit"),
        key_line("Enter", 9, "Submit the link"),
        key_line("Ctrl-U", 8, "Clear the link"),
        key_line("Ctrl-X", 8, "Cancel the running download"),
        key_line("Ctrl-O", 8, "Show/hide advanced options"),
        key_line("F2", 12, "Cycle quality"),
        key_line("F3", 12, "Cycle format"),
        key_line("Tab", 11, "Switch tabs"),
        key_line("F1", 12, "Show this help"),
        Line::from(""),
        Line::from("History tab:"),
        key_line("↑/↓", 11, "Scroll"),
        Line::from(""),
        Line::from("Data directory (history, log):"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(data_dir.to_string(), Style::default().fg(Color::Cyan)),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
