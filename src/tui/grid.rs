use crate::shared::{DisplayState, STEPS_PER_PATTERN};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

const NAME_WIDTH: usize = 12;

// one line per track: name, volume, then the 16 steps.
// the playing column is lit, the cursor is reversed
pub fn draw_step_grid(frame: &mut Frame, area: Rect, state: &DisplayState, cursor: (usize, usize)) {
    let mut lines = Vec::with_capacity(state.tracks.len() + 1);
    lines.push(header(state));

    for (t, track) in state.tracks.iter().enumerate() {
        let name_style = if track.muted {
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
        } else {
            Style::default().fg(Color::White)
        };
        let mut spans = vec![
            Span::styled(format!("{:<w$.w$}", track.name, w = NAME_WIDTH), name_style),
            Span::styled(format!("{:>4.0}% ", track.volume * 100.0), Style::default().fg(Color::Gray)),
        ];

        for (s, cell) in track.cells.iter().enumerate() {
            let text = match cell {
                Some(label) => format!("{label:<3}"),
                None if s % 4 == 0 => " : ".to_string(),
                None => " . ".to_string(),
            };
            spans.push(Span::styled(text, cell_style(state, track.muted, cell.is_some(), s, (t, s) == cursor)));
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    let title = format!(" pattern {}/{} ", state.pattern + 1, state.num_patterns);
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn header(state: &DisplayState) -> Line<'static> {
    let mut spans = vec![Span::raw(" ".repeat(NAME_WIDTH + 6))];
    for s in 0..STEPS_PER_PATTERN {
        let style = if state.playing() && s == state.current_step as usize {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{:<3} ", s + 1), style));
    }
    Line::from(spans)
}

fn cell_style(state: &DisplayState, muted: bool, filled: bool, step: usize, under_cursor: bool) -> Style {
    let mut style = match (filled, muted) {
        (true, false) => Style::default().fg(Color::Black).bg(Color::Magenta),
        (true, true) => Style::default().fg(Color::Black).bg(Color::DarkGray),
        (false, _) => Style::default().fg(Color::DarkGray),
    };
    if state.playing() && step == state.current_step as usize {
        style = style.bg(if filled { Color::LightMagenta } else { Color::Yellow }).fg(Color::Black);
    }
    if under_cursor {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}
