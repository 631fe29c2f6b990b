use crate::pipeline::transport::PlayState;
use crate::shared::DisplayState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use super::grid::draw_step_grid;
use super::mode::TuiState;

const HELP: &str = "space play/pause  . stop  , rewind  arrows move  enter toggle  del clear  [ ] sound  \
m mute  -/= vol  n name  t/T tempo  w/W swing  v/V master  o/O out  a/x/c track  p/tab/1-9 pattern  \
b rec  r mic  B beats  { } P D beat  R restart audio  S save  q quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState, blink_on: bool) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // transport line
            Constraint::Min(6), // step grid
            Constraint::Length(4), // sound palette
            Constraint::Length(3), // status + help
        ])
        .split(area);

    draw_transport(frame, sections[0], state, blink_on);
    draw_step_grid(frame, sections[1], state, (ts.cursor_track, ts.cursor_step));
    if state.beats_open {
        draw_beats(frame, sections[2], state);
    } else {
        draw_palette(frame, sections[2], state);
    }
    draw_status(frame, sections[3], state, ts.prompt());
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let (icon, color) = match state.play_state {
        PlayState::Playing => (">", Color::Green),
        PlayState::Paused => ("||", Color::Yellow),
        PlayState::Stopped => ("[]", Color::Gray),
    };
    let mut spans = vec![
        Span::styled(format!(" {icon} "), Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            " {:>3} bpm   swing {:>2}%   master {:>3.0}%   out {:>3.0}%   step {:>2}/16",
            state.tempo,
            state.swing,
            state.master_volume * 100.0,
            state.output_level * 100.0,
            state.current_step + 1,
        )),
    ];
    // blink so it's hard to forget
    let rec_style = if blink_on {
        Style::default().fg(Color::White).bg(Color::Red)
    } else {
        Style::default().fg(Color::Red)
    };
    if state.recording {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(" REC ", rec_style));
    }
    if state.mic_recording {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(" MIC ", rec_style));
    }
    let block = Block::default().borders(Borders::ALL).title(" beatbox ");
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_palette(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let mut spans = Vec::new();
    for (i, name) in state.palette.iter().enumerate() {
        let style = if state.selected_sound == Some(i) {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {name} "), style));
        spans.push(Span::raw(" "));
    }
    let title = match state.selected_name() {
        Some(name) => format!(" sound: {name} "),
        None => " sound: (none, enter clears) ".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block).wrap(Wrap { trim: false }), area);
}

fn draw_beats(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines: Vec<Line> = if state.beats.is_empty() {
        vec![Line::from(Span::styled(
            "no beats recorded yet, press b to record one",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        // keep the selection in view
        let rows = area.height.saturating_sub(2).max(1) as usize;
        let selected = state.selected_beat.unwrap_or(0);
        let first = selected.saturating_sub(rows - 1);
        state
            .beats
            .iter()
            .enumerate()
            .skip(first)
            .take(rows)
            .map(|(i, label)| {
                let style = if state.selected_beat == Some(i) {
                    Style::default().fg(Color::Black).bg(Color::Magenta)
                } else {
                    Style::default().fg(Color::Gray)
                };
                Line::from(Span::styled(format!(" {label} "), style))
            })
            .collect()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" beats ({}) ", state.beats.len()));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState, prompt: Option<String>) {
    let first = match prompt {
        Some(prompt) => Line::from(Span::styled(prompt, Style::default().fg(Color::Cyan))),
        None => Line::from(Span::styled(state.status.clone(), Style::default().fg(Color::Yellow))),
    };
    let lines = vec![
        first,
        Line::from(Span::styled(HELP, Style::default().fg(Color::DarkGray))),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
}
