pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
    Frame,
};
use setwise::{
    clock::Clock,
    session::{RunningState, SessionView},
    store::KvStore,
    util::{format_clock, format_load},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

pub fn draw<S: KvStore, C: Clock>(app: &App<S, C>, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);
}

/// Cut `text` so it occupies at most `max` terminal columns
fn fit_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn set_markers(view: &SessionView<'_>) -> Line<'static> {
    let done = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let current = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let pending = Style::default().add_modifier(Modifier::DIM);

    let spans: Vec<Span<'static>> = (1..=view.set_count)
        .flat_map(|n| {
            let marker = if view.completed_sets.contains(&n) {
                Span::styled("●", done)
            } else if n == view.current_set && view.state != RunningState::Finished {
                Span::styled("◉", current)
            } else {
                Span::styled("○", pending)
            };
            [marker, Span::raw(" ")]
        })
        .collect();
    Line::from(spans)
}

fn status_line(view: &SessionView<'_>) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match view.state {
        RunningState::Idle if view.resumed => Line::from(Span::styled(
            "Resumed from saved progress. Press space to continue",
            bold.fg(Color::Cyan),
        )),
        RunningState::Idle => Line::from(Span::styled("Press space to start", bold.fg(Color::Cyan))),
        RunningState::Active => Line::from(Span::styled(
            format!("Set {} of {}: go!", view.current_set, view.set_count),
            bold.fg(Color::Green),
        )),
        RunningState::Resting => Line::from(vec![
            Span::styled("REST ", bold.fg(Color::Magenta)),
            Span::styled(format_clock(view.rest_remaining as u64), bold),
        ]),
        RunningState::RestingPaused => Line::from(vec![
            Span::styled("REST (paused) ", bold.fg(Color::Yellow)),
            Span::styled(format_clock(view.rest_remaining as u64), bold),
        ]),
        RunningState::Finished => {
            Line::from(Span::styled("Workout complete", bold.fg(Color::Green)))
        }
    }
}

fn key_hints(state: RunningState) -> &'static str {
    match state {
        RunningState::Idle => "(space) start  (n)ext exercise  (r)eset  (?) help  (q)uit",
        RunningState::Active => "(space) set done  (n)ext exercise  (r)eset  (?) help  (q)uit",
        RunningState::Resting | RunningState::RestingPaused => {
            "(space/s) skip rest  (p)ause  (n)ext exercise  (r)eset  (q)uit"
        }
        RunningState::Finished => "(r)eset  (q)uit",
    }
}

impl<S: KvStore, C: Clock> Widget for &App<S, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let view = self.session.view();
        let exercise = view.exercise;
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim = Style::default().add_modifier(Modifier::DIM);
        let inner_width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2) as usize;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2), // workout / progress header
                Constraint::Min(6),    // exercise card
                Constraint::Length(3), // status and rest gauge
                Constraint::Length(1), // key hints
            ])
            .split(area);

        let header = Paragraph::new(vec![
            Line::from(Span::styled(view.workout_name.to_string(), bold)),
            Line::from(Span::styled(
                format!(
                    "Exercise {} of {}",
                    view.exercise_index + 1,
                    view.exercise_count
                ),
                dim,
            )),
        ])
        .alignment(Alignment::Center);
        header.render(chunks[0], buf);

        let mut card = vec![
            Line::from(Span::styled(
                exercise.name.clone(),
                bold.fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
            )),
            Line::from(Span::styled(exercise.muscle.clone(), dim)),
            Line::from(""),
            Line::from(format!(
                "{} sets x {} reps @ {}   rest {}",
                exercise.sets,
                exercise.reps,
                format_load(exercise.load_kg),
                format_clock(exercise.rest_secs as u64)
            )),
            Line::from(""),
            set_markers(&view),
        ];
        if let Some(instructions) = &exercise.instructions {
            card.push(Line::from(""));
            card.push(Line::from(Span::styled(
                fit_width(instructions, inner_width.saturating_sub(2).max(1) * 2),
                Style::default().add_modifier(Modifier::ITALIC),
            )));
        }
        if let Some(url) = &exercise.video_url {
            card.push(Line::from(Span::styled(
                fit_width(url, inner_width.saturating_sub(2).max(1)),
                dim,
            )));
        }
        if let Some(next) = view.next_exercise {
            card.push(Line::from(""));
            card.push(Line::from(Span::styled(format!("Up next: {}", next.name), dim)));
        }

        Paragraph::new(card)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[1], buf);

        let status_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(2)])
            .split(chunks[2]);

        Paragraph::new(status_line(&view))
            .alignment(Alignment::Center)
            .render(status_chunks[0], buf);

        if view.state.is_resting() && exercise_rest(&view) > 0 {
            let total = exercise_rest(&view) as f64;
            let ratio = (view.rest_remaining as f64 / total).clamp(0.0, 1.0);
            Gauge::default()
                .gauge_style(Style::default().fg(Color::Magenta))
                .ratio(ratio)
                .label("")
                .render(status_chunks[1], buf);
        }

        Paragraph::new(Span::styled(key_hints(view.state), dim.add_modifier(Modifier::ITALIC)))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }
}

/// Rest duration the current countdown was started with
fn exercise_rest(view: &SessionView<'_>) -> u32 {
    view.exercise.rest_secs.max(view.rest_remaining)
}

pub fn render_summary<S: KvStore, C: Clock>(app: &App<S, C>, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let workout = app.session.workout();

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} complete", workout.name),
            bold.fg(Color::Green),
        )),
        Line::from(""),
    ];

    match app.session.summary() {
        Some(summary) => {
            lines.push(Line::from(format!(
                "time {}   sets {}   skipped exercises {}",
                format_clock(summary.elapsed_secs() as u64),
                summary.sets_completed,
                summary.exercises_skipped
            )));
            if let Some(count) = app.week_count {
                lines.push(Line::from(format!(
                    "{count} workout(s) finished in {}",
                    summary.week
                )));
            }
            if let Some(streak) = app.streak {
                lines.push(Line::from(Span::styled(
                    format!("weekly streak: {streak}"),
                    bold.fg(Color::Yellow),
                )));
            }
        }
        None => lines.push(Line::from("Already finished this week.")),
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        key_hints(RunningState::Finished),
        dim.add_modifier(Modifier::ITALIC),
    )));

    let vertical_pad = area.height.saturating_sub(lines.len() as u16) / 2;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(vertical_pad), Constraint::Min(0)])
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);
}

pub fn render_help(area: Rect, buf: &mut Buffer) {
    let rows = [
        ("space / enter", "start, finish the current set, or end the rest early"),
        ("s", "skip the rest period"),
        ("p", "pause or resume the rest countdown"),
        ("n", "skip to the next exercise"),
        ("r", "reset this week's progress"),
        ("q / esc", "quit (progress is kept)"),
    ];
    let lines: Vec<Line> = rows
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(
                    format!("{key:>14}  "),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
                Span::raw(*what),
            ])
        })
        .collect();

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Keys (any key to close)"))
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_width() {
        assert_eq!(fit_width("short", 10), "short");
        assert_eq!(fit_width("a longer line", 6), "a lon…");
        assert_eq!(fit_width("ｗｉｄｅ", 5), "ｗｉ…");
    }
}
