use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::events::GameStateUpdate;
use crate::stats::WpmSample;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Compute X (seconds) and Y (WPM) bounds for the results chart
fn chart_bounds(series: &[WpmSample]) -> (f64, f64) {
    let highest_wpm = series.iter().map(|p| p.wpm).fold(0.0, f64::max);
    let overall_duration = series.last().map_or(1.0, |p| p.seconds).max(1.0);
    (overall_duration, highest_wpm.round())
}

fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}

/// Live typing screen fed from the latest state-update snapshot
pub struct DashboardView<'a> {
    pub state: &'a GameStateUpdate,
}

impl DashboardView<'_> {
    fn prompt_spans(&self) -> Vec<Span<'static>> {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let green_bold = bold.fg(Color::Green);
        let red_bold = bold.fg(Color::Red);
        let dim_bold = bold.add_modifier(Modifier::DIM);
        let cursor_style = dim_bold.add_modifier(Modifier::UNDERLINED);

        let target: Vec<char> = self.state.target_text.chars().collect();
        let typed: Vec<char> = self.state.user_input.chars().collect();

        let mut spans = Vec::with_capacity(target.len() + 2);
        for (idx, &c) in typed.iter().enumerate() {
            let correct = target.get(idx).is_some_and(|&expected| expected == c);
            if correct {
                spans.push(Span::styled(c.to_string(), green_bold));
            } else {
                // make mistyped spaces visible
                let shown = if c == ' ' {
                    "·".to_string()
                } else {
                    c.to_string()
                };
                spans.push(Span::styled(shown, red_bold));
            }
        }

        if typed.len() < target.len() {
            spans.push(Span::styled(target[typed.len()].to_string(), cursor_style));
            let rest: String = target[typed.len() + 1..].iter().collect();
            if !rest.is_empty() {
                spans.push(Span::styled(rest, dim_bold));
            }
        }

        spans
    }

    fn stats_line(&self) -> String {
        let stats = &self.state.statistics;
        format!(
            "{:.0} wpm   {:.0}% acc   {:.1}s   {} ok / {} err / {} extra / {} fixed",
            stats.words_per_minute,
            stats.accuracy,
            stats.elapsed.as_secs_f64(),
            stats.chars.correct,
            stats.chars.incorrect,
            stats.chars.extra,
            stats.chars.corrections,
        )
    }
}

impl Widget for &DashboardView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let mut prompt_occupied_lines =
            ((self.state.target_text.width() as f64 / max_chars_per_line as f64).ceil() + 1.0)
                as u16;
        if self.state.target_text.width() <= max_chars_per_line as usize {
            prompt_occupied_lines = 1;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(
                        (area.height.saturating_sub(prompt_occupied_lines) / 2).saturating_sub(1),
                    ),
                    Constraint::Length(1),
                    Constraint::Length(prompt_occupied_lines),
                    Constraint::Length(area.height.saturating_sub(prompt_occupied_lines) / 2),
                ]
                .as_ref(),
            )
            .split(area);

        let stats = Paragraph::new(Span::styled(
            self.stats_line(),
            Style::default().add_modifier(Modifier::DIM),
        ))
        .alignment(Alignment::Center);
        stats.render(chunks[1], buf);

        let prompt = Paragraph::new(Line::from(self.prompt_spans()))
            .alignment(if prompt_occupied_lines == 1 {
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: true });
        prompt.render(chunks[2], buf);
    }
}

/// End-of-game screen: WPM-over-time chart plus a summary line
pub struct ResultsView<'a> {
    pub state: &'a GameStateUpdate,
    pub series: &'a [WpmSample],
    pub consistency: f64,
    pub source: &'a str,
}

impl ResultsView<'_> {
    fn summary_line(&self) -> String {
        let stats = &self.state.statistics;
        format!(
            "{:.0} wpm   {:.0}% acc   {:.2} sd   {}",
            stats.words_per_minute, stats.accuracy, self.consistency, self.source,
        )
    }
}

impl Widget for &ResultsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(1),    // chart
                Constraint::Length(1), // summary
                Constraint::Length(1), // padding
                Constraint::Length(1), // legend
            ])
            .split(area);

        let (overall_duration, highest_wpm) = chart_bounds(self.series);
        let points: Vec<(f64, f64)> = self.series.iter().map(|p| (p.seconds, p.wpm)).collect();
        let datasets = vec![Dataset::default()
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(Color::Magenta))
            .graph_type(GraphType::Line)
            .data(&points)];

        let chart = Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title("seconds")
                    .style(Style::default().add_modifier(Modifier::DIM))
                    .bounds([0.0, overall_duration])
                    .labels([format_label(0.0), format_label(overall_duration)]),
            )
            .y_axis(
                Axis::default()
                    .title("wpm")
                    .style(Style::default().add_modifier(Modifier::DIM))
                    .bounds([0.0, highest_wpm.max(1.0)])
                    .labels([format_label(0.0), format_label(highest_wpm.max(1.0))]),
            );
        chart.render(chunks[0], buf);

        let summary = Paragraph::new(Span::styled(
            self.summary_line(),
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center);
        summary.render(chunks[1], buf);

        let legend = Paragraph::new(Span::styled(
            "(r)etry / (n)ext / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
        ))
        .alignment(Alignment::Center);
        legend.render(chunks[3], buf);
    }
}
