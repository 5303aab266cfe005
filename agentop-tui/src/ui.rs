//! UI rendering for the TUI.

use agentop_core::format::{format_cost, format_relative_time, format_tokens};
use agentop_core::{Agent, AgentStatus, PricingTier};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;

// ========== Status Colors ==========

/// Active agents (activity within 30s)
const STATUS_ACTIVE: Color = Color::Rgb(50, 205, 50);
/// Idle agents (recent, not waiting)
const STATUS_IDLE: Color = Color::Rgb(220, 180, 0);
/// Agents parked on the operator
const STATUS_WAITING: Color = Color::Rgb(0, 255, 255);
/// Stopped agents (over an hour quiet)
const STATUS_STOPPED: Color = Color::Rgb(128, 128, 128);

/// Label color for header metrics
const LABEL_COLOR: Color = Color::Rgb(100, 180, 180);
/// Separator/border color
const SEPARATOR_COLOR: Color = Color::Rgb(60, 60, 60);

fn status_color(status: AgentStatus) -> Color {
    match status {
        AgentStatus::Active => STATUS_ACTIVE,
        AgentStatus::Idle => STATUS_IDLE,
        AgentStatus::WaitingForUser => STATUS_WAITING,
        AgentStatus::Stopped => STATUS_STOPPED,
    }
}

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Layout: metrics header, agent table, footer
    let chunks = Layout::vertical([
        Constraint::Length(3), // Metrics header
        Constraint::Min(5),    // Table
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_metrics_header(frame, app, chunks[0]);
    render_agent_table(frame, app, chunks[1]);
    render_footer(frame, app, chunks[2]);
}

/// Render the top metrics bar: agent counts by status, totals, pricing tier.
fn render_metrics_header(frame: &mut Frame, app: &App, area: Rect) {
    let m = &app.snapshot.metrics;

    let tier = match app.snapshot.pricing_tier {
        PricingTier::Fresh => Span::styled("live rates", Style::default().fg(STATUS_ACTIVE)),
        PricingTier::Cached => Span::styled("cached rates", Style::default().fg(STATUS_IDLE)),
        PricingTier::Bundled => Span::styled("bundled rates", Style::default().fg(STATUS_STOPPED)),
    };

    let line = Line::from(vec![
        Span::styled(" agentop ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("│ ", Style::default().fg(SEPARATOR_COLOR)),
        Span::styled(format!("{} agents", m.total_agents), Style::default().fg(LABEL_COLOR)),
        Span::raw("  "),
        Span::styled(format!("● {}", m.active_agents), Style::default().fg(STATUS_ACTIVE)),
        Span::raw(" "),
        Span::styled(format!("◐ {}", m.idle_agents), Style::default().fg(STATUS_IDLE)),
        Span::raw(" "),
        Span::styled(format!("◉ {}", m.waiting_agents), Style::default().fg(STATUS_WAITING)),
        Span::raw(" "),
        Span::styled(format!("○ {}", m.stopped_agents), Style::default().fg(STATUS_STOPPED)),
        Span::styled("  │ ", Style::default().fg(SEPARATOR_COLOR)),
        Span::styled(
            format!("{} sessions", m.total_sessions),
            Style::default().fg(LABEL_COLOR),
        ),
        Span::styled("  │ ", Style::default().fg(SEPARATOR_COLOR)),
        Span::styled(
            format!("{} tok", format_tokens(m.total_tokens())),
            Style::default().fg(LABEL_COLOR),
        ),
        Span::raw("  "),
        Span::styled(format_cost(m.total_cost), Style::default().fg(Color::White).bold()),
        Span::styled("  │ ", Style::default().fg(SEPARATOR_COLOR)),
        tier,
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(SEPARATOR_COLOR)),
    );
    frame.render_widget(header, area);
}

/// Render the agent table.
fn render_agent_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let agents = app.visible_agents();

    if agents.is_empty() {
        let message = match app.status_filter {
            Some(status) => format!("No {} agents", status),
            None => "No agents found. Waiting for log activity...".to_string(),
        };
        let empty = Paragraph::new(message).style(Style::default().fg(STATUS_STOPPED));
        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("AGENT"),
        Cell::from("STATUS"),
        Cell::from("PROJECT"),
        Cell::from("MODEL"),
        Cell::from("MSGS"),
        Cell::from("TOKENS"),
        Cell::from("COST"),
        Cell::from("LAST"),
    ])
    .style(Style::default().fg(LABEL_COLOR).bold());

    let rows: Vec<Row> = agents.iter().map(|agent| agent_row(agent)).collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(9),  // Agent id
            Constraint::Length(8),  // Status
            Constraint::Min(16),    // Project
            Constraint::Length(20), // Model
            Constraint::Length(6),  // Messages
            Constraint::Length(8),  // Tokens
            Constraint::Length(9),  // Cost
            Constraint::Length(8),  // Last activity
        ],
    )
    .header(header)
    .row_highlight_style(Style::default().bg(Color::Rgb(40, 40, 40)).bold());

    frame.render_stateful_widget(table, area, &mut app.table_state);
}

// Rows own their cell text so the table carries no borrow of the app.
fn agent_row(agent: &Agent) -> Row<'static> {
    let project = agent
        .project_path
        .as_deref()
        .map(shorten_path)
        .unwrap_or_else(|| "-".to_string());
    let model = agent.model.clone().unwrap_or_else(|| "-".to_string());

    Row::new(vec![
        Cell::from(agent.short_id().to_string()),
        Cell::from(agent.status.as_str()).style(Style::default().fg(status_color(agent.status))),
        Cell::from(project),
        Cell::from(model),
        Cell::from(agent.message_count.to_string()),
        Cell::from(format_tokens(agent.usage.total_tokens())),
        Cell::from(format_cost(agent.usage.cost)),
        Cell::from(format_relative_time(agent.last_activity)),
    ])
}

/// Last two path components, enough to identify a project.
fn shorten_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    match parts.len() {
        0 => path.to_string(),
        1 => parts[0].to_string(),
        n => format!("{}/{}", parts[n - 2], parts[n - 1]),
    }
}

/// Render the footer with key hints and current sort/filter.
fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let filter = match app.status_filter {
        Some(status) => status.as_str(),
        None => "all",
    };

    let mut spans = vec![
        Span::styled(" q", Style::default().fg(Color::Cyan)),
        Span::raw(" quit  "),
        Span::styled("s", Style::default().fg(Color::Cyan)),
        Span::raw(format!(" sort[{}]  ", app.sort_key.as_str())),
        Span::styled("f", Style::default().fg(Color::Cyan)),
        Span::raw(format!(" filter[{}]  ", filter)),
        Span::styled("r", Style::default().fg(Color::Cyan)),
        Span::raw(" refresh"),
    ];

    if app.snapshot.parse_failures > 0 {
        spans.push(Span::styled(
            format!("  {} bad lines", app.snapshot.parse_failures),
            Style::default().fg(STATUS_IDLE),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_path() {
        assert_eq!(shorten_path("/home/dev/proj"), "dev/proj");
        assert_eq!(shorten_path("proj"), "proj");
        assert_eq!(shorten_path("/proj"), "proj");
    }
}
