//! TUI rendering with ratatui
//!
//! Draws the character grid as a lit (or dark) LCD between a status bar and
//! a key help bar.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use ui::Button;

use super::app::App;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Status bar
            Constraint::Min(4),    // Display
            Constraint::Length(3), // Help bar
        ])
        .split(frame.area());

    render_status_bar(frame, app, chunks[0]);
    render_lcd(frame, app, chunks[1]);
    render_help_bar(frame, chunks[2]);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let page = app.current_page().unwrap_or("-");
    let last = app
        .last_event()
        .map_or_else(|| "-".to_string(), |event| event.to_string());

    let status_text = vec![
        Span::styled("Page: ", Style::default().fg(Color::DarkGray)),
        Span::styled(page, Style::default().fg(Color::Cyan)),
        Span::raw("  |  "),
        Span::styled("Backlight: ", Style::default().fg(Color::DarkGray)),
        backlight_span(app.display().backlight()),
        Span::raw("  |  "),
        Span::styled("Last: ", Style::default().fg(Color::DarkGray)),
        Span::styled(last, Style::default().fg(Color::Yellow)),
    ];

    let status = Paragraph::new(Line::from(status_text))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Turing Pi Panel ")
                .title_alignment(Alignment::Center)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(status, area);
}

fn backlight_span(on: bool) -> Span<'static> {
    if on {
        Span::styled("on", Style::default().fg(Color::Green))
    } else {
        Span::styled("off", Style::default().fg(Color::Red))
    }
}

/// Style of the character cells, dimmed while the backlight is off
fn lcd_style(backlight: bool) -> Style {
    if backlight {
        Style::default()
            .fg(Color::Black)
            .bg(Color::LightGreen)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray).bg(Color::Black)
    }
}

fn render_lcd(frame: &mut Frame, app: &App, area: Rect) {
    let rows = app.display().preview();
    let columns = rows
        .iter()
        .map(|row| row.chars().count())
        .max()
        .unwrap_or(0);
    let lcd = lcd_area(area, columns, rows.len());

    let lines: Vec<Line> = rows.into_iter().map(Line::from).collect();
    let lcd_widget = Paragraph::new(lines)
        .style(lcd_style(app.display().backlight()))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(button_color(app))),
        );

    frame.render_widget(lcd_widget, lcd);
}

/// Border lights up while any button is down
fn button_color(app: &App) -> Color {
    if [Button::Left, Button::Right, Button::Action]
        .into_iter()
        .any(|button| app.is_pressed(button))
    {
        Color::Yellow
    } else {
        Color::Gray
    }
}

/// A bordered box just big enough for the grid, centered in `area`
fn lcd_area(area: Rect, columns: usize, rows: usize) -> Rect {
    let width = u16::try_from(columns + 2)
        .unwrap_or(u16::MAX)
        .min(area.width);
    let height = u16::try_from(rows + 2).unwrap_or(u16::MAX).min(area.height);

    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn render_help_bar(frame: &mut Frame, area: Rect) {
    let key = |text: &'static str| Span::styled(text, Style::default().fg(Color::Yellow));
    let help_text = vec![
        key("←/a"),
        Span::raw(" Left  "),
        key("→/d"),
        Span::raw(" Right  "),
        key("Enter/s"),
        Span::raw(" Action  "),
        key("Shift"),
        Span::raw(" Hold  "),
        key("q"),
        Span::raw(" Quit"),
    ];

    let help = Paragraph::new(Line::from(help_text))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(help, area);
}
