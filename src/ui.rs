use chrono::Local;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use ratatui::Frame;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::{App, FilterEntry, InputMode, LayoutMode, SearchMode, ThemeMode};
use crate::geo::distance_mi;
use crate::map::{self, MapTheme};
use crate::model::CATEGORY_OPTIONS;

struct Theme {
    accent: Color,
    warn: Color,
    danger: Color,
    dim: Color,
    highlight_fg: Color,
    highlight_bg: Color,
    active: Color,
    row_even_bg: Color,
    row_odd_bg: Color,
    header_bg: Color,
    panel_bg: Color,
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let size = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(size);

    render_header(f, chunks[0], app);

    match app.layout_mode {
        LayoutMode::Full => render_full_body(f, chunks[1], app),
        LayoutMode::Compact => render_compact_body(f, chunks[1], app),
    }

    render_footer(f, chunks[2], app);

    if app.input_mode == InputMode::FilterMenu {
        render_filter_menu(f, size, app);
    }

    if app.input_mode == InputMode::Help {
        render_help_menu(f, size, app);
    }
}

fn render_full_body(f: &mut Frame, area: Rect, app: &App) {
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_map(f, body[0], app);

    let side = if app.active_track.is_some() {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(11),
                Constraint::Length(10),
                Constraint::Min(6),
            ])
            .split(body[1])
    } else {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(0),
                Constraint::Length(12),
                Constraint::Min(6),
            ])
            .split(body[1])
    };

    if app.active_track.is_some() {
        render_track_info(f, side[0], app, false);
    }
    render_track_list(f, side[1], app);
    if app.show_race_list {
        render_race_list(f, side[2], app);
    } else {
        render_race_list_closed(f, side[2], app);
    }
}

fn render_compact_body(f: &mut Frame, area: Rect, app: &App) {
    // Small screens stack one panel on top of the map, the way a phone
    // layout collapses the sidebar.
    if app.active_track.is_some() {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(6)])
            .split(area);
        render_map(f, rows[0], app);
        render_track_info(f, rows[1], app, true);
    } else if app.show_race_list {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(8)])
            .split(area);
        render_map(f, rows[0], app);
        render_race_list(f, rows[1], app);
    } else {
        render_map(f, area, app);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let track_total = app.tracks.len();
    let visible = app.visible_track_indices().len();
    let race_count = app.races().len();

    let status = if let Some(err) = &app.last_error {
        format!("ERR: {err}")
    } else if app.is_loading() {
        "LOADING".to_string()
    } else {
        "OK".to_string()
    };
    let status_color = if app.last_error.is_some() {
        theme.danger
    } else if app.is_loading() {
        theme.warn
    } else {
        Color::Green
    };
    let spinner = if app.is_loading() {
        ["|", "/", "-", "\\"][phase_index(200, 4)]
    } else {
        " "
    };

    let mut mode_spans = vec![Span::styled(
        "RACE DAY",
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    )];
    mode_spans.push(Span::raw(" | "));
    for (key, mode) in [
        ("1", SearchMode::Location),
        ("2", SearchMode::CurrentLocation),
        ("3", SearchMode::Track),
    ] {
        let label = format!("[{key}]{} ", mode.label());
        let style = if app.search_mode == mode {
            Style::default()
                .fg(theme.highlight_fg)
                .bg(theme.highlight_bg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.dim)
        };
        mode_spans.push(Span::styled(label, style));
    }
    mode_spans.push(Span::raw("| "));
    mode_spans.push(Span::styled(
        format!("TRACKS {visible}/{track_total}"),
        Style::default().fg(Color::Cyan),
    ));
    mode_spans.push(Span::raw(" | "));
    mode_spans.push(Span::styled(
        format!("RACES {race_count}"),
        Style::default().fg(theme.accent),
    ));

    let filters_off = CATEGORY_OPTIONS.len().saturating_sub(app.categories.len());
    let clock = Local::now().format("%H:%M:%S").to_string();
    let line_bottom = Line::from(vec![
        Span::raw(format!("{clock} | ")),
        Span::raw(format!(
            "CATS {}/{}",
            app.categories.len(),
            CATEGORY_OPTIONS.len()
        )),
        Span::raw(" | "),
        Span::raw(format!("REGIONS {}/6", app.regions.len())),
        Span::raw(" | "),
        Span::styled(
            if filters_off > 0 { "FILTERED" } else { "ALL CATS" },
            Style::default().fg(theme.dim),
        ),
        Span::raw(" | "),
        Span::raw(format!("VIEW {}", app.layout_mode.label())),
        Span::raw(" | "),
        Span::raw(format!("THEME {}", app.theme_mode.label())),
        Span::raw(" | "),
        Span::styled(format!("{spinner} "), Style::default().fg(theme.warn)),
        Span::styled(
            status,
            Style::default()
                .fg(status_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled("[f]Filters ", Style::default().fg(theme.dim)),
        Span::styled("[?]Help", Style::default().fg(theme.dim)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("SEARCH");
    let paragraph = Paragraph::new(vec![Line::from(mode_spans), line_bottom])
        .block(block)
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn render_map(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    map::render(
        f,
        area,
        app,
        MapTheme {
            accent: theme.accent,
            dim: theme.dim,
            active: theme.active,
            warn: theme.warn,
            panel_bg: theme.panel_bg,
        },
    );
}

fn render_track_list(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let listed = app.listed_track_indices();

    let title = match app.search_mode {
        SearchMode::Track if app.input_mode == InputMode::TrackSearch => {
            format!("TRACKS /{}_", app.track_query_edit)
        }
        SearchMode::Track if !app.track_query.is_empty() => {
            format!("TRACKS /{}", app.track_query)
        }
        _ => "TRACKS".to_string(),
    };

    let visible_rows = area.height.saturating_sub(3) as usize;
    let offset = scroll_offset(app.track_cursor, listed.len(), visible_rows);

    let rows: Vec<Row> = listed
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible_rows.max(1))
        .map(|(pos, &idx)| {
            let track = &app.tracks[idx];
            let place = match (&track.state, &track.district) {
                (Some(state), Some(district)) => format!("{state} {district}"),
                (Some(state), None) => state.clone(),
                (None, Some(district)) => district.clone(),
                (None, None) => "--".to_string(),
            };
            let mut style = Style::default().bg(if pos % 2 == 0 {
                theme.row_even_bg
            } else {
                theme.row_odd_bg
            });
            if app.active_track == Some(idx) {
                style = style.fg(theme.active).add_modifier(Modifier::BOLD);
            }
            if pos == app.track_cursor {
                style = Style::default()
                    .fg(theme.highlight_fg)
                    .bg(theme.highlight_bg)
                    .add_modifier(Modifier::BOLD);
            }
            Row::new(vec![
                Cell::from(truncate(&track.name, 26)),
                Cell::from(truncate(&place, 14)),
            ])
            .style(style)
        })
        .collect();

    let header = Row::new(vec![Cell::from("NAME"), Cell::from("WHERE")]).style(
        Style::default()
            .bg(theme.header_bg)
            .add_modifier(Modifier::BOLD),
    );
    let table = Table::new(
        rows,
        [Constraint::Percentage(65), Constraint::Percentage(35)],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Plain)
            .title(title),
    )
    .style(Style::default().bg(theme.panel_bg));
    f.render_widget(table, area);
}

fn render_race_list(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let races = app.races();

    if races.is_empty() {
        let message = if app.is_loading() {
            "Searching for races..."
        } else if app.search_mode == SearchMode::Track && app.active_track.is_none() {
            "Pick a track to list its races"
        } else {
            "No races match the current filters"
        };
        let paragraph = Paragraph::new(vec![Line::from(Span::styled(
            message,
            Style::default().fg(theme.dim),
        ))])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Plain)
                .title("RACES"),
        )
        .wrap(Wrap { trim: true })
        .style(Style::default().bg(theme.panel_bg));
        f.render_widget(paragraph, area);
        return;
    }

    let visible_rows = area.height.saturating_sub(3) as usize;
    let offset = scroll_offset(app.race_cursor, races.len(), visible_rows);

    let rows: Vec<Row> = races
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible_rows.max(1))
        .map(|(pos, race)| {
            let mut style = Style::default().bg(if pos % 2 == 0 {
                theme.row_even_bg
            } else {
                theme.row_odd_bg
            });
            if pos == app.race_cursor {
                style = Style::default()
                    .fg(theme.highlight_fg)
                    .bg(theme.highlight_bg)
                    .add_modifier(Modifier::BOLD);
            }
            Row::new(vec![
                Cell::from(fmt_text(race.date.as_deref())),
                Cell::from(truncate(&fmt_text(race.name.as_deref()), 22)),
                Cell::from(fmt_text(race.category.as_deref())),
                Cell::from(fmt_text(race.region.as_deref())),
                Cell::from(truncate(&fmt_text(race.track_name.as_deref()), 18)),
            ])
            .style(style)
        })
        .collect();

    let header = Row::new(vec![
        Cell::from("DATE"),
        Cell::from("RACE"),
        Cell::from("CAT"),
        Cell::from("REGION"),
        Cell::from("TRACK"),
    ])
    .style(
        Style::default()
            .bg(theme.header_bg)
            .add_modifier(Modifier::BOLD),
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Percentage(35),
            Constraint::Length(9),
            Constraint::Length(13),
            Constraint::Percentage(25),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Plain)
            .title(format!("RACES ({})", races.len())),
    )
    .style(Style::default().bg(theme.panel_bg));
    f.render_widget(table, area);
}

fn render_race_list_closed(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let paragraph = Paragraph::new(vec![Line::from(Span::styled(
        "Race list hidden. Press v to show it",
        Style::default().fg(theme.dim),
    ))])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Plain)
            .title("RACES"),
    )
    .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn render_track_info(f: &mut Frame, area: Rect, app: &App, compact: bool) {
    let theme = theme(app.theme_mode);
    let Some(track) = app.active_track_ref() else {
        return;
    };

    let mut lines = vec![Line::from(Span::styled(
        track.name.clone(),
        Style::default()
            .fg(theme.active)
            .add_modifier(Modifier::BOLD),
    ))];

    let place = match (&track.state, &track.district) {
        (Some(state), Some(district)) => format!("{state} / {district}"),
        (Some(state), None) => state.clone(),
        (None, Some(district)) => district.clone(),
        (None, None) => "--".to_string(),
    };
    lines.push(Line::from(format!("  {place}")));

    if let Some(position) = track.position() {
        let mut coords = format!("  {:.4}, {:.4}", position.lat, position.lon);
        if let Some(here) = app.device_location {
            let miles = distance_mi(here.lat, here.lon, position.lat, position.lon);
            coords.push_str(&format!("  ({miles:.0} mi away)"));
        }
        lines.push(Line::from(coords));
    }

    if !compact {
        if let Some(contact) = track.primary_contact_name.as_deref().filter(|c| !c.trim().is_empty())
        {
            lines.push(Line::from(format!("  Contact: {contact}")));
        }
        if let Some(phone) = track.contact_phone() {
            lines.push(Line::from(format!("  Phone:   {phone}")));
        }
        if let Some(email) = track.email.as_deref().filter(|e| !e.trim().is_empty()) {
            lines.push(Line::from(format!("  Email:   {email}")));
        }
        if let Some(site) = track.website_url.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(Line::from(format!("  Web:     {}", truncate(site, 40))));
        }
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "  [o]Website [e]Email [d]Directions [x]Close",
        Style::default().fg(theme.dim),
    )));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("TRACK"),
        )
        .wrap(Wrap { trim: false })
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let help = match app.input_mode {
        InputMode::TrackSearch => "type to search  Enter apply  Esc cancel".to_string(),
        _ => {
            let mut text = "q quit  1/2/3 mode  arrows pan  +/- zoom  tab/shift-tab tracks  j/k races  enter select  x close  f filters  v races  t theme  l layout".to_string();
            if app.search_mode == SearchMode::Track {
                text.push_str("  / search");
            }
            if app.last_error.is_some() {
                text.push_str("  r retry");
            }
            text
        }
    };

    let mut spans = vec![Span::styled(help, Style::default().fg(theme.dim))];
    if let Some(notice) = app.current_notice(SystemTime::now()) {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("NOTE {notice}"),
            Style::default().fg(theme.warn).add_modifier(Modifier::BOLD),
        ));
    }
    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn render_filter_menu(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let entries = app.filter_entries();
    let height = (entries.len() + 6).min(24) as u16;
    let popup = centered_rect(50, height, area);

    f.render_widget(Clear, popup);

    let mut lines = Vec::new();
    let mut region_header_done = false;
    lines.push(Line::from(Span::styled(
        "Categories",
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
    )));
    for (i, entry) in entries.iter().enumerate() {
        if !region_header_done && matches!(entry, FilterEntry::Region(_)) {
            lines.push(Line::from(Span::styled(
                "Regions (Gold Cup races only)",
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
            )));
            region_header_done = true;
        }
        let marker = if app.filter_entry_enabled(*entry) {
            "[x]"
        } else {
            "[ ]"
        };
        let label = match entry {
            FilterEntry::Category(category) => category.label(),
            FilterEntry::Region(region) => region.label(),
        };
        let text = format!(" {marker} {label}");
        let line = if i == app.filter_cursor {
            Line::from(Span::styled(
                text,
                Style::default()
                    .fg(theme.highlight_fg)
                    .bg(theme.highlight_bg)
                    .add_modifier(Modifier::BOLD),
            ))
        } else {
            Line::from(Span::styled(text, Style::default().fg(theme.dim)))
        };
        lines.push(line);
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Up/Down move • Space toggle • Esc close",
        Style::default().fg(theme.dim),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("FILTERS");
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, popup);
}

fn render_help_menu(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let popup = centered_rect(70, 24, area);

    f.render_widget(Clear, popup);

    let lines = vec![
        Line::from(Span::styled(
            "HELP",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Search modes",
            Style::default().fg(theme.dim).add_modifier(Modifier::BOLD),
        )),
        Line::from("  1          Search by map location"),
        Line::from("  2          Search near my location"),
        Line::from("  3          Search by track name"),
        Line::from(""),
        Line::from(Span::styled(
            "Map",
            Style::default().fg(theme.dim).add_modifier(Modifier::BOLD),
        )),
        Line::from("  arrows     Pan (races re-query for the new view)"),
        Line::from("  + / -      Zoom in / out"),
        Line::from(""),
        Line::from(Span::styled(
            "Tracks & races",
            Style::default().fg(theme.dim).add_modifier(Modifier::BOLD),
        )),
        Line::from("  Tab/S-Tab  Move track cursor"),
        Line::from("  Enter      Select track (shows details, queries races in track mode)"),
        Line::from("  x          Close track details"),
        Line::from("  j / k      Move race cursor"),
        Line::from("  v          Show/hide race list"),
        Line::from("  /          Track name search (track mode)"),
        Line::from(""),
        Line::from(Span::styled(
            "Filters & actions",
            Style::default().fg(theme.dim).add_modifier(Modifier::BOLD),
        )),
        Line::from("  f          Category and region filters"),
        Line::from("  o / e / d  Website / email / directions for the track"),
        Line::from("  r          Retry after a failed fetch"),
        Line::from("  t / l      Theme / layout"),
        Line::from("  q          Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc to close",
            Style::default().fg(theme.dim),
        )),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("HELP");
    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, popup);
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect {
        x,
        y,
        width,
        height: height.min(area.height),
    }
}

fn scroll_offset(cursor: usize, total: usize, visible: usize) -> usize {
    if visible == 0 || total <= visible {
        return 0;
    }
    let max_offset = total - visible;
    cursor.saturating_sub(visible / 2).min(max_offset)
}

fn fmt_text(value: Option<&str>) -> String {
    match value {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => "--".to_string(),
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn phase_index(period_ms: u64, frames: usize) -> usize {
    if period_ms == 0 || frames == 0 {
        return 0;
    }
    ((now_ms() / period_ms) % frames as u64) as usize
}

fn theme(mode: ThemeMode) -> Theme {
    match mode {
        ThemeMode::Default => Theme {
            accent: Color::Yellow,
            warn: Color::Yellow,
            danger: Color::Red,
            dim: Color::DarkGray,
            highlight_fg: Color::Black,
            highlight_bg: Color::Rgb(200, 200, 200),
            active: Color::LightGreen,
            row_even_bg: Color::Rgb(20, 20, 24),
            row_odd_bg: Color::Rgb(12, 12, 16),
            header_bg: Color::Rgb(24, 24, 28),
            panel_bg: Color::Rgb(18, 18, 22),
        },
        ThemeMode::Amber => Theme {
            accent: Color::Rgb(255, 191, 0),
            warn: Color::Rgb(255, 220, 120),
            danger: Color::LightRed,
            dim: Color::Rgb(140, 110, 40),
            highlight_fg: Color::Black,
            highlight_bg: Color::Rgb(255, 220, 120),
            active: Color::Rgb(255, 191, 0),
            row_even_bg: Color::Rgb(28, 22, 12),
            row_odd_bg: Color::Rgb(20, 16, 10),
            header_bg: Color::Rgb(32, 24, 14),
            panel_bg: Color::Rgb(24, 18, 10),
        },
        ThemeMode::Mono => Theme {
            accent: Color::White,
            warn: Color::Gray,
            danger: Color::White,
            dim: Color::DarkGray,
            highlight_fg: Color::Black,
            highlight_bg: Color::White,
            active: Color::White,
            row_even_bg: Color::Rgb(18, 18, 18),
            row_odd_bg: Color::Rgb(10, 10, 10),
            header_bg: Color::Rgb(22, 22, 22),
            panel_bg: Color::Rgb(14, 14, 14),
        },
    }
}
