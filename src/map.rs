use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line as TextLine, Span};
use ratatui::widgets::canvas::{Canvas, Circle, Line as CanvasLine, Points};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::App;
use crate::geo::LatLngBounds;

#[derive(Clone, Copy)]
pub struct MapTheme {
    pub accent: Color,
    pub dim: Color,
    pub active: Color,
    pub warn: Color,
    pub panel_bg: Color,
}

struct MapData {
    bounds: LatLngBounds,
    tracks: Vec<(f64, f64)>,
    cursor: Option<(f64, f64)>,
    active: Option<(f64, f64, String)>,
    device: Option<(f64, f64)>,
}

pub fn render(f: &mut Frame, area: Rect, app: &App, theme: MapTheme) {
    let data = collect_data(app);
    if data.tracks.is_empty() && data.active.is_none() {
        render_empty(f, area, app, theme);
        return;
    }
    let title = title(app);
    if area.width >= 8 && area.height >= 6 {
        render_canvas(f, area, &data, theme, title);
    } else {
        render_ascii(f, area, &data, theme, title);
    }
}

fn collect_data(app: &App) -> MapData {
    let bounds = app.viewport.bounds();
    let visible = app.visible_track_indices();
    let listed = app.listed_track_indices();
    let cursor_idx = listed.get(app.track_cursor).copied();

    let mut tracks = Vec::with_capacity(visible.len());
    let mut cursor = None;
    let mut active = None;
    for idx in visible {
        let Some(position) = app.tracks[idx].position() else {
            continue;
        };
        let coord = (position.lon, position.lat);
        if app.active_track == Some(idx) {
            active = Some((coord.0, coord.1, app.tracks[idx].name.clone()));
        } else if cursor_idx == Some(idx) {
            cursor = Some(coord);
        } else {
            tracks.push(coord);
        }
    }

    // The active track stays on the map even when selected from the list
    // while the viewport sits elsewhere.
    if active.is_none() {
        if let Some(track) = app.active_track_ref() {
            if let Some(position) = track.position() {
                active = Some((position.lon, position.lat, track.name.clone()));
            }
        }
    }

    let device = app
        .device_location
        .filter(|p| bounds.contains(*p))
        .map(|p| (p.lon, p.lat));

    MapData {
        bounds,
        tracks,
        cursor,
        active,
        device,
    }
}

fn title(app: &App) -> String {
    let center = app.viewport.center();
    format!(
        "MAP [{} | z{} | {:.2},{:.2}]",
        app.search_mode.label(),
        app.viewport.zoom(),
        center.lat,
        center.lon
    )
}

fn render_empty(f: &mut Frame, area: Rect, app: &App, theme: MapTheme) {
    let message = if app.is_loading() {
        "Loading tracks..."
    } else {
        "No tracks in view. Pan with arrows or zoom out with -"
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .title(title(app));
    let paragraph = Paragraph::new(vec![TextLine::from(Span::styled(
        message,
        Style::default().fg(theme.dim),
    ))])
    .block(block)
    .wrap(Wrap { trim: true })
    .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn render_canvas(f: &mut Frame, area: Rect, data: &MapData, theme: MapTheme, title: String) {
    let bounds = data.bounds;
    let x_bounds = [bounds.west, bounds.east];
    let y_bounds = [bounds.south, bounds.north];
    let center = bounds.center();
    let marker_radius = bounds.lon_span() / 60.0;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .title(title);
    let canvas = Canvas::default()
        .block(block)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .background_color(theme.panel_bg)
        .marker(Marker::Braille)
        .paint(|ctx| {
            ctx.draw(&CanvasLine {
                x1: bounds.west,
                y1: center.lat,
                x2: bounds.east,
                y2: center.lat,
                color: theme.dim,
            });
            ctx.draw(&CanvasLine {
                x1: center.lon,
                y1: bounds.south,
                x2: center.lon,
                y2: bounds.north,
                color: theme.dim,
            });
            if !data.tracks.is_empty() {
                ctx.draw(&Points {
                    coords: &data.tracks,
                    color: theme.accent,
                });
            }
            if let Some((x, y)) = data.device {
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: marker_radius,
                    color: theme.warn,
                });
            }
            if let Some((x, y)) = data.cursor {
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: marker_radius,
                    color: theme.accent,
                });
            }
            if let Some((x, y, ref name)) = data.active {
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: marker_radius,
                    color: theme.active,
                });
                ctx.print(
                    x,
                    y + marker_radius * 1.5,
                    Span::styled(name.clone(), Style::default().fg(theme.active)),
                );
            }
        });
    f.render_widget(canvas, area);
}

fn render_ascii(f: &mut Frame, area: Rect, data: &MapData, theme: MapTheme, title: String) {
    let width = area.width.saturating_sub(2) as usize;
    let height = area.height.saturating_sub(2) as usize;
    if width == 0 || height == 0 {
        return;
    }

    let mut grid = vec![vec![('.', 0u8); width]; height];
    let bounds = data.bounds;
    let lon_span = bounds.lon_span().max(f64::EPSILON);
    let lat_span = bounds.lat_span().max(f64::EPSILON);

    let mut plot = |lon: f64, lat: f64, ch: char, prio: u8| {
        let fx = (lon - bounds.west) / lon_span;
        let fy = (bounds.north - lat) / lat_span;
        let x = (fx * width.saturating_sub(1) as f64).round() as isize;
        let y = (fy * height.saturating_sub(1) as f64).round() as isize;
        let xi = x.clamp(0, width.saturating_sub(1) as isize) as usize;
        let yi = y.clamp(0, height.saturating_sub(1) as isize) as usize;
        set_grid(&mut grid, xi, yi, ch, prio);
    };

    for (lon, lat) in &data.tracks {
        plot(*lon, *lat, 'o', 1);
    }
    if let Some((lon, lat)) = data.device {
        plot(lon, lat, '+', 2);
    }
    if let Some((lon, lat)) = data.cursor {
        plot(lon, lat, '#', 3);
    }
    if let Some((lon, lat, _)) = data.active {
        plot(lon, lat, '@', 4);
    }

    let mut lines = Vec::with_capacity(height);
    for row in grid {
        let line: String = row.into_iter().map(|(ch, _)| ch).collect();
        lines.push(TextLine::from(Span::styled(
            line,
            Style::default().fg(theme.dim),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .title(title);
    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn set_grid(grid: &mut [Vec<(char, u8)>], x: usize, y: usize, ch: char, prio: u8) {
    if let Some(row) = grid.get_mut(y) {
        if let Some(cell) = row.get_mut(x) {
            if prio >= cell.1 {
                *cell = (ch, prio);
            }
        }
    }
}
