//! Drawing: rain grid, round title, status line, pause overlay, shrink fade.

use crate::rain::{CellShade, RainGrid};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each grid cell is two terminal columns wide so cells look square.
pub const CELL_WIDTH: u16 = 2;
const STATUS_HEIGHT: u16 = 1;

/// Per-frame flags from the app.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    pub paused: bool,
    pub no_animation: bool,
    pub now: Instant,
}

/// Shrink fade carried across frames; rebuilt whenever the set of shrinking cells changes.
#[derive(Default)]
pub struct ShrinkFx {
    effect: Option<Effect>,
    last_process: Option<Instant>,
    cells: Vec<(usize, usize)>,
}

impl ShrinkFx {
    pub fn clear(&mut self) {
        self.effect = None;
        self.last_process = None;
        self.cells.clear();
    }
}

/// Bordered grid size in terminal cells.
pub fn grid_outer_size(cols: usize, rows: usize) -> (u16, u16) {
    let w = (cols as u16).saturating_mul(CELL_WIDTH).saturating_add(2);
    let h = (rows as u16).saturating_add(2);
    (w, h)
}

/// Bordered grid rect centered in `area`, leaving room for the status line.
pub fn grid_outer_rect(area: Rect, cols: usize, rows: usize) -> Rect {
    let (w, h) = grid_outer_size(cols, rows);
    let avail_h = area.height.saturating_sub(STATUS_HEIGHT);
    let width = w.min(area.width);
    let height = h.min(avail_h);
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + avail_h.saturating_sub(height) / 2,
        width,
        height,
    }
}

/// Grid cells only (inside the border).
pub fn grid_inner_rect(area: Rect, cols: usize, rows: usize) -> Rect {
    let outer = grid_outer_rect(area, cols, rows);
    Rect {
        x: outer.x + 1,
        y: outer.y + 1,
        width: outer.width.saturating_sub(2),
        height: outer.height.saturating_sub(2),
    }
}

/// Colour of the cell at `(col, row)`: block shade for the current round, or background.
pub fn cell_color(grid: &RainGrid, theme: &Theme, col: usize, row: usize) -> Color {
    match grid.cell_shade(col, row) {
        CellShade::Block(index) | CellShade::Shrinking(index) => {
            theme.block_color(grid.round(), index)
        }
        CellShade::Empty => theme.bg,
    }
}

/// Draw the grid, status line and overlays.
pub fn draw(
    frame: &mut Frame,
    grid: &RainGrid,
    theme: &Theme,
    status: &Status,
    shrink_fx: &mut ShrinkFx,
) {
    let area = frame.area();
    let cfg = grid.config();
    let outer = grid_outer_rect(area, cfg.cols, cfg.rows);
    let inner = grid_inner_rect(area, cfg.cols, cfg.rows);

    draw_grid(frame, grid, theme, outer, inner, status.no_animation);
    draw_status(frame, grid, theme, outer, status);

    let shrinking = grid.shrinking_cells();
    if shrinking.is_empty() || status.no_animation {
        shrink_fx.clear();
    } else {
        apply_shrink_effect(frame, grid, theme, inner, &shrinking, shrink_fx, status);
    }

    if status.paused {
        draw_pause_overlay(frame, theme, area);
    }
}

fn draw_grid(
    frame: &mut Frame,
    grid: &RainGrid,
    theme: &Theme,
    outer: Rect,
    inner: Rect,
    no_animation: bool,
) {
    let title = format!(
        " raingrid  | Round {}  palette {} ",
        grid.round(),
        grid.palette_index() + 1
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, Style::default().fg(theme.title)));
    block.render(outer, frame.buffer_mut());

    let cfg = grid.config();
    let buf = frame.buffer_mut();
    for col in 0..cfg.cols {
        let Some(x0) = cell_x(inner, col) else {
            break;
        };
        for row in 0..cfg.rows {
            let Some(ry) = cell_y(inner, row) else {
                break;
            };
            let color = cell_color(grid, theme, col, row);
            // Static shrink: lower half only.
            let (symbol, style) = match grid.cell_shade(col, row) {
                CellShade::Shrinking(_) if no_animation => {
                    ("▄", Style::default().fg(color).bg(theme.bg))
                }
                _ => (" ", Style::default().bg(color)),
            };
            for rx in x0..x0.saturating_add(CELL_WIDTH).min(inner.right()) {
                buf[(rx, ry)].set_symbol(symbol).set_style(style);
            }
        }
    }
}

fn draw_status(frame: &mut Frame, grid: &RainGrid, theme: &Theme, outer: Rect, status: &Status) {
    let area = frame.area();
    let y = outer.bottom();
    if y >= area.bottom() {
        return;
    }
    let line_area = Rect {
        x: area.x,
        y,
        width: area.width,
        height: STATUS_HEIGHT,
    };
    let state = if status.paused { "paused" } else { "raining" };
    let text = format!(
        " {state}  tick {} ms  cycle {}  | q quit  p pause  r restart  +/- speed ",
        grid.config().falling_speed_ms,
        grid.cycles()
    );
    Paragraph::new(Line::from(Span::styled(text, Style::default().fg(theme.main_fg))))
        .alignment(Alignment::Center)
        .render(line_area, frame.buffer_mut());
}

/// Left buffer column of grid column `col`, if it starts inside `inner`.
fn cell_x(inner: Rect, col: usize) -> Option<u16> {
    let offset = u16::try_from(col).ok()?.checked_mul(CELL_WIDTH)?;
    let x = inner.x.checked_add(offset)?;
    (x < inner.right()).then_some(x)
}

/// Buffer row of grid row `row`, if it lies inside `inner`.
fn cell_y(inner: Rect, row: usize) -> Option<u16> {
    let y = inner.y.checked_add(u16::try_from(row).ok()?)?;
    (y < inner.bottom()).then_some(y)
}

/// Buffer positions covered by the given grid cells.
fn shrink_buffer_positions(inner: Rect, cells: &[(usize, usize)]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(col, row) in cells {
        let (Some(x0), Some(y)) = (cell_x(inner, col), cell_y(inner, row)) else {
            continue;
        };
        for x in x0..x0.saturating_add(CELL_WIDTH).min(inner.right()) {
            set.insert((x, y));
        }
    }
    set
}

/// Time to advance the fade by this frame; the fade holds while paused.
fn fade_delta(last: Option<Instant>, now: Instant, paused: bool) -> Duration {
    match last {
        Some(t) if !paused => now.saturating_duration_since(t),
        _ => Duration::ZERO,
    }
}

/// Fade shrinking cells to the background over the shrink delay (TachyonFX).
fn apply_shrink_effect(
    frame: &mut Frame,
    grid: &RainGrid,
    theme: &Theme,
    inner: Rect,
    cells: &[(usize, usize)],
    shrink_fx: &mut ShrinkFx,
    status: &Status,
) {
    if shrink_fx.cells != cells {
        shrink_fx.clear();
        shrink_fx.cells = cells.to_vec();
    }

    let delta = fade_delta(shrink_fx.last_process, status.now, status.paused);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    shrink_fx.last_process = Some(status.now);

    if shrink_fx.effect.is_none() {
        let positions = shrink_buffer_positions(inner, cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        let fade_ms = u32::try_from(grid.config().shrink_ms).unwrap_or(u32::MAX);
        let effect = fx::fade_to(theme.bg, theme.bg, (fade_ms, Interpolation::Linear))
            .with_filter(filter)
            .with_area(inner);
        shrink_fx.effect = Some(effect);
    }

    if let Some(effect) = &mut shrink_fx.effect {
        frame.render_effect(effect, inner, TfxDuration::from_millis(delta_ms));
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(Span::styled(
            " P resume    Q quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}
