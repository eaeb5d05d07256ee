use rand::SeedableRng;
use rand::rngs::StdRng;
use raingrid::rain::{RainConfig, RainGrid, Transition};
use raingrid::theme::{Theme, parse_hex};
use raingrid::ui::{self, CELL_WIDTH, ShrinkFx, Status, cell_color, grid_inner_rect};
use ratatui::layout::Rect;
use ratatui::{Terminal, backend::TestBackend};
use std::time::Instant;

fn render(grid: &RainGrid, width: u16, height: u16) -> Terminal<TestBackend> {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).unwrap();
    let theme = Theme::default();
    let status = Status {
        paused: false,
        no_animation: true,
        now: Instant::now(),
    };
    let mut fx = ShrinkFx::default();
    terminal
        .draw(|frame| ui::draw(frame, grid, &theme, &status, &mut fx))
        .expect("draw");
    terminal
}

fn screen_pos(grid: &RainGrid, width: u16, height: u16, col: usize, row: usize) -> (u16, u16) {
    let cfg = grid.config();
    let inner = grid_inner_rect(Rect::new(0, 0, width, height), cfg.cols, cfg.rows);
    (inner.x + col as u16 * CELL_WIDTH, inner.y + row as u16)
}

#[test]
fn block_cells_use_round_palette() {
    let grid = RainGrid::from_positions(RainConfig::default(), &[None, Some(3)]);
    let terminal = render(&grid, 80, 30);
    let buffer = terminal.backend().buffer();

    let green = parse_hex("#063b00").unwrap();
    let (x, y) = screen_pos(&grid, 80, 30, 1, 3);
    assert_eq!(buffer[(x, y)].bg, green);
    assert_eq!(buffer[(x + 1, y)].bg, green);

    let (x, y) = screen_pos(&grid, 80, 30, 1, 8);
    assert_eq!(buffer[(x, y)].bg, parse_hex("#9BEC00").unwrap());

    let (x, y) = screen_pos(&grid, 80, 30, 1, 9);
    assert_eq!(buffer[(x, y)].bg, Theme::default().bg);
    let (x, y) = screen_pos(&grid, 80, 30, 0, 3);
    assert_eq!(buffer[(x, y)].bg, Theme::default().bg);
}

#[test]
fn second_cycle_draws_yellow() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut grid = RainGrid::new(RainConfig::default(), &mut rng);
    while grid.tick(&mut rng) != Transition::Settled {}
    assert!(matches!(grid.tick(&mut rng), Transition::Restarted { .. }));

    let col = (0..grid.config().cols)
        .find(|&c| grid.position(c) == Some(0))
        .expect("a column is falling");
    assert_eq!(
        cell_color(&grid, &Theme::default(), col, 0),
        parse_hex("#333300").unwrap()
    );
    let terminal = render(&grid, 80, 30);
    let (x, y) = screen_pos(&grid, 80, 30, col, 0);
    assert_eq!(terminal.backend().buffer()[(x, y)].bg, parse_hex("#333300").unwrap());
}

#[test]
fn title_shows_round() {
    let grid = RainGrid::from_positions(RainConfig::default(), &[]);
    let terminal = render(&grid, 80, 30);
    let buffer = terminal.backend().buffer();
    let top: String = (0..80).map(|x| buffer[(x, 3)].symbol()).collect();
    assert!(top.contains("Round 0"), "title row: {top}");
}

#[test]
fn static_shrink_draws_half_block() {
    let config = RainConfig {
        rows: 40,
        cols: 2,
        ..RainConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(2);
    let mut grid = RainGrid::from_positions(config, &[Some(30), None]);
    grid.tick(&mut rng);
    assert_eq!(grid.shrinking_cells(), vec![(0, 29)]);

    let terminal = render(&grid, 40, 50);
    let (x, y) = screen_pos(&grid, 40, 50, 0, 29);
    let cell = &terminal.backend().buffer()[(x, y)];
    assert_eq!(cell.symbol(), "▄");
    assert_eq!(cell.fg, parse_hex("#9BEC00").unwrap());
}

#[test]
fn tiny_terminal_does_not_panic() {
    let mut rng = StdRng::seed_from_u64(4);
    let grid = RainGrid::new(RainConfig::default(), &mut rng);
    render(&grid, 10, 4);
    render(&grid, 1, 1);
}
