//! App: terminal init, frame loop, scheduler tick and key handling.

use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use log::{debug, info, trace};
use rand::SeedableRng;
use rand::rngs::StdRng;
use raingrid::input::{Action, key_to_action};
use raingrid::rain::{RainConfig, RainGrid, Transition};
use raingrid::theme::Theme;
use raingrid::ui::{self, ShrinkFx, Status};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};

/// Tick interval bounds for the speed keys, in ms.
const MIN_FALLING_SPEED_MS: u64 = 5;
const MAX_FALLING_SPEED_MS: u64 = 1000;

/// Render rate bounds in frames per second.
const MIN_FRAME_RATE: f64 = 0.1;
const MAX_FRAME_RATE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpeedChange {
    Faster,
    Slower,
}

/// New tick interval after a speed key: halves or doubles, clamped.
fn adjusted_speed(ms: u64, change: SpeedChange) -> u64 {
    let next = match change {
        SpeedChange::Faster => ms / 2,
        SpeedChange::Slower => ms.saturating_mul(2),
    };
    next.clamp(MIN_FALLING_SPEED_MS, MAX_FALLING_SPEED_MS)
}

/// Options from the CLI that are not part of the grid itself.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub seed: Option<u64>,
    pub no_animation: bool,
    pub frame_rate: f64,
}

pub struct App {
    theme: Theme,
    grid: RainGrid,
    rng: StdRng,
    paused: bool,
    no_animation: bool,
    frame_interval: Duration,
    last_tick: Instant,
    shrink_fx: ShrinkFx,
}

impl App {
    pub fn new(config: RainConfig, theme: Theme, options: &AppOptions) -> Self {
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let grid = RainGrid::new(config, &mut rng);
        let frame_rate = if options.frame_rate.is_finite() && options.frame_rate > 0.0 {
            options.frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE)
        } else {
            60.0
        };
        Self {
            theme,
            grid,
            rng,
            paused: false,
            no_animation: options.no_animation,
            frame_interval: Duration::from_secs_f64(1.0 / frame_rate),
            last_tick: Instant::now(),
            shrink_fx: ShrinkFx::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            cursor::{Hide, Show},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        info!(
            "rain started: {}x{} grid, block {}, tick {} ms",
            self.grid.config().cols,
            self.grid.config().rows,
            self.grid.config().block_size,
            self.grid.config().falling_speed_ms
        );

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), Show, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        info!(
            "rain stopped after {} ticks, {} cycles",
            self.grid.ticks(),
            self.grid.cycles()
        );

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let status = Status {
                paused: self.paused,
                no_animation: self.no_animation,
                now,
            };
            terminal.draw(|f| ui::draw(f, &self.grid, &self.theme, &status, &mut self.shrink_fx))?;

            let timeout = self.frame_interval.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if self.apply_action(key_to_action(key)) {
                            return Ok(());
                        }
                    }
                }
            }

            if !self.paused && self.last_tick.elapsed() >= self.grid.config().tick_interval() {
                self.last_tick = Instant::now();
                self.tick();
            }
        }
    }

    /// Returns true when the app should exit.
    fn apply_action(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return true,
            Action::Pause => {
                self.paused = !self.paused;
                debug!("paused: {}", self.paused);
            }
            Action::Restart => {
                self.grid.reset(&mut self.rng);
                self.shrink_fx.clear();
                self.last_tick = Instant::now();
            }
            Action::Faster => self.change_speed(SpeedChange::Faster),
            Action::Slower => self.change_speed(SpeedChange::Slower),
            Action::None => {}
        }
        false
    }

    fn change_speed(&mut self, change: SpeedChange) {
        let ms = adjusted_speed(self.grid.config().falling_speed_ms, change);
        self.grid.set_falling_speed(ms);
        debug!("tick interval now {ms} ms");
    }

    fn tick(&mut self) {
        match self.grid.tick(&mut self.rng) {
            Transition::Fell { .. } => {}
            transition => trace!("tick {}: {transition:?}", self.grid.ticks()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let options = AppOptions {
            seed: Some(3),
            no_animation: true,
            frame_rate: 0.0,
        };
        App::new(RainConfig::default(), Theme::default(), &options)
    }

    #[test]
    fn test_adjusted_speed_clamps() {
        assert_eq!(adjusted_speed(40, SpeedChange::Faster), 20);
        assert_eq!(adjusted_speed(40, SpeedChange::Slower), 80);
        assert_eq!(adjusted_speed(6, SpeedChange::Faster), MIN_FALLING_SPEED_MS);
        assert_eq!(adjusted_speed(800, SpeedChange::Slower), MAX_FALLING_SPEED_MS);
    }

    #[test]
    fn test_bad_frame_rate_falls_back() {
        let app = app();
        assert_eq!(app.frame_interval, Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn test_extreme_frame_rates_clamped() {
        let tiny = AppOptions {
            seed: Some(3),
            no_animation: true,
            frame_rate: 1e-300,
        };
        let app = App::new(RainConfig::default(), Theme::default(), &tiny);
        assert_eq!(app.frame_interval, Duration::from_secs(10));

        let huge = AppOptions {
            frame_rate: 1e300,
            ..tiny
        };
        let app = App::new(RainConfig::default(), Theme::default(), &huge);
        assert_eq!(app.frame_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_actions() {
        let mut app = app();
        assert!(!app.apply_action(Action::Pause));
        assert!(app.paused);
        assert!(!app.apply_action(Action::Faster));
        assert_eq!(app.grid.config().falling_speed_ms, 20);
        assert!(!app.apply_action(Action::Restart));
        assert_eq!(app.grid.cycles(), 2);
        assert!(app.apply_action(Action::Quit));
    }

    #[test]
    fn test_seeded_apps_rain_alike() {
        let mut a = app();
        let mut b = app();
        assert_eq!(a.grid.positions(), b.grid.positions());
        for _ in 0..50 {
            a.tick();
            b.tick();
        }
        assert_eq!(a.grid.positions(), b.grid.positions());
        assert_eq!(a.grid.round(), b.grid.round());
    }
}
