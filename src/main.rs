//! raingrid — falling-block rain animation in the terminal.

mod app;

use anyhow::{Context, Result};
use app::{App, AppOptions};
use clap::Parser;
use log::{LevelFilter, warn};
use raingrid::rain::{self, NearBottomCheck, RainConfig};
use raingrid::theme::Theme;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.log_level)?;

    let config = RainConfig {
        rows: args.rows,
        cols: args.cols,
        block_size: args.block_size,
        falling_speed_ms: args.falling_speed,
        shrink_ms: args.shrink_ms,
        near_bottom: args.near_bottom,
    }
    .validate()?;
    let theme = match Theme::load(args.theme.as_deref()) {
        Ok(theme) => theme,
        Err(err) => {
            warn!("theme {:?} unusable, using defaults: {err}", args.theme);
            Theme::default()
        }
    };
    let options = AppOptions {
        seed: args.seed,
        no_animation: args.no_animation,
        frame_rate: args.frame_rate,
    };

    let mut app = App::new(config, theme, &options);
    app.run()?;
    Ok(())
}

/// Logs go to a file only; the terminal belongs to the animation.
fn init_logging(path: Option<&Path>, level: LevelFilter) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    env_logger::Builder::new()
        .filter_level(level)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()?;
    Ok(())
}

/// Falling-block rain on a grid, cycling three colour palettes.
#[derive(Debug, Parser)]
#[command(
    name = "raingrid",
    version,
    about = "Falling-block rain animation in the terminal.",
    long_about = "raingrid drops waves of coloured blocks down a grid of columns. Every wave \
        picks two to five random columns; the palette (green, yellow, blue) follows the round, \
        which advances each time the grid empties.\n\n\
        CONTROLS:\n  q / Esc     Quit      p / Space  Pause\n  r           Restart   + / -      Faster / slower"
)]
pub struct Args {
    /// Rows per column.
    #[arg(long, default_value_t = rain::DEFAULT_ROWS, value_name = "N")]
    pub rows: usize,

    /// Number of columns.
    #[arg(long, default_value_t = rain::DEFAULT_COLS, value_name = "N")]
    pub cols: usize,

    /// Cells per falling block.
    #[arg(long, default_value_t = rain::DEFAULT_BLOCK_SIZE, value_name = "N")]
    pub block_size: usize,

    /// Tick interval in ms (one row per tick).
    #[arg(long, default_value_t = rain::DEFAULT_FALLING_SPEED_MS, value_name = "MS")]
    pub falling_speed: u64,

    /// How long a thinned column shrinks before it clears, in ms.
    #[arg(long, default_value_t = rain::DEFAULT_SHRINK_MS, value_name = "MS")]
    pub shrink_ms: u64,

    /// Positions the near-bottom check reads: cycle-start (alias stale), lagged (one tick behind) or current.
    #[arg(long, default_value = "cycle-start")]
    pub near_bottom: NearBottomCheck,

    /// Seed for column selection; random when not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Keys: rain_bg, div_line, title, main_fg, palette1..3.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Draw shrinking cells as half blocks instead of fading them.
    #[arg(long)]
    pub no_animation: bool,

    /// Target render frames per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Write logs to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level when --log-file is set (off, error, warn, info, debug, trace).
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    pub log_level: LevelFilter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_component_parameters() {
        let args = Args::parse_from(["raingrid"]);
        assert_eq!(args.rows, 20);
        assert_eq!(args.cols, 25);
        assert_eq!(args.block_size, 6);
        assert_eq!(args.falling_speed, 40);
        assert_eq!(args.near_bottom, NearBottomCheck::CycleStart);
        assert_eq!(args.log_level, LevelFilter::Info);
    }

    #[test]
    fn test_near_bottom_values() {
        let args = Args::parse_from(["raingrid", "--near-bottom", "lagged", "--seed", "9"]);
        assert_eq!(args.near_bottom, NearBottomCheck::Lagged);
        assert_eq!(args.seed, Some(9));
        assert!(Args::try_parse_from(["raingrid", "--near-bottom", "sideways"]).is_err());
        let args = Args::parse_from(["raingrid", "--near-bottom", "stale"]);
        assert_eq!(args.near_bottom, NearBottomCheck::CycleStart);
        let args = Args::parse_from(["raingrid", "--near-bottom", "current"]);
        assert_eq!(args.near_bottom, NearBottomCheck::Current);
    }

    #[test]
    fn test_cli_debug_assert() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
