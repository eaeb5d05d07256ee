//! Rain grid state: columns, falling blocks, round counter, removal passes.
//!
//! All timing is expressed in scheduler ticks. One call to [`RainGrid::tick`]
//! applies exactly one transition: a fall step, a removal pass, or a restart.

use log::{debug, trace};
use rand::Rng;
use rand::seq::index::sample;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ROWS: usize = 20;
pub const DEFAULT_COLS: usize = 25;
pub const DEFAULT_BLOCK_SIZE: usize = 6;
pub const DEFAULT_FALLING_SPEED_MS: u64 = 40;
pub const DEFAULT_SHRINK_MS: u64 = 500;

/// Columns started by a fresh fall (inclusive).
const MIN_START_COLUMNS: usize = 2;
const MAX_START_COLUMNS: usize = 5;
/// A block at `rows - NEAR_BOTTOM_ROWS` or lower is near the bottom.
const NEAR_BOTTOM_ROWS: usize = 5;
/// Columns are thinned when their completed block count is a multiple of this.
const REMOVAL_GROUP: usize = 5;
/// Number of colour palettes the round cycles through.
pub const ROUND_PALETTES: u32 = 3;

/// Which positions the near-bottom check looks at during a fall step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum NearBottomCheck {
    /// Positions as they stood when the current fall cycle was started.
    #[default]
    #[value(name = "cycle-start", alias = "stale")]
    CycleStart,
    /// Positions from before this tick's advance (one tick behind).
    Lagged,
    /// Positions after this tick's advance.
    Current,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("grid needs at least one row")]
    ZeroRows,
    #[error("grid needs at least one column")]
    ZeroCols,
    #[error("block size must be at least 1")]
    ZeroBlockSize,
    #[error("falling speed must be at least 1 ms")]
    ZeroFallingSpeed,
    #[error("grid of {cols}x{rows} does not fit a terminal (at most {max} per side)", max = u16::MAX)]
    GridTooLarge { rows: usize, cols: usize },
}

/// Grid dimensions and timing for one rain instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RainConfig {
    pub rows: usize,
    pub cols: usize,
    pub block_size: usize,
    /// Scheduler tick interval in ms.
    pub falling_speed_ms: u64,
    /// How long a marked column shrinks before it is cleared.
    pub shrink_ms: u64,
    pub near_bottom: NearBottomCheck,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            block_size: DEFAULT_BLOCK_SIZE,
            falling_speed_ms: DEFAULT_FALLING_SPEED_MS,
            shrink_ms: DEFAULT_SHRINK_MS,
            near_bottom: NearBottomCheck::default(),
        }
    }
}

impl RainConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.rows == 0 {
            return Err(ConfigError::ZeroRows);
        }
        if self.cols == 0 {
            return Err(ConfigError::ZeroCols);
        }
        let max = usize::from(u16::MAX);
        if self.rows > max || self.cols > max {
            return Err(ConfigError::GridTooLarge {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.falling_speed_ms == 0 {
            return Err(ConfigError::ZeroFallingSpeed);
        }
        Ok(self)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.falling_speed_ms.max(1))
    }

    /// Shrink delay in whole ticks, rounded up, never less than one.
    pub fn shrink_ticks(&self) -> u32 {
        let ticks = self.shrink_ms.div_ceil(self.falling_speed_ms.max(1)).max(1);
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}

/// Per-column state: `Idle -> Falling -> Idle`, or `Falling -> Shrinking -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnState {
    Idle,
    /// Activated mid-fall; enters row 0 on the next fall step.
    Queued,
    /// Leading edge of the block is at this row.
    Falling(usize),
    /// Column keeps its block at `row` while `cell` shrinks away.
    Shrinking { row: usize, cell: usize, ticks_left: u32 },
}

impl ColumnState {
    /// Visible block position, `None` when the column shows nothing.
    pub fn position(self) -> Option<usize> {
        match self {
            Self::Falling(row) | Self::Shrinking { row, .. } => Some(row),
            Self::Idle | Self::Queued => None,
        }
    }

    /// Counts toward the fall: falling or about to fall.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Falling(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Falling,
    /// Every column left the grid; the removal pass runs on the next tick.
    Settled,
    /// A removal pass marked columns; it runs again every tick until they clear.
    Removing,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Active columns moved down one row.
    Fell { near_bottom: bool },
    /// The last active column left the grid.
    Settled,
    /// Removal pass: `marked` columns started shrinking, `pending` are still shrinking.
    Removal { marked: usize, pending: usize },
    /// Removal pass found nothing to thin, so a new fall started with `columns` columns.
    Restarted { columns: usize },
}

/// What a cell shows, derived from column state and round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellShade {
    Empty,
    /// Inside the falling block; index counted from the block's leading edge.
    Block(usize),
    /// Marked cell of a shrinking column, shaded as the last cell of its block.
    Shrinking(usize),
}

/// Completed blocks a position spans. No position, no blocks.
pub fn blocks_in_column(position: Option<usize>, block_size: usize) -> usize {
    position.map_or(0, |pos| pos / block_size.max(1))
}

/// Row of the cell to shrink when a column's block count is a positive multiple of five.
pub fn removal_cell(position: usize, block_size: usize) -> Option<usize> {
    let block_size = block_size.max(1);
    let blocks = blocks_in_column(Some(position), block_size);
    (blocks > 0 && blocks % REMOVAL_GROUP == 0).then(|| (blocks - 1) * block_size + (block_size - 1))
}

/// Falling-block rain over a fixed grid.
#[derive(Debug, Clone)]
pub struct RainGrid {
    config: RainConfig,
    columns: Vec<ColumnState>,
    /// Positions captured when the current fall cycle was started.
    cycle_snapshot: Vec<Option<usize>>,
    round: u32,
    phase: Phase,
    cycles: u64,
    ticks: u64,
}

impl RainGrid {
    /// New grid with its first fall already started.
    pub fn new<R: Rng + ?Sized>(config: RainConfig, rng: &mut R) -> Self {
        let mut grid = Self::empty(config);
        grid.start_falling(rng);
        grid
    }

    /// Grid restored from known positions, settled and waiting for a removal pass.
    /// Positions outside the grid are dropped.
    pub fn from_positions(config: RainConfig, positions: &[Option<usize>]) -> Self {
        let mut grid = Self::empty(config);
        let rows = grid.config.rows;
        for (column, pos) in grid.columns.iter_mut().zip(positions) {
            if let Some(row) = pos.filter(|&row| row < rows) {
                *column = ColumnState::Falling(row);
            }
        }
        grid.phase = Phase::Settled;
        grid
    }

    fn empty(config: RainConfig) -> Self {
        let cols = config.cols;
        Self {
            config,
            columns: vec![ColumnState::Idle; cols],
            cycle_snapshot: vec![None; cols],
            round: 0,
            phase: Phase::Settled,
            cycles: 0,
            ticks: 0,
        }
    }

    pub fn config(&self) -> &RainConfig {
        &self.config
    }

    pub fn columns(&self) -> &[ColumnState] {
        &self.columns
    }

    pub fn position(&self, col: usize) -> Option<usize> {
        self.columns.get(col).and_then(|c| c.position())
    }

    pub fn positions(&self) -> Vec<Option<usize>> {
        self.columns.iter().map(|c| c.position()).collect()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Palette in effect, `0..ROUND_PALETTES`.
    pub fn palette_index(&self) -> usize {
        (self.round % ROUND_PALETTES) as usize
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fall cycles started so far, the current one included.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Change the tick interval; shrinks started later use the new speed.
    pub fn set_falling_speed(&mut self, ms: u64) {
        self.config.falling_speed_ms = ms.max(1);
    }

    /// `(col, row)` of every cell currently shrinking.
    pub fn shrinking_cells(&self) -> Vec<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(col, state)| match *state {
                ColumnState::Shrinking { cell, .. } => Some((col, cell)),
                _ => None,
            })
            .collect()
    }

    /// Advance one scheduler tick.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Transition {
        self.ticks += 1;
        match self.phase {
            Phase::Falling => self.fall_step(rng),
            Phase::Settled | Phase::Removing => self.remove_blocks(rng),
        }
    }

    /// Drop everything and start a new fall at round zero.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.columns.fill(ColumnState::Idle);
        self.round = 0;
        debug!("rain reset after {} cycles", self.cycles);
        self.start_falling(rng);
    }

    /// Recreate the columns and drop 2..=5 random ones from row 0.
    pub fn start_falling<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let cols = self.config.cols;
        self.cycle_snapshot = self.positions();
        self.columns = vec![ColumnState::Idle; cols];

        let count = rng
            .random_range(MIN_START_COLUMNS..=MAX_START_COLUMNS)
            .min(cols);
        for col in sample(rng, cols, count) {
            self.columns[col] = ColumnState::Falling(0);
        }

        self.phase = Phase::Falling;
        self.cycles += 1;
        debug!(
            "fall cycle {} started with {count} columns, round {}",
            self.cycles, self.round
        );
        count
    }

    fn near_bottom_in(&self, positions: impl IntoIterator<Item = usize>) -> bool {
        let threshold = self.config.rows.saturating_sub(NEAR_BOTTOM_ROWS);
        positions.into_iter().any(|pos| pos >= threshold)
    }

    fn active_positions(&self) -> Vec<usize> {
        self.columns
            .iter()
            .filter(|c| c.is_active())
            .filter_map(|c| c.position())
            .collect()
    }

    fn fall_step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Transition {
        let before = match self.config.near_bottom {
            NearBottomCheck::CycleStart => self.near_bottom_in(self.cycle_snapshot.iter().flatten().copied()),
            NearBottomCheck::Lagged => self.near_bottom_in(self.active_positions()),
            NearBottomCheck::Current => false,
        };

        let rows = self.config.rows;
        for column in &mut self.columns {
            *column = match *column {
                ColumnState::Queued => ColumnState::Falling(0),
                ColumnState::Falling(row) if row + 1 < rows => ColumnState::Falling(row + 1),
                ColumnState::Falling(_) => ColumnState::Idle,
                other => other,
            };
        }

        let near_bottom = match self.config.near_bottom {
            NearBottomCheck::Current => self.near_bottom_in(self.active_positions()),
            NearBottomCheck::CycleStart | NearBottomCheck::Lagged => before,
        };
        if near_bottom {
            self.round = (self.round + 1) % ROUND_PALETTES;
            let col = rng.random_range(0..self.config.cols);
            if self.columns[col] == ColumnState::Idle {
                self.columns[col] = ColumnState::Queued;
                trace!("column {col} queued near bottom");
            }
        }

        if self.columns.iter().all(|c| *c == ColumnState::Idle) {
            self.round = self.round.wrapping_add(1);
            self.phase = Phase::Settled;
            debug!("fall cycle {} settled, round {}", self.cycles, self.round);
            return Transition::Settled;
        }

        trace!("fall step {}: {:?}", self.ticks, self.positions());
        Transition::Fell { near_bottom }
    }

    fn remove_blocks<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Transition {
        let rows = self.config.rows;
        let block_size = self.config.block_size;
        let shrink_ticks = self.config.shrink_ticks();
        let mut marked = 0;
        let mut pending = 0;

        for (col, column) in self.columns.iter_mut().enumerate() {
            match *column {
                ColumnState::Shrinking { ticks_left, .. } if ticks_left <= 1 => {
                    *column = ColumnState::Idle;
                    trace!("column {col} cleared");
                }
                ColumnState::Shrinking { row, cell, ticks_left } => {
                    *column = ColumnState::Shrinking { row, cell, ticks_left: ticks_left - 1 };
                    pending += 1;
                }
                ColumnState::Falling(row) => {
                    // Cells that were never part of the grid cannot be marked.
                    if let Some(cell) = removal_cell(row, block_size).filter(|&cell| cell < rows) {
                        *column = ColumnState::Shrinking { row, cell, ticks_left: shrink_ticks };
                        marked += 1;
                    }
                }
                ColumnState::Idle | ColumnState::Queued => {}
            }
        }

        if marked + pending > 0 {
            self.phase = Phase::Removing;
            debug!("removal pass: {marked} marked, {pending} shrinking");
            return Transition::Removal { marked, pending };
        }

        let columns = self.start_falling(rng);
        Transition::Restarted { columns }
    }

    /// Shade of the cell at `(col, row)`.
    pub fn cell_shade(&self, col: usize, row: usize) -> CellShade {
        let Some(column) = self.columns.get(col) else {
            return CellShade::Empty;
        };
        if let ColumnState::Shrinking { cell, .. } = *column {
            if cell == row {
                return CellShade::Shrinking(self.config.block_size.saturating_sub(1));
            }
        }
        match column.position() {
            Some(start) if start <= row && row < start + self.config.block_size => {
                CellShade::Block(row - start)
            }
            _ => CellShade::Empty,
        }
    }
}
