//! raingrid: falling-block rain over a grid of cells.
//!
//! [`rain`] holds the state machine, [`theme`] the palettes, [`ui`] derives
//! and draws cell colours, and [`input`] maps keys to actions.

pub mod input;
pub mod rain;
pub mod theme;
pub mod ui;
