//! Colours: round palettes, background and frame, optional btop-style theme file.

use crate::rain::ROUND_PALETTES;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Shades per palette.
pub const PALETTE_SIZE: usize = 6;

/// Default palettes, one per round modulo three: green, yellow, blue.
pub const DEFAULT_PALETTES: [[u32; PALETTE_SIZE]; ROUND_PALETTES as usize] = [
    [0x06_3b_00, 0x0a_5d_00, 0x08_90_00, 0x1f_c6_00, 0x0e_ff_00, 0x9b_ec_00],
    [0x33_33_00, 0x66_66_00, 0x99_99_00, 0xcc_cc_00, 0xff_ff_00, 0xff_ff_33],
    [0x00_28_55, 0x02_3e_7d, 0x03_53_a4, 0x04_66_c8, 0x6f_00_ff, 0x4b_00_82],
];

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

const fn palette(hexes: [u32; PALETTE_SIZE]) -> [Color; PALETTE_SIZE] {
    [
        rgb(hexes[0]),
        rgb(hexes[1]),
        rgb(hexes[2]),
        rgb(hexes[3]),
        rgb(hexes[4]),
        rgb(hexes[5]),
    ]
}

/// Grid colours loaded from defaults or a theme file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Block shades per round (`round % 3`), indexed by position in the block.
    pub palettes: [[Color; PALETTE_SIZE]; ROUND_PALETTES as usize],
    /// Empty cells.
    pub bg: Color,
    /// Border.
    pub div_line: Color,
    /// Status line text.
    pub main_fg: Color,
    pub title: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::rain_default()
    }
}

impl Theme {
    /// Green, yellow and blue rounds on black.
    pub const fn rain_default() -> Self {
        Self {
            palettes: [
                palette(DEFAULT_PALETTES[0]),
                palette(DEFAULT_PALETTES[1]),
                palette(DEFAULT_PALETTES[2]),
            ],
            bg: Color::Rgb(0, 0, 0),
            div_line: rgb(0x3f_44_4f),
            main_fg: rgb(0xab_b2_bf),
            title: rgb(0x0e_ff_00),
        }
    }

    /// Load a theme file of `theme[key]="value"` lines.
    /// A missing path gives the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default()),
        };
        let s = std::fs::read_to_string(path)?;
        Ok(Self::from_map(&parse_theme_file(&s)))
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let mut theme = Self::default();
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        if let Some(c) = get("rain_bg").or_else(|| get("main_bg")) {
            theme.bg = c;
        }
        if let Some(c) = get("div_line") {
            theme.div_line = c;
        }
        if let Some(c) = get("main_fg") {
            theme.main_fg = c;
        }
        if let Some(c) = get("title") {
            theme.title = c;
        }
        for (i, slot) in theme.palettes.iter_mut().enumerate() {
            if let Some(p) = map.get(&format!("palette{}", i + 1)).and_then(|v| parse_palette(v)) {
                *slot = p;
            }
        }
        theme
    }

    /// Shade for a block cell: `palettes[round % 3][block_index % 6]`.
    #[inline]
    pub fn block_color(&self, round: u32, block_index: usize) -> Color {
        self.palettes[(round % ROUND_PALETTES) as usize][block_index % PALETTE_SIZE]
    }
}

/// Six whitespace-separated hex colours, or nothing.
fn parse_palette(s: &str) -> Option<[Color; PALETTE_SIZE]> {
    let colors: Vec<Color> = s
        .split_whitespace()
        .map(parse_hex)
        .collect::<Result<_, _>>()
        .ok()?;
    colors.try_into().ok()
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let rest = line.strip_prefix("theme[")?;
            let (key, rest) = rest.split_once(']')?;
            let (_, value) = rest.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'').trim();
            (!value.is_empty()).then(|| (key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let digits = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(digits.to_string());
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|d| u8::from_str_radix(d, 16).ok())
            .ok_or_else(invalid)
    };
    match digits.len() {
        6 => Ok(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => Ok(Color::Rgb(
            channel(0..1)? * 17,
            channel(1..2)? * 17,
            channel(2..3)? * 17,
        )),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#063b00").unwrap();
        assert!(matches!(c, Color::Rgb(0x06, 0x3b, 0x00)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#zzzzzz").is_err());
    }

    #[test]
    fn test_first_shade_of_each_round() {
        let theme = Theme::default();
        assert_eq!(theme.block_color(0, 0), parse_hex("#063b00").unwrap());
        assert_eq!(theme.block_color(1, 0), parse_hex("#333300").unwrap());
        assert_eq!(theme.block_color(2, 0), parse_hex("#002855").unwrap());
        assert_eq!(theme.block_color(3, 0), theme.block_color(0, 0));
    }

    #[test]
    fn test_block_index_wraps_palette() {
        let theme = Theme::default();
        assert_eq!(theme.block_color(0, 5), parse_hex("#9BEC00").unwrap());
        assert_eq!(theme.block_color(0, 6), theme.block_color(0, 0));
        assert_eq!(theme.block_color(2, 10), parse_hex("#6F00FF").unwrap());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[rain_bg]="#101010""##);
        assert_eq!(map.get("rain_bg"), Some(&"#101010".to_string()));
    }

    #[test]
    fn test_palette_override_from_theme_file() {
        let map = parse_theme_file(
            "# comment\n\
             theme[palette2]=\"#111111 #222222 #333333 #444444 #555555 #666666\"\n\
             theme[palette3]=\"#111111 #222222\"\n\
             theme[title]='#ABCDEF'\n",
        );
        let theme = Theme::from_map(&map);
        assert_eq!(theme.block_color(1, 0), Color::Rgb(0x11, 0x11, 0x11));
        assert_eq!(theme.block_color(1, 5), Color::Rgb(0x66, 0x66, 0x66));
        // Short palette is ignored.
        assert_eq!(theme.block_color(2, 0), parse_hex("#002855").unwrap());
        assert_eq!(theme.title, Color::Rgb(0xAB, 0xCD, 0xEF));
        assert_eq!(theme.bg, Color::Rgb(0, 0, 0));
    }

    #[test]
    fn test_missing_theme_path_uses_defaults() {
        let theme = Theme::load(Some(Path::new("/nonexistent/raingrid.theme"))).unwrap();
        assert_eq!(theme, Theme::default());
    }
}
