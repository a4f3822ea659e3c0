use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Codepoint used when a fixed pool ends up with no characters at all.
pub const PLACEHOLDER: char = '*';

/// Source used when every fixed source is empty or whitespace.
pub const FALLBACK_SOURCE: &str = "0123456789";

/// Character families available to the random fill mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    /// Katakana mixed with digits and capitals, uniform over codepoints
    /// (roughly seven in ten are katakana).
    #[default]
    Matrix,
    Katakana,
    Hiragana,
    Latin,
    Digits,
    Binary,
    Hex,
    Greek,
    Blocks,
    Symbols,
}

impl Script {
    /// Inclusive codepoint ranges making up the script.
    pub fn ranges(self) -> &'static [(u32, u32)] {
        match self {
            Script::Matrix => &[(0x30A1, 0x30F6), (0x30, 0x39), (0x41, 0x5A)],
            Script::Katakana => &[(0x30A1, 0x30F6)],
            Script::Hiragana => &[(0x3041, 0x3096)],
            Script::Latin => &[(0x41, 0x5A), (0x61, 0x7A)],
            Script::Digits => &[(0x30, 0x39)],
            Script::Binary => &[(0x30, 0x31)],
            Script::Hex => &[(0x30, 0x39), (0x41, 0x46)],
            Script::Greek => &[(0x0391, 0x03A1), (0x03A3, 0x03A9), (0x03B1, 0x03C9)],
            Script::Blocks => &[(0x2580, 0x259F)],
            Script::Symbols => &[(0x21, 0x2F), (0x3A, 0x40), (0x5B, 0x60), (0x7B, 0x7E)],
        }
    }

    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> u32 {
        let ranges = self.ranges();
        let total: u32 = ranges.iter().map(|(lo, hi)| hi - lo + 1).sum();
        let mut pick = rng.gen_range(0..total);
        for &(lo, hi) in ranges {
            let span = hi - lo + 1;
            if pick < span {
                return lo + pick;
            }
            pick -= span;
        }
        ranges[0].0
    }

    pub fn contains(self, codepoint: u32) -> bool {
        self.ranges().iter().any(|&(lo, hi)| (lo..=hi).contains(&codepoint))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Pool characters run along rows.
    #[default]
    Horizontal,
    /// Pool characters run down columns.
    Vertical,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Random,
    Fixed,
}

/// Characters cycled through by the fixed fill mode. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharPool {
    codepoints: Vec<u32>,
}

impl CharPool {
    pub fn new(codepoints: Vec<u32>) -> Self {
        if codepoints.is_empty() {
            return Self { codepoints: vec![PLACEHOLDER as u32] };
        }
        Self { codepoints }
    }

    /// Concatenates the sources in order. Control characters are skipped so
    /// multi-line sources cycle through their visible text only.
    pub fn from_sources<S: AsRef<str>>(sources: &[S]) -> Self {
        let joined: String = sources.iter().map(AsRef::as_ref).collect();
        let text = if joined.trim().is_empty() {
            warn!("fixed fill sources are blank, using fallback pool");
            FALLBACK_SOURCE
        } else {
            joined.as_str()
        };

        Self::new(text.chars().filter(|ch| !ch.is_control()).map(u32::from).collect())
    }

    pub fn len(&self) -> usize {
        self.codepoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codepoints.is_empty()
    }

    pub fn at(&self, index: usize) -> u32 {
        self.codepoints[index % self.codepoints.len()]
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        self.codepoints[rng.gen_range(0..self.codepoints.len())]
    }
}

/// How cells pick their characters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fill {
    Random(Script),
    Fixed { pool: CharPool, orientation: Orientation },
}

impl Fill {
    /// Codepoint assigned to a cell when the grid is built.
    pub fn baseline<R: Rng + ?Sized>(
        &self,
        col: usize,
        row: usize,
        cols: usize,
        rows: usize,
        rng: &mut R,
    ) -> u32 {
        match self {
            Fill::Random(script) => script.sample(rng),
            Fill::Fixed { pool, orientation: Orientation::Horizontal } => pool.at(row * cols + col),
            Fill::Fixed { pool, orientation: Orientation::Vertical } => pool.at(col * rows + row),
        }
    }

    /// Fresh codepoint for a cell struck by a drop.
    pub fn strike<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match self {
            Fill::Random(script) => script.sample(rng),
            Fill::Fixed { pool, .. } => pool.sample(rng),
        }
    }

    /// Only fixed text has a canonical character to return to after a trail fades.
    pub fn restores_baseline(&self) -> bool {
        matches!(self, Fill::Fixed { .. })
    }
}

pub fn to_char(codepoint: u32) -> char {
    char::from_u32(codepoint).unwrap_or(PLACEHOLDER)
}
