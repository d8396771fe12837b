//! Wait time between section fetches
//!
//! A wait is counted in section loop ticks.

use serde::Deserialize;

/// Produces the number of ticks to wait after parsing a section
pub trait TimeGenerator: Send + Sync {
    fn generate(&self, length: usize) -> usize;
}

/// Constant wait, independent of section length
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortTimeGenerator;

const SHORT_WAIT_TICKS: usize = 15;

impl TimeGenerator for ShortTimeGenerator {
    fn generate(&self, _length: usize) -> usize {
        SHORT_WAIT_TICKS
    }
}

/// Simulates a person reading the section before moving on
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderTimeGenerator;

const READER_MIN_LOOPS: usize = 40;
const READER_SHORT_SECTION: usize = 20;

impl TimeGenerator for ReaderTimeGenerator {
    fn generate(&self, length: usize) -> usize {
        let loops = if length <= READER_SHORT_SECTION {
            READER_MIN_LOOPS
        } else {
            length
        };

        (0..loops).map(|_| 3 + fastrand::usize(0..=2)).sum()
    }
}

/// Pacing selection from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingStrategy {
    #[default]
    Short,
    Reader,
}

impl PacingStrategy {
    pub fn wait_ticks(&self, length: usize) -> usize {
        match self {
            Self::Short => ShortTimeGenerator.generate(length),
            Self::Reader => ReaderTimeGenerator.generate(length),
        }
    }
}
