//! Scripture reference value objects.
//!
//! Value objects here are immutable and compared by value. They carry the
//! validation the submission path depends on: a surah number must fall in
//! 1..=114 and a verse reference must be a single verse, a contiguous span
//! ("1-7") or a comma-separated list ("1,3,5").

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Surah (chapter) number, 1..=114.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurahNumber(u8);

impl SurahNumber {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 114;

    pub fn new(n: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&n) {
            Ok(Self(n))
        } else {
            Err(DomainError::validation(
                "Invalid surah number (must be 1-114)",
            ))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl core::fmt::Display for SurahNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SurahNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u8 = s
            .trim()
            .parse()
            .map_err(|_| DomainError::validation("Invalid surah number (must be 1-114)"))?;
        Self::new(n)
    }
}

/// Verse reference within a surah.
///
/// Accepted textual forms: `"5"`, `"1-7"`, `"1,3,5"`. `Display` round-trips
/// the canonical form of each variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VerseRange {
    Single(u32),
    Span { from: u32, to: u32 },
    List(Vec<u32>),
}

impl VerseRange {
    pub fn span(from: u32, to: u32) -> Result<Self, DomainError> {
        if from == 0 || to < from {
            return Err(DomainError::validation("Invalid verse range format"));
        }
        Ok(Self::Span { from, to })
    }

    /// First verse covered by the reference.
    pub fn first(&self) -> u32 {
        match self {
            Self::Single(v) => *v,
            Self::Span { from, .. } => *from,
            Self::List(vs) => vs.first().copied().unwrap_or(0),
        }
    }
}

impl core::fmt::Display for VerseRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Single(v) => write!(f, "{v}"),
            Self::Span { from, to } => write!(f, "{from}-{to}"),
            Self::List(vs) => {
                let joined = vs
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{joined}")
            }
        }
    }
}

impl FromStr for VerseRange {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation("Invalid verse range format");
        let s = s.trim();
        if s.is_empty() {
            return Err(invalid());
        }

        if let Some((from, to)) = s.split_once('-') {
            let from: u32 = from.parse().map_err(|_| invalid())?;
            let to: u32 = to.parse().map_err(|_| invalid())?;
            return Self::span(from, to);
        }

        if s.contains(',') {
            let verses = s
                .split(',')
                .map(|part| part.parse::<u32>().map_err(|_| invalid()))
                .collect::<Result<Vec<u32>, _>>()?;
            if verses.iter().any(|v| *v == 0) {
                return Err(invalid());
            }
            return Ok(Self::List(verses));
        }

        let v: u32 = s.parse().map_err(|_| invalid())?;
        if v == 0 {
            return Err(invalid());
        }
        Ok(Self::Single(v))
    }
}

impl TryFrom<String> for VerseRange {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VerseRange> for String {
    fn from(value: VerseRange) -> Self {
        value.to_string()
    }
}
