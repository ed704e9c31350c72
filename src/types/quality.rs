//! Compression quality setting

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::StreamError;

/// Compression quality in the range 1..=100 (higher is better, larger frames)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MIN: Quality = Quality(1);
    pub const MAX: Quality = Quality(100);

    /// Create a quality value, rejecting anything outside 1..=100
    pub fn new(value: u8) -> Result<Self, StreamError> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Quality(value))
        } else {
            Err(StreamError::config("quality", format!("{} is outside 1..=100", value)))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Significant bits kept per 8-bit channel: 4 at quality 1, 8 at quality 100
    pub fn significant_bits(self) -> u8 {
        4 + ((self.0 as u32 * 4 + 50) / 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality(80)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Quality {
    type Error = StreamError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_enforced() {
        assert!(Quality::new(0).is_err());
        assert!(Quality::new(101).is_err());
        assert_eq!(Quality::new(1).unwrap(), Quality::MIN);
        assert_eq!(Quality::new(100).unwrap(), Quality::MAX);
    }

    #[test]
    fn significant_bits_are_monotonic() {
        let mut last = 0;
        for q in 1..=100 {
            let bits = Quality::new(q).unwrap().significant_bits();
            assert!((4..=8).contains(&bits));
            assert!(bits >= last);
            last = bits;
        }
        assert_eq!(Quality::MAX.significant_bits(), 8);
        assert_eq!(Quality::default().significant_bits(), 7);
    }
}
