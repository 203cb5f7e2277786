//! Lineage keys: `<acronym><YY><MM>`, e.g. `AC2301`.
//!
//! Two-digit years are resolved with a fixed century boundary:
//! 80..=99 -> 19xx, 00..=79 -> 20xx. Keys from 2080 on (or before 1980)
//! cannot be represented.

use crate::catalog::Period;
use crate::{LineageError, Result};

use regex::Regex;
use serde::Serialize;
use std::str::FromStr;

// Capture:
// 1) acronym: letters
// 2) year: two digits
// 3) month: two digits
const KEY_RE: &str = r"^([A-Za-z]+)(\d{2})(\d{2})$";

/// Decoded lineage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageKey {
    pub raw: String,
    pub acronym: String,
    pub year2: u32,
    pub month: u32,
}

impl LineageKey {
    /// Decode with the acronym occupying exactly `prefix_len` characters.
    pub fn parse(key: &str, prefix_len: usize) -> Result<Self> {
        let acronym = key
            .get(..prefix_len)
            .ok_or_else(|| LineageError::parse(key, "shorter than its prefix"))?;
        let year = key
            .get(prefix_len..prefix_len + 2)
            .ok_or_else(|| LineageError::parse(key, "missing two-digit year"))?;
        let month = key
            .get(prefix_len + 2..prefix_len + 4)
            .ok_or_else(|| LineageError::parse(key, "missing two-digit month"))?;
        if key.len() != prefix_len + 4 {
            return Err(LineageError::parse(
                key,
                format!("expected {} characters", prefix_len + 4),
            ));
        }
        Self::from_parts(key, acronym, year, month)
    }

    fn from_parts(key: &str, acronym: &str, year: &str, month: &str) -> Result<Self> {
        let year2 = two_digits(key, year, "year")?;
        let month = two_digits(key, month, "month")?;
        if !(1..=12).contains(&month) {
            return Err(LineageError::parse(
                key,
                format!("month {:02} outside 01-12", month),
            ));
        }
        Ok(Self {
            raw: key.to_string(),
            acronym: acronym.to_string(),
            year2,
            month,
        })
    }

    pub fn year(&self) -> i32 {
        resolve_century(self.year2)
    }

    pub fn period(&self) -> Period {
        Period::new(self.year(), self.month)
    }
}

/// Infers the prefix: leading letters, then YYMM.
impl FromStr for LineageKey {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        let re = Regex::new(KEY_RE).map_err(|e| LineageError::parse(s, e.to_string()))?;
        let caps = re
            .captures(s)
            .ok_or_else(|| LineageError::parse(s, "expected <letters><YY><MM>"))?;
        let part = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
        Self::from_parts(s, part(1), part(2), part(3))
    }
}

/// Parse a key into its calendar period.
pub fn parse_key(key: &str, prefix_len: usize) -> Result<Period> {
    LineageKey::parse(key, prefix_len).map(|k| k.period())
}

pub fn resolve_century(year2: u32) -> i32 {
    // year2 is always 0..=99 here.
    let y = year2 as i32;
    if (80..=99).contains(&y) { 1900 + y } else { 2000 + y }
}

fn two_digits(key: &str, s: &str, what: &str) -> Result<u32> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LineageError::parse(
            key,
            format!("{} {:?} is not two digits", what, s),
        ));
    }
    s.parse()
        .map_err(|_| LineageError::parse(key, format!("bad {} {:?}", what, s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn century_boundary() {
        assert_eq!(parse_key("AC8001", 2).unwrap(), Period::new(1980, 1));
        assert_eq!(parse_key("AC2512", 2).unwrap(), Period::new(2025, 12));
        assert_eq!(parse_key("AC9906", 2).unwrap(), Period::new(1999, 6));
        assert_eq!(parse_key("AC0003", 2).unwrap(), Period::new(2000, 3));
        assert_eq!(parse_key("AC7911", 2).unwrap(), Period::new(2079, 11));
    }

    #[test]
    fn prefix_length_shifts_offsets() {
        let key = LineageKey::parse("SIHRD2207", 5).unwrap();
        assert_eq!(key.acronym, "SIHRD");
        assert_eq!(key.period(), Period::new(2022, 7));
    }

    #[test]
    fn rejects_bad_months() {
        assert!(matches!(
            parse_key("AC2313", 2),
            Err(LineageError::Parse { .. })
        ));
        assert!(matches!(
            parse_key("AC2300", 2),
            Err(LineageError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_malformed_keys() {
        for key in ["AC23", "AC2x01", "AC230", "AC230101", "", "AC+123"] {
            assert!(parse_key(key, 2).is_err(), "{} should not parse", key);
        }
        // Multi-byte input must error, not panic on a char boundary.
        assert!(parse_key("Ação01", 2).is_err());
    }

    #[test]
    fn from_str_infers_prefix() {
        let key: LineageKey = "RDAC9912".parse().unwrap();
        assert_eq!(key.acronym, "RDAC");
        assert_eq!(key.year(), 1999);
        assert_eq!(key.month, 12);
        assert!("2301".parse::<LineageKey>().is_err());
    }
}
