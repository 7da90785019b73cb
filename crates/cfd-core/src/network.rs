//! Port ranges for container-to-container network policies.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// An inclusive TCP port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// Parse `N`, `N-M` or `N-` (the trailing separator is ignored).
    pub fn parse(range: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidPortRange(range.to_string());

        let (start, end) = match range.split_once('-') {
            Some((start, end)) => (start, end),
            None => (range, ""),
        };

        let start: u16 = start.parse().map_err(|_| invalid())?;
        let end: u16 = if end.is_empty() {
            start
        } else {
            end.parse().map_err(|_| invalid())?
        };

        if end < start {
            return Err(invalid());
        }

        Ok(Self { start, end })
    }

    /// Parse every range, failing on the first bad one.
    pub fn parse_all<S: AsRef<str>>(ranges: &[S]) -> Result<Vec<Self>, Error> {
        ranges.iter().map(|r| Self::parse(r.as_ref())).collect()
    }
}

impl FromStr for PortRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ranges() {
        let cases = [
            ("80-85", (80, 85)),
            ("81-81", (81, 81)),
            ("80", (80, 80)),
            ("8-", (8, 8)),
            ("0", (0, 0)),
            ("65535", (65535, 65535)),
        ];

        for (input, (start, end)) in cases {
            let got = PortRange::parse(input).unwrap();
            assert_eq!(got, PortRange { start, end }, "input {input:?}");
        }
    }

    #[test]
    fn test_invalid_ranges() {
        for input in ["60-cat", "cat", "", "-", "-80", "85-80", "70000", "80-85-90", " 80"] {
            let err = PortRange::parse(input).unwrap_err();
            assert!(
                matches!(err, Error::InvalidPortRange(ref s) if s == input),
                "input {input:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_parse_all_stops_on_error() {
        let ok = PortRange::parse_all(&["80", "443-444"]).unwrap();
        assert_eq!(ok.len(), 2);

        assert!(PortRange::parse_all(&["80", "nope"]).is_err());
    }
}
