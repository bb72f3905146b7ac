//! Outer-totalistic rules over the 26-cell Moore neighbourhood.
//!
//! Rules are written in the usual `B…/S…` notation (`B6/S567`). Once any
//! count exceeds 9 the counts must be comma separated (`B5,14/S10,11`).

use core::fmt;
use core::str::FromStr;

use crate::error::Error;

/// Largest neighbour count in a 3D Moore neighbourhood.
pub const MAX_NEIGHBORS: u8 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rule {
    birth: u32,
    survive: u32,
}

impl Rule {
    /// Carter Bays' "Life 5766": birth on exactly 6, survival on 5, 6 or 7.
    pub const B6_S567: Rule = Rule {
        birth: 1 << 6,
        survive: (1 << 5) | (1 << 6) | (1 << 7),
    };

    pub fn new(birth: &[u8], survive: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            birth: mask_of(birth)?,
            survive: mask_of(survive)?,
        })
    }

    #[inline]
    pub fn births(&self, neighbors: u8) -> bool {
        neighbors <= MAX_NEIGHBORS && self.birth & (1u32 << neighbors) != 0
    }

    #[inline]
    pub fn survives(&self, neighbors: u8) -> bool {
        neighbors <= MAX_NEIGHBORS && self.survive & (1u32 << neighbors) != 0
    }

    /// State of a cell in the next generation.
    #[inline]
    pub fn next_state(&self, alive: bool, neighbors: u8) -> bool {
        if alive {
            self.survives(neighbors)
        } else {
            self.births(neighbors)
        }
    }
}

impl Default for Rule {
    fn default() -> Self {
        Rule::B6_S567
    }
}

fn mask_of(counts: &[u8]) -> Result<u32, Error> {
    counts.iter().try_fold(0u32, |mask, &n| {
        if n > MAX_NEIGHBORS {
            Err(Error::InvalidRule(format!("neighbor count {n} out of range")))
        } else {
            Ok(mask | (1u32 << n))
        }
    })
}

fn parse_counts(part: &str) -> Result<Vec<u8>, Error> {
    if part.contains(',') {
        return part
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.trim()
                    .parse::<u8>()
                    .map_err(|_| Error::InvalidRule(part.to_string()))
            })
            .collect();
    }
    part.chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or_else(|| Error::InvalidRule(part.to_string()))
        })
        .collect()
}

fn format_mask(mask: u32) -> String {
    let counts: Vec<u8> = (0..=MAX_NEIGHBORS).filter(|&n| mask & (1u32 << n) != 0).collect();
    if counts.iter().any(|&n| n > 9) {
        counts
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(",")
    } else {
        counts.iter().map(|n| n.to_string()).collect()
    }
}

impl FromStr for Rule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (b, sv) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::InvalidRule(s.to_string()))?;
        let b = b
            .strip_prefix('B')
            .or_else(|| b.strip_prefix('b'))
            .ok_or_else(|| Error::InvalidRule(s.to_string()))?;
        let sv = sv
            .strip_prefix('S')
            .or_else(|| sv.strip_prefix('s'))
            .ok_or_else(|| Error::InvalidRule(s.to_string()))?;
        Rule::new(&parse_counts(b)?, &parse_counts(sv)?)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}/S{}", format_mask(self.birth), format_mask(self.survive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bays_rule_thresholds() {
        let r = Rule::B6_S567;
        assert!(r.births(6));
        assert!(!r.births(5));
        assert!(!r.births(7));
        for n in 5..=7 {
            assert!(r.survives(n));
        }
        assert!(!r.survives(4));
        assert!(!r.survives(8));
        assert!(!r.next_state(true, 26));
    }

    #[test]
    fn parses_and_formats_notation() {
        let r: Rule = "B6/S567".parse().unwrap();
        assert_eq!(r, Rule::B6_S567);
        assert_eq!(r.to_string(), "B6/S567");

        let wide: Rule = "B5,14/S10,11".parse().unwrap();
        assert!(wide.births(14));
        assert!(wide.survives(10));
        assert_eq!(wide.to_string(), "B5,14/S10,11");
    }

    #[test]
    fn rejects_bad_notation() {
        assert!("6/567".parse::<Rule>().is_err());
        assert!("B6S567".parse::<Rule>().is_err());
        assert!("B27,3/S5".parse::<Rule>().is_err());
        assert!("Bx/S5".parse::<Rule>().is_err());
    }
}
