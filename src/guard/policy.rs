//! Threshold policy: maps a script's line count onto one of four ordered
//! verdicts.
//!
//! The three bounds split `[0, ∞)` into four buckets, each closed on its
//! upper end:
//!
//! ```text
//!   0 ..= snark        Ignore
//!   snark+1 ..= passive Snarky
//!   passive+1 ..= just  Passive
//!   just+1 ..           Justice
//! ```
//!
//! The buckets only partition the line counts when `snark <= passive <= just`;
//! [`Thresholds::validate`] rejects anything else before the watch loop starts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::{GuardError, Result};

/// Outcome of classifying one script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Short enough to leave alone.
    Ignore,
    /// Worth a few remarks.
    Snarky,
    /// Gets its interpreter "fixed".
    Passive,
    /// Goes to the trash.
    Justice,
}

impl Verdict {
    /// Every verdict, in escalation order.
    pub const ALL: [Self; 4] = [Self::Ignore, Self::Snarky, Self::Passive, Self::Justice];

    /// Stable lowercase label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Snarky => "snarky",
            Self::Passive => "passive",
            Self::Justice => "justice",
        }
    }

    /// Whether this verdict mutates or removes the script.
    #[must_use]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::Passive | Self::Justice)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three configured line-count bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Highest line count that is still ignored.
    pub snark: u64,
    /// Highest line count that only draws snark.
    pub passive: u64,
    /// Highest line count that gets rewritten instead of trashed.
    pub just: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            snark: 5,
            passive: 25,
            just: 50,
        }
    }
}

impl Thresholds {
    /// Build bounds, rejecting out-of-order values.
    pub fn new(snark: u64, passive: u64, just: u64) -> Result<Self> {
        let bounds = Self {
            snark,
            passive,
            just,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Check `snark <= passive <= just`.
    pub fn validate(&self) -> Result<()> {
        if self.snark > self.passive {
            return Err(GuardError::InvalidConfig {
                details: format!(
                    "thresholds.snark ({}) must not exceed thresholds.passive ({})",
                    self.snark, self.passive
                ),
            });
        }
        if self.passive > self.just {
            return Err(GuardError::InvalidConfig {
                details: format!(
                    "thresholds.passive ({}) must not exceed thresholds.just ({})",
                    self.passive, self.just
                ),
            });
        }
        Ok(())
    }

    /// Classify a line count against these bounds.
    #[must_use]
    pub const fn classify(&self, length: u64) -> Verdict {
        classify(length, self.snark, self.passive, self.just)
    }
}

impl fmt::Display for Thresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "snark={} passive={} just={}",
            self.snark, self.passive, self.just
        )
    }
}

/// Classify `length` against explicit bounds.
///
/// Bounds are not re-checked here; see [`Thresholds::validate`].
#[must_use]
pub const fn classify(length: u64, snark: u64, passive: u64, just: u64) -> Verdict {
    if length <= snark {
        Verdict::Ignore
    } else if length <= passive {
        Verdict::Snarky
    } else if length <= just {
        Verdict::Passive
    } else {
        Verdict::Justice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_bounds_match_cli_defaults() {
        let t = Thresholds::default();
        assert_eq!((t.snark, t.passive, t.just), (5, 25, 50));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn bucket_edges_are_inclusive_on_the_upper_end() {
        let t = Thresholds::default();
        assert_eq!(t.classify(0), Verdict::Ignore);
        assert_eq!(t.classify(5), Verdict::Ignore);
        assert_eq!(t.classify(6), Verdict::Snarky);
        assert_eq!(t.classify(25), Verdict::Snarky);
        assert_eq!(t.classify(26), Verdict::Passive);
        assert_eq!(t.classify(50), Verdict::Passive);
        assert_eq!(t.classify(51), Verdict::Justice);
        assert_eq!(t.classify(u64::MAX), Verdict::Justice);
    }

    #[test]
    fn equal_bounds_collapse_middle_buckets() {
        let t = Thresholds::new(10, 10, 10).expect("equal bounds are ordered");
        assert_eq!(t.classify(10), Verdict::Ignore);
        assert_eq!(t.classify(11), Verdict::Justice);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = Thresholds::new(30, 25, 50).expect_err("snark > passive");
        assert_eq!(err.code(), "BG-1001");
        assert!(err.to_string().contains("thresholds.snark"));

        let err = Thresholds::new(5, 60, 50).expect_err("passive > just");
        assert!(err.to_string().contains("thresholds.passive"));
    }

    #[test]
    fn verdicts_escalate_in_order() {
        assert!(Verdict::Ignore < Verdict::Snarky);
        assert!(Verdict::Snarky < Verdict::Passive);
        assert!(Verdict::Passive < Verdict::Justice);
        assert!(!Verdict::Snarky.is_destructive());
        assert!(Verdict::Justice.is_destructive());
        assert_eq!(Verdict::Passive.to_string(), "passive");
    }

    fn ordered_bounds() -> impl Strategy<Value = (u64, u64, u64)> {
        (0u64..500, 0u64..500, 0u64..500).prop_map(|(a, b, c)| {
            let mut v = [a, b, c];
            v.sort_unstable();
            (v[0], v[1], v[2])
        })
    }

    proptest! {
        #[test]
        fn buckets_partition_line_counts((s, p, j) in ordered_bounds(), len in 0u64..2_000) {
            let verdict = classify(len, s, p, j);
            let expected = [
                (len <= s, Verdict::Ignore),
                (s < len && len <= p, Verdict::Snarky),
                (p < len && len <= j, Verdict::Passive),
                (len > j, Verdict::Justice),
            ];
            let matching: Vec<Verdict> = expected
                .iter()
                .filter(|(hit, _)| *hit)
                .map(|(_, v)| *v)
                .collect();
            prop_assert_eq!(matching, vec![verdict]);
        }

        #[test]
        fn classification_is_monotonic((s, p, j) in ordered_bounds(), len in 0u64..2_000) {
            prop_assert!(classify(len, s, p, j) <= classify(len + 1, s, p, j));
        }

        #[test]
        fn boundary_cases_hold((s, p, j) in ordered_bounds()) {
            prop_assert_eq!(classify(s, s, p, j), Verdict::Ignore);
            prop_assert_eq!(classify(j + 1, s, p, j), Verdict::Justice);
            if s < p {
                prop_assert_eq!(classify(s + 1, s, p, j), Verdict::Snarky);
                prop_assert_eq!(classify(p, s, p, j), Verdict::Snarky);
            }
            if p < j {
                prop_assert_eq!(classify(p + 1, s, p, j), Verdict::Passive);
                prop_assert_eq!(classify(j, s, p, j), Verdict::Passive);
            }
        }
    }
}
