//! Frequent explanatory subspaces
//!
//! Each outlier's subspace is a transaction of metric names. Itemsets are
//! enumerated depth-first over vertical tid-lists (Eclat): extending a prefix
//! intersects tid-lists, and a branch is cut as soon as its support drops below
//! the floor, since support can only shrink as itemsets grow.
//!
//! # References
//!
//! Zaki, M. J. (2000). Scalable algorithms for association mining.
//! IEEE Transactions on Knowledge and Data Engineering, 12(3), 372-390.

use crate::error::{EngineError, Result};
use crate::explainer::Subspace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum support for an itemset to be reported
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinSupport {
    /// Fraction of the outlier population, in `(0, 1]`
    Fraction(f64),
    /// Absolute number of outliers
    Absolute(usize),
}

impl Default for MinSupport {
    fn default() -> Self {
        MinSupport::Fraction(0.05)
    }
}

impl MinSupport {
    /// Parse the signed command-line convention: positive values are
    /// percentages of the outliers, negative values absolute counts.
    ///
    /// `5` → 5% of outliers, `-2` → at least two outliers.
    pub fn from_signed(value: f64) -> Result<Self> {
        if value.is_nan() || value == 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "minimum support must be non-zero, got {}",
                value
            )));
        }
        let support = if value > 0.0 {
            MinSupport::Fraction(value / 100.0)
        } else {
            MinSupport::Absolute((-value).ceil() as usize)
        };
        support.validate()?;
        Ok(support)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            MinSupport::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(EngineError::InvalidConfig(
                format!("relative minimum support must be in (0, 1], got {}", f),
            )),
            MinSupport::Absolute(0) => Err(EngineError::InvalidConfig(
                "absolute minimum support must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Minimum support count for a population of `n` outliers
    pub fn resolve(&self, n: usize) -> Result<usize> {
        self.validate()?;
        Ok(match *self {
            // guard against 0.1 * 30 = 3.0000000000000004
            MinSupport::Fraction(f) => ((f * n as f64 - 1e-9).ceil() as usize).max(1),
            MinSupport::Absolute(count) => count,
        })
    }
}

/// An itemset of metrics and the number of outliers whose subspace contains it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequentSubspace {
    pub subspace: Subspace,
    pub support: usize,
}

/// Frequent itemset miner over outlier subspaces
#[derive(Debug, Clone, Copy)]
pub struct SubspaceMiner {
    min_support: MinSupport,
    min_length: usize,
    max_length: Option<usize>,
}

impl SubspaceMiner {
    pub fn new(min_support: MinSupport, min_length: usize) -> Self {
        Self {
            min_support,
            min_length,
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    /// Mine every itemset at or above the support and length floors
    ///
    /// Ordered by descending support, then ascending size, then metric names.
    pub fn mine(&self, subspaces: &[Subspace]) -> Result<Vec<FrequentSubspace>> {
        if self.min_length == 0 {
            return Err(EngineError::InvalidConfig(
                "minimum itemset length must be at least 1".to_string(),
            ));
        }
        if let Some(max) = self.max_length {
            if max < self.min_length {
                return Err(EngineError::InvalidConfig(format!(
                    "maximum itemset length {} is below the minimum {}",
                    max, self.min_length
                )));
            }
        }
        let floor = self.min_support.resolve(subspaces.len())?;

        let mut tidlists: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (tid, subspace) in subspaces.iter().enumerate() {
            for item in subspace.iter() {
                tidlists.entry(item).or_default().push(tid);
            }
        }
        let frequent_items: Vec<(&str, Vec<usize>)> = tidlists
            .into_iter()
            .filter(|(_, tids)| tids.len() >= floor)
            .collect();

        let mut found = Vec::new();
        let mut prefix = Vec::new();
        self.extend(&mut prefix, &frequent_items, floor, &mut found);

        found.sort_by(|a, b| {
            b.support
                .cmp(&a.support)
                .then(a.subspace.len().cmp(&b.subspace.len()))
                .then_with(|| a.subspace.cmp(&b.subspace))
        });

        tracing::debug!(
            transactions = subspaces.len(),
            floor,
            min_length = self.min_length,
            itemsets = found.len(),
            "mined frequent outlier subspaces"
        );

        Ok(found)
    }

    fn extend<'s>(
        &self,
        prefix: &mut Vec<&'s str>,
        candidates: &[(&'s str, Vec<usize>)],
        floor: usize,
        found: &mut Vec<FrequentSubspace>,
    ) {
        for (pos, (item, tids)) in candidates.iter().enumerate() {
            prefix.push(*item);

            if prefix.len() >= self.min_length {
                found.push(FrequentSubspace {
                    subspace: prefix.iter().copied().collect(),
                    support: tids.len(),
                });
            }

            if self.max_length.map_or(true, |max| prefix.len() < max) {
                let next: Vec<(&'s str, Vec<usize>)> = candidates[pos + 1..]
                    .iter()
                    .filter_map(|(other, other_tids)| {
                        let shared = intersect(tids, other_tids);
                        (shared.len() >= floor).then_some((*other, shared))
                    })
                    .collect();
                if !next.is_empty() {
                    self.extend(prefix, &next, floor, found);
                }
            }

            prefix.pop();
        }
    }
}

/// Intersection of two ascending tid-lists
fn intersect(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Mine frequent subspaces without a length cap
pub fn mine(
    subspaces: &[Subspace],
    min_support: MinSupport,
    min_length: usize,
) -> Result<Vec<FrequentSubspace>> {
    SubspaceMiner::new(min_support, min_length).mine(subspaces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subspace(items: &[&str]) -> Subspace {
        items.iter().copied().collect()
    }

    fn transactions() -> Vec<Subspace> {
        vec![
            subspace(&["A", "B"]),
            subspace(&["A", "B"]),
            subspace(&["A"]),
            subspace(&["B", "C"]),
        ]
    }

    #[test]
    fn test_absolute_support_scenario() {
        let result = mine(&transactions(), MinSupport::Absolute(2), 1).unwrap();
        let expected = vec![
            FrequentSubspace {
                subspace: subspace(&["A"]),
                support: 3,
            },
            FrequentSubspace {
                subspace: subspace(&["B"]),
                support: 3,
            },
            FrequentSubspace {
                subspace: subspace(&["A", "B"]),
                support: 2,
            },
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn test_min_length_filters_singletons() {
        let result = mine(&transactions(), MinSupport::Absolute(1), 2).unwrap();
        let sets: Vec<String> = result.iter().map(|f| f.subspace.to_string()).collect();
        assert_eq!(sets, vec!["A, B", "B, C"]);
        assert_eq!(result[0].support, 2);
        assert_eq!(result[1].support, 1);
    }

    #[test]
    fn test_max_length_caps_itemsets() {
        let miner = SubspaceMiner::new(MinSupport::Absolute(1), 1).with_max_length(Some(1));
        let result = miner.mine(&transactions()).unwrap();
        assert!(result.iter().all(|f| f.subspace.len() == 1));
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_relative_support() {
        // 50% of 4 outliers = 2
        let result = mine(&transactions(), MinSupport::Fraction(0.5), 1).unwrap();
        assert_eq!(result.len(), 3);
        // 75% of 4 = 3
        let result = mine(&transactions(), MinSupport::Fraction(0.75), 1).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_support_equals_superset_count() {
        let subspaces = vec![
            subspace(&["m1", "m2", "m3"]),
            subspace(&["m1", "m3"]),
            subspace(&["m2", "m3", "m4"]),
            subspace(&["m1", "m2", "m3", "m4"]),
            subspace(&["m3"]),
        ];
        for f in mine(&subspaces, MinSupport::Absolute(1), 1).unwrap() {
            let count = subspaces.iter().filter(|s| s.is_superset(&f.subspace)).count();
            assert_eq!(f.support, count, "itemset {}", f.subspace);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(mine(&[], MinSupport::default(), 1).unwrap().is_empty());
        assert!(mine(&transactions(), MinSupport::Absolute(10), 1)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_from_signed() {
        assert_eq!(MinSupport::from_signed(5.0).unwrap(), MinSupport::Fraction(0.05));
        assert_eq!(MinSupport::from_signed(-2.0).unwrap(), MinSupport::Absolute(2));
        assert!(MinSupport::from_signed(0.0).is_err());
        assert!(MinSupport::from_signed(150.0).is_err());
        assert!(MinSupport::from_signed(f64::NAN).is_err());
    }

    #[test]
    fn test_resolve() {
        assert_eq!(MinSupport::Fraction(0.1).resolve(30).unwrap(), 3);
        assert_eq!(MinSupport::Fraction(0.1).resolve(31).unwrap(), 4);
        assert_eq!(MinSupport::Fraction(0.05).resolve(0).unwrap(), 1);
        assert_eq!(MinSupport::Absolute(4).resolve(2).unwrap(), 4);
        assert!(MinSupport::Absolute(0).resolve(2).is_err());
    }

    #[test]
    fn test_invalid_lengths() {
        assert!(mine(&transactions(), MinSupport::Absolute(1), 0).is_err());
        let miner = SubspaceMiner::new(MinSupport::Absolute(1), 3).with_max_length(Some(2));
        assert!(miner.mine(&transactions()).is_err());
    }

    #[test]
    fn test_intersect() {
        assert_eq!(intersect(&[0, 2, 4, 6], &[1, 2, 3, 6]), vec![2, 6]);
        assert!(intersect(&[], &[1]).is_empty());
    }
}
