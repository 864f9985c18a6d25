//! Domain-weight parsing.
//!
//! A bank declares its domains as `Name:Weight|Name:Weight`. Weights are
//! fractions in `[0, 1]` that must add up to 1.0 within [`WEIGHT_SUM_TOLERANCE`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WeightError;

/// Separator between `name:weight` pairs.
pub const PAIR_DELIMITER: char = '|';

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Validated per-domain weight fractions, ordered by domain name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainWeights(BTreeMap<String, f64>);

impl DomainWeights {
    /// Parse and validate a `Name:Weight|Name:Weight` string.
    pub fn parse(raw: &str) -> Result<Self, WeightError> {
        if raw.trim().is_empty() {
            return Err(WeightError::Empty);
        }

        let mut weights = BTreeMap::new();
        for pair in raw.split(PAIR_DELIMITER) {
            let parts: Vec<&str> = pair.split(':').collect();
            if parts.len() != 2 {
                return Err(WeightError::MalformedPair(pair.to_string()));
            }
            let name = parts[0].trim();
            let value = parts[1].trim();
            if name.is_empty() {
                return Err(WeightError::MalformedPair(pair.to_string()));
            }

            let weight: f64 = value.parse().map_err(|_| WeightError::InvalidWeight {
                domain: name.to_string(),
                value: value.to_string(),
            })?;
            if !(0.0..=1.0).contains(&weight) {
                return Err(WeightError::OutOfRange {
                    domain: name.to_string(),
                    weight,
                });
            }
            if weights.insert(name.to_string(), weight).is_some() {
                return Err(WeightError::DuplicateDomain(name.to_string()));
            }
        }

        let parsed = Self(weights);
        let sum = parsed.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightError::BadSum { sum });
        }
        Ok(parsed)
    }

    pub fn get(&self, domain: &str) -> Option<f64> {
        self.0.get(domain).copied()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.0.contains_key(domain)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, &w)| (name.as_str(), w))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }
}

impl FromStr for DomainWeights {
    type Err = WeightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DomainWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.iter().map(|(n, w)| format!("{n}:{w}")).collect();
        write!(f, "{}", rendered.join("|"))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for DomainWeights {
    /// Build without validation. Intended for tests and benchmarks.
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(n, w)| (n.into(), w)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_weights() {
        let w = DomainWeights::parse("Networking:0.4|Storage:0.35|Security:0.25").unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w.get("Networking"), Some(0.4));
        assert_eq!(w.get("Security"), Some(0.25));
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn names_are_case_sensitive_and_trimmed() {
        let w = DomainWeights::parse(" Pods : 0.5 | pods:0.5").unwrap();
        assert!(w.contains("Pods"));
        assert!(w.contains("pods"));
        assert!(!w.contains(" Pods "));
    }

    #[test]
    fn sum_within_tolerance_accepted() {
        assert!(DomainWeights::parse("A:0.33|B:0.33|C:0.33").is_ok());
        assert!(DomainWeights::parse("A:0.5|B:0.505").is_ok());
    }

    #[test]
    fn bad_sum_reports_actual_sum() {
        let err = DomainWeights::parse("A:0.5|B:0.3").unwrap_err();
        match &err {
            WeightError::BadSum { sum } => assert!((sum - 0.8).abs() < 1e-9),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("0.80"));
    }

    #[test]
    fn unparsable_weight_rejected() {
        let err = DomainWeights::parse("A:half|B:0.5").unwrap_err();
        assert!(matches!(err, WeightError::InvalidWeight { ref domain, .. } if domain == "A"));
    }

    #[test]
    fn out_of_range_weight_rejected() {
        assert!(matches!(
            DomainWeights::parse("A:1.5|B:-0.5").unwrap_err(),
            WeightError::OutOfRange { .. }
        ));
    }

    #[test]
    fn malformed_pairs_rejected() {
        assert!(matches!(
            DomainWeights::parse("A0.5|B:0.5").unwrap_err(),
            WeightError::MalformedPair(_)
        ));
        assert!(matches!(
            DomainWeights::parse("A:0.5:1|B:0.5").unwrap_err(),
            WeightError::MalformedPair(_)
        ));
        assert!(matches!(
            DomainWeights::parse(":1.0").unwrap_err(),
            WeightError::MalformedPair(_)
        ));
        assert!(matches!(
            DomainWeights::parse("").unwrap_err(),
            WeightError::Empty
        ));
    }

    #[test]
    fn duplicate_domain_rejected() {
        assert!(matches!(
            DomainWeights::parse("A:0.5|A:0.5").unwrap_err(),
            WeightError::DuplicateDomain(_)
        ));
    }

    #[test]
    fn every_accepted_weighting_sums_to_one() {
        let inputs = [
            "A:1",
            "A:0.5|B:0.5",
            "A:0.1|B:0.2|C:0.3|D:0.4",
            "A:0.995",
            "A:0.2|B:0.2|C:0.2|D:0.2|E:0.21",
            "A:0.7|B:0.2",
            "A:0|B:1",
        ];
        for raw in inputs {
            if let Ok(w) = DomainWeights::parse(raw) {
                assert!(
                    (w.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
                    "{raw} accepted with sum {}",
                    w.sum()
                );
            }
        }
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let w = DomainWeights::parse("B:0.25|A:0.75").unwrap();
        assert_eq!(w.to_string(), "A:0.75|B:0.25");
        assert_eq!(w.to_string().parse::<DomainWeights>().unwrap(), w);
    }
}
