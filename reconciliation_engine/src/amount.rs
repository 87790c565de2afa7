//! Amount normalization.
//!
//! Processors send amounts either in minor units (cents) or in major units (dollars), and most payloads don't say
//! which. The ledger always stores major units, rounded to two decimal places.
//!
//! When the payload declares its unit (see [`crate::extractor::FieldAliases::amount_unit`]) that declaration is used.
//! Otherwise the configured [`AmountUnitPolicy`] decides. The default policy is a magnitude heuristic: values at or
//! above the threshold are taken to be minor units. This misreads legitimate large major-unit amounts (a $1500
//! payment sent as `1500` is stored as `15.00`), so deployments that know their processor's encoding should set
//! `MinorUnits` or `MajorUnits` explicitly.
use std::{fmt::Display, str::FromStr};

use log::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MINOR_UNIT_THRESHOLD: i64 = 1000;
const MINOR_UNITS_PER_MAJOR: i64 = 100;
const DECIMAL_PLACES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Amounts cannot be negative: {0}")]
    Negative(Decimal),
    #[error("Unknown amount unit policy: {0}. Expected heuristic, minor or major")]
    UnknownPolicy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountUnit {
    Minor,
    Major,
}

impl FromStr for AmountUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minor" | "cents" | "minor_units" => Ok(Self::Minor),
            "major" | "units" | "decimal" | "major_units" => Ok(Self::Major),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountUnitPolicy {
    /// Integral values at or above `threshold` are minor units. Everything else is major units.
    Heuristic { threshold: Decimal },
    MinorUnits,
    MajorUnits,
}

impl AmountUnitPolicy {
    pub fn heuristic(threshold: i64) -> Self {
        Self::Heuristic { threshold: Decimal::from(threshold) }
    }

    fn unit_for(&self, raw: Decimal) -> AmountUnit {
        match self {
            Self::MinorUnits => AmountUnit::Minor,
            Self::MajorUnits => AmountUnit::Major,
            // "1500.50" and "1500.0" were written with a decimal point, so they are not cents
            Self::Heuristic { .. } if raw.scale() > 0 => AmountUnit::Major,
            Self::Heuristic { threshold } if raw >= *threshold => AmountUnit::Minor,
            Self::Heuristic { .. } => AmountUnit::Major,
        }
    }
}

impl Default for AmountUnitPolicy {
    fn default() -> Self {
        Self::heuristic(DEFAULT_MINOR_UNIT_THRESHOLD)
    }
}

impl Display for AmountUnitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heuristic { threshold } => write!(f, "heuristic (threshold {threshold})"),
            Self::MinorUnits => write!(f, "minor"),
            Self::MajorUnits => write!(f, "major"),
        }
    }
}

impl FromStr for AmountUnitPolicy {
    type Err = AmountError;

    /// Parses `heuristic`, `minor` or `major`. The heuristic gets the default threshold.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::default()),
            "minor" | "minor_units" | "cents" => Ok(Self::MinorUnits),
            "major" | "major_units" => Ok(Self::MajorUnits),
            _ => Err(AmountError::UnknownPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmountNormalizer {
    policy: AmountUnitPolicy,
}

impl AmountNormalizer {
    pub fn new(policy: AmountUnitPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AmountUnitPolicy {
        self.policy
    }

    /// Converts a raw amount into major currency units, rounded to two decimal places.
    ///
    /// `declared_unit` is the unit the payload itself claims for the amount. An unrecognised declaration is ignored
    /// and the policy applies.
    pub fn normalize(&self, raw: Decimal, declared_unit: Option<&str>) -> Result<Decimal, AmountError> {
        self.normalize_as(raw, self.unit_for(raw, declared_unit))
    }

    /// The unit `raw` is read in: the declared unit if it is recognised, otherwise whatever the policy decides.
    pub fn unit_for(&self, raw: Decimal, declared_unit: Option<&str>) -> AmountUnit {
        let declared = declared_unit.and_then(|u| {
            let unit = u.parse::<AmountUnit>().ok();
            if unit.is_none() {
                warn!("🧾️ Ignoring unrecognised amount unit '{u}'. Falling back to the {} policy", self.policy);
            }
            unit
        });
        declared.unwrap_or_else(|| self.policy.unit_for(raw))
    }

    /// Converts `raw`, already known to be in `unit`, into major currency units.
    pub fn normalize_as(&self, raw: Decimal, unit: AmountUnit) -> Result<Decimal, AmountError> {
        if raw.is_sign_negative() && !raw.is_zero() {
            return Err(AmountError::Negative(raw));
        }
        let major = match unit {
            AmountUnit::Minor => raw / Decimal::from(MINOR_UNITS_PER_MAJOR),
            AmountUnit::Major => raw,
        };
        let mut amount = major.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
        amount.rescale(DECIMAL_PLACES);
        trace!("🧾️ Normalized {raw} ({unit:?} units) to {amount}");
        Ok(amount)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn heuristic(raw: &str) -> String {
        AmountNormalizer::default().normalize(dec(raw), None).unwrap().to_string()
    }

    #[test]
    fn heuristic_boundary() {
        assert_eq!(heuristic("999"), "999.00");
        assert_eq!(heuristic("1000"), "10.00");
        assert_eq!(heuristic("1001"), "10.01");
        assert_eq!(heuristic("15000"), "150.00");
        assert_eq!(heuristic("0"), "0.00");
    }

    #[test]
    fn heuristic_treats_decimal_notation_as_major_units() {
        assert_eq!(heuristic("1500.50"), "1500.50");
        assert_eq!(heuristic("1500.0"), "1500.00");
        assert_eq!(heuristic("12.345"), "12.35");
    }

    #[test]
    fn custom_threshold() {
        let n = AmountNormalizer::new(AmountUnitPolicy::heuristic(10_000));
        assert_eq!(n.normalize(dec("1500"), None).unwrap().to_string(), "1500.00");
        assert_eq!(n.normalize(dec("10000"), None).unwrap().to_string(), "100.00");
    }

    #[test]
    fn fixed_policies() {
        let minor = AmountNormalizer::new(AmountUnitPolicy::MinorUnits);
        assert_eq!(minor.normalize(dec("999"), None).unwrap().to_string(), "9.99");
        let major = AmountNormalizer::new(AmountUnitPolicy::MajorUnits);
        assert_eq!(major.normalize(dec("1500"), None).unwrap().to_string(), "1500.00");
    }

    #[test]
    fn declared_unit_wins() {
        let n = AmountNormalizer::default();
        assert_eq!(n.normalize(dec("1500"), Some("major")).unwrap().to_string(), "1500.00");
        assert_eq!(n.normalize(dec("250"), Some("cents")).unwrap().to_string(), "2.50");
        assert_eq!(n.normalize(dec("250"), Some("furlongs")).unwrap().to_string(), "250.00");
    }

    #[test]
    fn a_resolved_unit_can_be_reused() {
        let n = AmountNormalizer::default();
        let unit = n.unit_for(dec("15000"), None);
        assert_eq!(unit, AmountUnit::Minor);
        // 500 on its own would be read as major units
        assert_eq!(n.normalize_as(dec("500"), unit).unwrap().to_string(), "5.00");
        assert_eq!(n.unit_for(dec("15000"), Some("major")), AmountUnit::Major);
        assert_eq!(n.normalize_as(dec("-1"), AmountUnit::Major).unwrap_err(), AmountError::Negative(dec("-1")));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let err = AmountNormalizer::default().normalize(dec("-5"), None).unwrap_err();
        assert_eq!(err, AmountError::Negative(dec("-5")));
    }

    #[test]
    fn parse_policy() {
        assert_eq!("heuristic".parse::<AmountUnitPolicy>().unwrap(), AmountUnitPolicy::default());
        assert_eq!("MINOR".parse::<AmountUnitPolicy>().unwrap(), AmountUnitPolicy::MinorUnits);
        assert_eq!("major".parse::<AmountUnitPolicy>().unwrap(), AmountUnitPolicy::MajorUnits);
        assert!("guess".parse::<AmountUnitPolicy>().is_err());
    }
}
