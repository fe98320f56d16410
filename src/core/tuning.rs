use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};

/// Tuning coefficients loaded from `bonds/config.json` in a character
/// directory.
///
/// Field names mirror the on-disk keys; every number must be positive and
/// the two breakaway thresholds must be positive integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondTuning {
    /// Bond gained per unit of positive sentiment magnitude.
    #[serde(rename = "bond_climb_rate")]
    pub climb_rate: f64,

    /// Second-bond gained per confirmed ascension point.
    #[serde(rename = "2nd_bond_climb_rate")]
    pub second_climb_rate: f64,

    /// Absolute bond magnitude that triggers stranger breakaway.
    #[serde(rename = "bond_stranger_breakaway")]
    pub stranger_breakaway: u32,

    #[serde(rename = "bond_stranger_breakaway_reset_multiplier")]
    pub stranger_breakaway_reset: f64,

    #[serde(rename = "bond_stranger_breakaway_reset_negative_multiplier")]
    pub stranger_breakaway_reset_negative: f64,

    /// Exchanged-message count that triggers stranger breakaway.
    #[serde(rename = "bond_stranger_messages_breakaway")]
    pub stranger_messages_breakaway: u32,

    #[serde(rename = "bond_stranger_messages_breakaway_multiplier")]
    pub stranger_messages_reset: f64,

    #[serde(rename = "bond_stranger_messages_breakaway_negative_multiplier")]
    pub stranger_messages_reset_negative: f64,

    #[serde(rename = "bond_stranger_negative_bias_multiplier")]
    pub stranger_negative_bias: f64,

    #[serde(rename = "bond_negative_bias_multiplier")]
    pub negative_bias: f64,

    #[serde(rename = "bond_stranger_neutral_bias_multiplier")]
    pub stranger_neutral_bias: f64,

    #[serde(rename = "bond_neutral_bias_multiplier")]
    pub neutral_bias: f64,

    #[serde(rename = "2nd_bond_negative_bias_multiplier")]
    pub second_negative_bias: f64,
}

impl BondTuning {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let tuning: BondTuning = serde_json::from_str(&content)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Rejects non-positive or non-finite coefficients with the offending
    /// on-disk key named in the message.
    pub fn validate(&self) -> Result<()> {
        let numbers = [
            (self.climb_rate, "bond_climb_rate"),
            (self.second_climb_rate, "2nd_bond_climb_rate"),
            (
                self.stranger_breakaway_reset,
                "bond_stranger_breakaway_reset_multiplier",
            ),
            (
                self.stranger_breakaway_reset_negative,
                "bond_stranger_breakaway_reset_negative_multiplier",
            ),
            (
                self.stranger_messages_reset,
                "bond_stranger_messages_breakaway_multiplier",
            ),
            (
                self.stranger_messages_reset_negative,
                "bond_stranger_messages_breakaway_negative_multiplier",
            ),
            (
                self.stranger_negative_bias,
                "bond_stranger_negative_bias_multiplier",
            ),
            (self.negative_bias, "bond_negative_bias_multiplier"),
            (
                self.stranger_neutral_bias,
                "bond_stranger_neutral_bias_multiplier",
            ),
            (self.neutral_bias, "bond_neutral_bias_multiplier"),
            (
                self.second_negative_bias,
                "2nd_bond_negative_bias_multiplier",
            ),
        ];
        for (value, key) in numbers {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::Tuning(format!(
                    "'{}' must be a positive number, got {}",
                    key, value
                )));
            }
        }
        let integers = [
            (self.stranger_breakaway, "bond_stranger_breakaway"),
            (
                self.stranger_messages_breakaway,
                "bond_stranger_messages_breakaway",
            ),
        ];
        for (value, key) in integers {
            if value == 0 {
                return Err(EngineError::Tuning(format!(
                    "'{}' must be a positive integer, got 0",
                    key
                )));
            }
        }
        Ok(())
    }

    pub fn negative_bias_for(&self, stranger: bool) -> f64 {
        if stranger {
            self.stranger_negative_bias
        } else {
            self.negative_bias
        }
    }

    pub fn neutral_bias_for(&self, stranger: bool) -> f64 {
        if stranger {
            self.stranger_neutral_bias
        } else {
            self.neutral_bias
        }
    }

    /// Second-bond losses reuse the stranger bias while still a stranger.
    pub fn second_negative_bias_for(&self, stranger: bool) -> f64 {
        if stranger {
            self.stranger_negative_bias
        } else {
            self.second_negative_bias
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample() -> BondTuning {
        BondTuning {
            climb_rate: 1.0,
            second_climb_rate: 0.5,
            stranger_breakaway: 90,
            stranger_breakaway_reset: 0.5,
            stranger_breakaway_reset_negative: 0.25,
            stranger_messages_breakaway: 50,
            stranger_messages_reset: 0.8,
            stranger_messages_reset_negative: 0.4,
            stranger_negative_bias: 3.0,
            negative_bias: 1.5,
            stranger_neutral_bias: 0.1,
            neutral_bias: 0.2,
            second_negative_bias: 2.0,
        }
    }

    #[test]
    fn accepts_valid_tuning() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_number() {
        let mut tuning = sample();
        tuning.climb_rate = 0.0;
        let err = tuning.validate().unwrap_err();
        assert!(err.to_string().contains("bond_climb_rate"));
    }

    #[test]
    fn rejects_non_finite_number() {
        let mut tuning = sample();
        tuning.negative_bias = f64::NAN;
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn rejects_zero_threshold() {
        let mut tuning = sample();
        tuning.stranger_messages_breakaway = 0;
        let err = tuning.validate().unwrap_err();
        assert!(err.to_string().contains("bond_stranger_messages_breakaway"));
    }

    #[test]
    fn parses_on_disk_keys() {
        let json = r#"{
            "bond_climb_rate": 1.0,
            "2nd_bond_climb_rate": 0.5,
            "bond_stranger_breakaway": 90,
            "bond_stranger_breakaway_reset_multiplier": 0.5,
            "bond_stranger_breakaway_reset_negative_multiplier": 0.25,
            "bond_stranger_messages_breakaway": 50,
            "bond_stranger_messages_breakaway_multiplier": 0.8,
            "bond_stranger_messages_breakaway_negative_multiplier": 0.4,
            "bond_stranger_negative_bias_multiplier": 3.0,
            "bond_negative_bias_multiplier": 1.5,
            "bond_stranger_neutral_bias_multiplier": 0.1,
            "bond_neutral_bias_multiplier": 0.2,
            "2nd_bond_negative_bias_multiplier": 2.0
        }"#;
        let tuning: BondTuning = serde_json::from_str(json).unwrap();
        assert!(tuning.validate().is_ok());
        assert_eq!(tuning.stranger_breakaway, 90);
        assert_eq!(tuning.second_negative_bias_for(true), 3.0);
        assert_eq!(tuning.second_negative_bias_for(false), 2.0);
    }

    #[test]
    fn bias_selection_by_context() {
        let tuning = sample();
        assert_eq!(tuning.negative_bias_for(true), 3.0);
        assert_eq!(tuning.negative_bias_for(false), 1.5);
        assert_eq!(tuning.neutral_bias_for(true), 0.1);
        assert_eq!(tuning.neutral_bias_for(false), 0.2);
    }
}
