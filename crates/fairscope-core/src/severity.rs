use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Interpretation band for a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Unavailable,
    Low,
    Moderate,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Unavailable => "unavailable",
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
        }
    }
}

/// Bands used to interpret statistical parity difference and disparate impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SeverityThresholds {
    /// |SPD| at or above this is moderate.
    pub spd_moderate: f64,
    /// |SPD| at or above this is high.
    pub spd_high: f64,
    /// DI within `[di_low_min, di_low_max]` is low.
    pub di_low_min: f64,
    pub di_low_max: f64,
    /// DI within `[di_moderate_min, di_low_min)` is moderate.
    pub di_moderate_min: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            spd_moderate: 0.1,
            spd_high: 0.2,
            di_low_min: 0.8,
            di_low_max: 1.25,
            di_moderate_min: 0.6,
        }
    }
}

impl SeverityThresholds {
    pub fn classify_spd(&self, value: Option<f64>) -> Severity {
        let Some(value) = value else {
            return Severity::Unavailable;
        };
        let magnitude = value.abs();
        if magnitude < self.spd_moderate {
            Severity::Low
        } else if magnitude < self.spd_high {
            Severity::Moderate
        } else {
            Severity::High
        }
    }

    pub fn classify_di(&self, value: Option<f64>) -> Severity {
        let Some(value) = value else {
            return Severity::Unavailable;
        };
        if value >= self.di_low_min && value <= self.di_low_max {
            Severity::Low
        } else if value >= self.di_moderate_min && value < self.di_low_min {
            Severity::Moderate
        } else {
            Severity::High
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_spd_bands() {
        let thresholds = SeverityThresholds::default();
        assert_eq!(thresholds.classify_spd(Some(-0.05)), Severity::Low);
        assert_eq!(thresholds.classify_spd(Some(0.15)), Severity::Moderate);
        assert_eq!(thresholds.classify_spd(Some(-0.2)), Severity::High);
        assert_eq!(thresholds.classify_spd(None), Severity::Unavailable);
    }

    #[test]
    fn classifies_di_bands() {
        let thresholds = SeverityThresholds::default();
        assert_eq!(thresholds.classify_di(Some(1.0)), Severity::Low);
        assert_eq!(thresholds.classify_di(Some(1.25)), Severity::Low);
        assert_eq!(thresholds.classify_di(Some(0.7)), Severity::Moderate);
        assert_eq!(thresholds.classify_di(Some(0.5)), Severity::High);
        assert_eq!(thresholds.classify_di(Some(1.4)), Severity::High);
        assert_eq!(thresholds.classify_di(None), Severity::Unavailable);
    }
}
