//! Rules with severity-keyed thresholds.
//!
//! Alert configurations carry a sequence of
//! `{rule, thresholdOperator, thresholds: {WARNING: .., CRITICAL: ..}}`.
//! The sequence order is kept as-is; the severity map is keyed and has no
//! meaningful order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::severity::Severity;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock};

/// Accepted threshold operators.
pub const THRESHOLD_OPERATORS: [&str; 4] = [">", ">=", "<", "<="];

/// Accepted seasonality values of baseline thresholds.
pub const SEASONALITIES: [&str; 2] = ["DAILY", "WEEKLY"];

/// A rule with its operator and per-severity thresholds, in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleWithThreshold<R> {
    /// Comparison applied between metric and threshold.
    pub threshold_operator: String,
    /// Entity specific rule definition.
    pub rule: R,
    /// Thresholds keyed by severity.
    pub thresholds: BTreeMap<Severity, ThresholdRule>,
}

/// A single threshold, in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ThresholdRule {
    /// A fixed value.
    #[serde(rename = "staticThreshold")]
    Static {
        /// Threshold value.
        value: f64,
    },
    /// A baseline learned and adapted continuously.
    #[serde(rename = "adaptiveBaseline", rename_all = "camelCase")]
    AdaptiveBaseline {
        /// Allowed deviation from the baseline.
        deviation_factor: f64,
        /// How quickly the baseline adapts.
        adaptability: f64,
        /// `DAILY` or `WEEKLY`.
        seasonality: String,
    },
    /// A baseline computed from historic data.
    #[serde(rename = "historicBaseline", rename_all = "camelCase")]
    HistoricBaseline {
        /// Allowed deviation from the baseline.
        deviation_factor: f64,
        /// `DAILY` or `WEEKLY`.
        seasonality: String,
        /// Server computed baseline samples.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        baseline: Option<Vec<Vec<f64>>>,
    },
}

/// Thresholds of one rule, in state form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsState {
    /// Threshold raising a warning.
    #[serde(default)]
    pub warning: Option<ThresholdState>,
    /// Threshold raising a critical alert.
    #[serde(default)]
    pub critical: Option<ThresholdState>,
}

/// A single threshold, in state form: exactly one block is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdState {
    /// Fixed value threshold.
    #[serde(default, rename = "static")]
    pub static_threshold: Option<StaticThresholdState>,
    /// Adaptive baseline threshold.
    #[serde(default)]
    pub adaptive_baseline: Option<AdaptiveBaselineState>,
    /// Historic baseline threshold.
    #[serde(default)]
    pub historic_baseline: Option<HistoricBaselineState>,
}

/// Fixed value threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticThresholdState {
    /// Threshold value.
    pub value: f64,
}

/// Adaptive baseline threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveBaselineState {
    /// Allowed deviation from the baseline.
    pub deviation_factor: f64,
    /// How quickly the baseline adapts.
    pub adaptability: f64,
    /// `DAILY` or `WEEKLY`.
    pub seasonality: String,
}

/// Historic baseline threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricBaselineState {
    /// Allowed deviation from the baseline.
    pub deviation_factor: f64,
    /// `DAILY` or `WEEKLY`.
    pub seasonality: String,
    /// Server computed baseline samples.
    #[serde(default)]
    pub baseline: Option<Vec<Vec<f64>>>,
}

impl ThresholdState {
    fn to_wire(&self, path: &str) -> Result<ThresholdRule, ProviderError> {
        if let Some(s) = &self.static_threshold {
            return Ok(ThresholdRule::Static { value: s.value });
        }
        if let Some(a) = &self.adaptive_baseline {
            check_seasonality(&a.seasonality, path)?;
            return Ok(ThresholdRule::AdaptiveBaseline {
                deviation_factor: a.deviation_factor,
                adaptability: a.adaptability,
                seasonality: a.seasonality.clone(),
            });
        }
        if let Some(h) = &self.historic_baseline {
            check_seasonality(&h.seasonality, path)?;
            return Ok(ThresholdRule::HistoricBaseline {
                deviation_factor: h.deviation_factor,
                seasonality: h.seasonality.clone(),
                baseline: h.baseline.clone(),
            });
        }
        Err(ProviderError::InvalidConfig(format!(
            "{}: one of static, adaptive_baseline or historic_baseline must be set",
            path
        )))
    }

    fn from_wire(rule: &ThresholdRule) -> Self {
        match rule {
            ThresholdRule::Static { value } => Self {
                static_threshold: Some(StaticThresholdState { value: *value }),
                ..Self::default()
            },
            ThresholdRule::AdaptiveBaseline {
                deviation_factor,
                adaptability,
                seasonality,
            } => Self {
                adaptive_baseline: Some(AdaptiveBaselineState {
                    deviation_factor: *deviation_factor,
                    adaptability: *adaptability,
                    seasonality: seasonality.clone(),
                }),
                ..Self::default()
            },
            ThresholdRule::HistoricBaseline {
                deviation_factor,
                seasonality,
                baseline,
            } => Self {
                historic_baseline: Some(HistoricBaselineState {
                    deviation_factor: *deviation_factor,
                    seasonality: seasonality.clone(),
                    baseline: baseline.clone(),
                }),
                ..Self::default()
            },
        }
    }
}

fn check_seasonality(value: &str, path: &str) -> Result<(), ProviderError> {
    if SEASONALITIES.contains(&value) {
        Ok(())
    } else {
        Err(ProviderError::InvalidConfig(format!(
            "{}: unsupported seasonality '{}', expected one of {}",
            path,
            value,
            SEASONALITIES.join(", ")
        )))
    }
}

/// Convert state thresholds into the severity map. At least one severity
/// must be configured.
pub fn thresholds_to_wire(
    thresholds: &ThresholdsState,
    path: &str,
) -> Result<BTreeMap<Severity, ThresholdRule>, ProviderError> {
    let mut map = BTreeMap::new();
    for (severity, threshold) in [
        (Severity::Warning, &thresholds.warning),
        (Severity::Critical, &thresholds.critical),
    ] {
        if let Some(threshold) = threshold {
            let threshold_path = format!("{}.{}", path, severity);
            map.insert(severity, threshold.to_wire(&threshold_path)?);
        }
    }
    if map.is_empty() {
        return Err(ProviderError::InvalidConfig(format!(
            "{}: at least one of warning or critical must be set",
            path
        )));
    }
    Ok(map)
}

/// Convert the severity map into state thresholds.
pub fn thresholds_to_state(thresholds: &BTreeMap<Severity, ThresholdRule>) -> ThresholdsState {
    ThresholdsState {
        warning: thresholds.get(&Severity::Warning).map(ThresholdState::from_wire),
        critical: thresholds.get(&Severity::Critical).map(ThresholdState::from_wire),
    }
}

/// Validate a threshold operator from configuration.
pub fn check_threshold_operator(operator: &str, path: &str) -> Result<(), ProviderError> {
    if THRESHOLD_OPERATORS.contains(&operator) {
        Ok(())
    } else {
        Err(ProviderError::InvalidConfig(format!(
            "{}: unsupported threshold operator '{}', expected one of {}",
            path,
            operator,
            THRESHOLD_OPERATORS.join(", ")
        )))
    }
}

/// Schema attribute of a threshold operator.
pub fn threshold_operator_attribute() -> Attribute {
    Attribute::required_string()
        .with_description("The operator comparing the metric with the threshold")
        .with_allowed_values(THRESHOLD_OPERATORS)
}

/// Schema block of `{warning, critical}` thresholds.
pub fn thresholds_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_description("Thresholds per severity")
            .with_block("warning", NestedBlock::single(threshold_block()))
            .with_block("critical", NestedBlock::single(threshold_block())),
    )
    .with_min_items(1)
}

fn threshold_block() -> Block {
    let seasonality = || {
        Attribute::required_string()
            .with_description("The seasonality of the baseline")
            .with_allowed_values(SEASONALITIES)
    };
    Block::new()
        .with_block(
            "static",
            NestedBlock::single(
                Block::new().with_attribute("value", Attribute::required_float64()),
            ),
        )
        .with_block(
            "adaptive_baseline",
            NestedBlock::single(
                Block::new()
                    .with_attribute("deviation_factor", Attribute::required_float64())
                    .with_attribute("adaptability", Attribute::required_float64())
                    .with_attribute("seasonality", seasonality()),
            ),
        )
        .with_block(
            "historic_baseline",
            NestedBlock::single(
                Block::new()
                    .with_attribute("deviation_factor", Attribute::required_float64())
                    .with_attribute("seasonality", seasonality())
                    .with_attribute(
                        "baseline",
                        Attribute::new(
                            AttributeType::list(AttributeType::list(AttributeType::Float64)),
                            AttributeFlags::optional_computed(),
                        ),
                    ),
            ),
        )
        .with_exactly_one_of(["static", "adaptive_baseline", "historic_baseline"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shapes() {
        let wire: BTreeMap<Severity, ThresholdRule> = serde_json::from_value(json!({
            "CRITICAL": {"type": "staticThreshold", "value": 5.0},
            "WARNING": {
                "type": "adaptiveBaseline",
                "deviationFactor": 2.5,
                "adaptability": 0.5,
                "seasonality": "DAILY"
            }
        }))
        .unwrap();

        let state = thresholds_to_state(&wire);
        assert_eq!(
            state.critical.as_ref().and_then(|t| t.static_threshold.as_ref()),
            Some(&StaticThresholdState { value: 5.0 })
        );
        assert_eq!(
            state
                .warning
                .as_ref()
                .and_then(|t| t.adaptive_baseline.as_ref())
                .map(|a| a.deviation_factor),
            Some(2.5)
        );

        let back = thresholds_to_wire(&state, "rules.0.threshold").unwrap();
        assert_eq!(back, wire);
    }

    #[test]
    fn test_state_serialization_uses_static_key() {
        let state = ThresholdState {
            static_threshold: Some(StaticThresholdState { value: 1.0 }),
            ..ThresholdState::default()
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["static"]["value"], 1.0);
        assert!(value["adaptive_baseline"].is_null());
    }

    #[test]
    fn test_historic_baseline_round_trip() {
        let rule = ThresholdRule::HistoricBaseline {
            deviation_factor: 3.0,
            seasonality: "WEEKLY".to_string(),
            baseline: Some(vec![vec![1.0, 2.0]]),
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "historicBaseline");
        assert_eq!(json["deviationFactor"], 3.0);

        let state = ThresholdState::from_wire(&rule);
        assert_eq!(state.to_wire("t").unwrap(), rule);
    }

    #[test]
    fn test_empty_thresholds_rejected() {
        let err = thresholds_to_wire(&ThresholdsState::default(), "rules.0.threshold").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));
        assert!(err.message().starts_with("rules.0.threshold"));

        let empty_variant = ThresholdsState {
            warning: Some(ThresholdState::default()),
            critical: None,
        };
        let err = thresholds_to_wire(&empty_variant, "t").unwrap_err();
        assert!(err.message().contains("t.warning"));
    }

    #[test]
    fn test_seasonality_and_operator_checks() {
        let bad = ThresholdsState {
            warning: Some(ThresholdState {
                adaptive_baseline: Some(AdaptiveBaselineState {
                    deviation_factor: 1.0,
                    adaptability: 1.0,
                    seasonality: "HOURLY".to_string(),
                }),
                ..ThresholdState::default()
            }),
            critical: None,
        };
        assert!(thresholds_to_wire(&bad, "t").is_err());

        assert!(check_threshold_operator(">=", "op").is_ok());
        assert!(check_threshold_operator("==", "op").is_err());
    }

    #[test]
    fn test_rule_with_threshold_keeps_sequence_order() {
        let rules: Vec<RuleWithThreshold<serde_json::Value>> = serde_json::from_value(json!([
            {"thresholdOperator": ">", "rule": {"metricName": "b"}, "thresholds": {"WARNING": {"type": "staticThreshold", "value": 1.0}}},
            {"thresholdOperator": "<", "rule": {"metricName": "a"}, "thresholds": {"CRITICAL": {"type": "staticThreshold", "value": 2.0}}}
        ]))
        .unwrap();
        assert_eq!(rules[0].rule["metricName"], "b");
        assert_eq!(rules[1].threshold_operator, "<");

        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(json[0]["rule"]["metricName"], "b");
    }
}
