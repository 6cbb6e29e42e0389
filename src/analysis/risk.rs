//! Weighted risk score and optimization strategy for a page analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::AnalysisIssues;

const HIGH_WEIGHT: f64 = 1.0;
const MEDIUM_WEIGHT: f64 = 0.5;
const LOW_WEIGHT: f64 = 0.2;
const SAFE_WEIGHT: f64 = 0.0;

/// Weighted issue total that saturates the score at 1.
const SATURATION: f64 = 10.0;

const HIGH_THRESHOLD: f64 = 0.7;
const MEDIUM_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    HighRisk,
    MediumRisk,
    LowRisk,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::HighRisk => "HIGH_RISK",
            RiskLevel::MediumRisk => "MEDIUM_RISK",
            RiskLevel::LowRisk => "LOW_RISK",
        })
    }
}

/// How far an optimizer may go on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Conservative,
    Balanced,
    Aggressive,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Conservative => "conservative",
            Strategy::Balanced => "balanced",
            Strategy::Aggressive => "aggressive",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRecommendation {
    /// In `[0, 1]`, rounded to two decimals.
    pub risk_score: f64,
    pub level: RiskLevel,
    pub strategy: Strategy,
    pub tip: String,
}

pub fn calculate_risk(issues: &AnalysisIssues) -> RiskRecommendation {
    let weighted = issues.high_risk.len() as f64 * HIGH_WEIGHT
        + issues.medium_risk.len() as f64 * MEDIUM_WEIGHT
        + issues.low_risk.len() as f64 * LOW_WEIGHT
        + issues.safe.len() as f64 * SAFE_WEIGHT;
    let score = (weighted / SATURATION).min(1.0);

    // Thresholds compare the unrounded score.
    let (level, strategy, tip) = if score > HIGH_THRESHOLD {
        (
            RiskLevel::HighRisk,
            Strategy::Conservative,
            "Only defer non-critical scripts. Skip CSS removal.",
        )
    } else if score > MEDIUM_THRESHOLD {
        (
            RiskLevel::MediumRisk,
            Strategy::Balanced,
            "Defer scripts, carefully remove unused CSS, skip framework removal.",
        )
    } else {
        (
            RiskLevel::LowRisk,
            Strategy::Aggressive,
            "Safe to aggressively optimize. Remove unused CSS and defer scripts.",
        )
    };

    RiskRecommendation {
        risk_score: (score * 100.0).round() / 100.0,
        level,
        strategy,
        tip: tip.to_string(),
    }
}
