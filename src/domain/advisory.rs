//! Advisory gate request/response types and the approval rule.
//!
//! The gate is consulted once per candidate entry. Approval requires an
//! `ENTRY` decision with confidence strictly above the configured minimum.
//! A gate failure of any kind is an implicit reject.

use chrono::NaiveDateTime;
use std::fmt;

use super::error::AdvisoryError;
use super::signal::Direction;

/// Which stub gate to run. Must be chosen explicitly in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryMode {
    AlwaysApprove,
    AlwaysPass,
}

impl AdvisoryMode {
    pub fn parse(value: &str) -> Option<AdvisoryMode> {
        match value.trim().to_lowercase().as_str() {
            "always_approve" => Some(AdvisoryMode::AlwaysApprove),
            "always_pass" => Some(AdvisoryMode::AlwaysPass),
            _ => None,
        }
    }
}

/// Market snapshot handed to the gate alongside the candidate entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarketContext {
    pub price_a: f64,
    pub price_b: f64,
    /// Percentage change of each leg over the trailing 24 intervals.
    pub change_pct_a: Option<f64>,
    pub change_pct_b: Option<f64>,
    /// Recent headlines, newest first.
    pub news: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryRequest {
    pub direction: Direction,
    pub timestamp: NaiveDateTime,
    pub z: f64,
    pub ratio: f64,
    pub context: MarketContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryDecision {
    Entry,
    Pass,
}

impl fmt::Display for AdvisoryDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdvisoryDecision::Entry => "ENTRY",
            AdvisoryDecision::Pass => "PASS",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryResponse {
    pub decision: AdvisoryDecision,
    /// 0..=100
    pub confidence: u8,
    pub reason: String,
}

impl AdvisoryResponse {
    pub fn entry(confidence: u8, reason: impl Into<String>) -> Self {
        AdvisoryResponse {
            decision: AdvisoryDecision::Entry,
            confidence: confidence.min(100),
            reason: reason.into(),
        }
    }

    pub fn pass(confidence: u8, reason: impl Into<String>) -> Self {
        AdvisoryResponse {
            decision: AdvisoryDecision::Pass,
            confidence: confidence.min(100),
            reason: reason.into(),
        }
    }

    /// Build a response from loosely typed fields as an external service
    /// returns them. Unknown decisions become `PASS`; confidence is clamped
    /// to 0..=100.
    pub fn from_raw(decision: &str, confidence: i64, reason: impl Into<String>) -> Self {
        let decision = match decision.trim().to_uppercase().as_str() {
            "ENTRY" => AdvisoryDecision::Entry,
            _ => AdvisoryDecision::Pass,
        };
        AdvisoryResponse {
            decision,
            confidence: confidence.clamp(0, 100) as u8,
            reason: reason.into(),
        }
    }
}

/// Outcome of consulting the gate for one candidate entry.
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    Approved(AdvisoryResponse),
    Rejected(AdvisoryResponse),
    /// The gate failed; treated as a reject.
    Unavailable(AdvisoryError),
}

impl GateVerdict {
    pub fn judge(result: Result<AdvisoryResponse, AdvisoryError>, min_confidence: u8) -> Self {
        match result {
            Ok(response)
                if response.decision == AdvisoryDecision::Entry
                    && response.confidence > min_confidence =>
            {
                GateVerdict::Approved(response)
            }
            Ok(response) => GateVerdict::Rejected(response),
            Err(err) => GateVerdict::Unavailable(err),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, GateVerdict::Approved(_))
    }

    pub fn reason(&self) -> String {
        match self {
            GateVerdict::Approved(r) | GateVerdict::Rejected(r) => r.reason.clone(),
            GateVerdict::Unavailable(err) => err.to_string(),
        }
    }
}
