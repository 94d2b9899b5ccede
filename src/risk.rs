// src/risk.rs

use crate::normalize::is_blank;
use crate::record::{Currency, InvoiceRecord};
use crate::stats::{StatsDelta, StatsSink};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_SCORE: u32 = 100;

/// Lower bound (inclusive) of the Medium tier.
pub const MEDIUM_THRESHOLD: u32 = 30;
/// Lower bound (inclusive) of the High tier.
pub const HIGH_THRESHOLD: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        if score < MEDIUM_THRESHOLD {
            RiskLevel::Low
        } else if score < HIGH_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much to trust the score. There is no confidence model yet, so every
/// assessment reports [`Confidence::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentDecision {
    SafeToShip,
    ReviewBeforeShipping,
    DoNotShip,
}

impl From<RiskLevel> for ShipmentDecision {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => ShipmentDecision::SafeToShip,
            RiskLevel::Medium => ShipmentDecision::ReviewBeforeShipping,
            RiskLevel::High => ShipmentDecision::DoNotShip,
        }
    }
}

impl ShipmentDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentDecision::SafeToShip => "SAFE_TO_SHIP",
            ShipmentDecision::ReviewBeforeShipping => "REVIEW_BEFORE_SHIPPING",
            ShipmentDecision::DoNotShip => "DO_NOT_SHIP",
        }
    }
}

impl fmt::Display for ShipmentDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one rule evaluation pass.
///
/// `risk_reasons` and `fix_suggestions` are parallel: entry `i` of each comes
/// from the same fired rule, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub confidence: Confidence,
    pub shipment_decision: ShipmentDecision,
    pub risk_reasons: Vec<String>,
    pub fix_suggestions: Vec<String>,
    pub risk_summary: String,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct Rule {
    weight: u32,
    reason: &'static str,
    fix: &'static str,
    fires: fn(&InvoiceRecord) -> bool,
}

/// Evaluated in this order, all of them, every time.
const RULES: [Rule; 5] = [
    Rule {
        weight: 25,
        reason: "IEC missing",
        fix: "Add valid IEC",
        fires: iec_missing,
    },
    Rule {
        weight: 20,
        reason: "HSN missing",
        fix: "Declare correct HSN",
        fires: hsn_missing,
    },
    Rule {
        weight: 15,
        reason: "Incoterms missing",
        fix: "Specify FOB / CIF",
        fires: incoterms_missing,
    },
    Rule {
        weight: 20,
        reason: "Export invoiced in INR",
        fix: "Use permitted foreign currency",
        fires: invoiced_in_inr,
    },
    Rule {
        weight: 20,
        reason: "Invoice value invalid",
        fix: "Correct invoice total",
        fires: value_invalid,
    },
];

fn iec_missing(invoice: &InvoiceRecord) -> bool {
    is_blank(invoice.iec_code.as_deref())
}

pub(crate) fn hsn_missing(invoice: &InvoiceRecord) -> bool {
    is_blank(invoice.hsn_code.as_deref())
}

pub(crate) fn incoterms_missing(invoice: &InvoiceRecord) -> bool {
    invoice.incoterms.is_none()
}

pub(crate) fn invoiced_in_inr(invoice: &InvoiceRecord) -> bool {
    invoice.currency == Some(Currency::Inr)
}

fn value_invalid(invoice: &InvoiceRecord) -> bool {
    !invoice
        .total_amount
        .is_some_and(|total| total.is_finite() && total > 0.0)
}

/// Score an invoice. Pure: no counters are touched.
pub fn assess(invoice: &InvoiceRecord) -> RiskAssessment {
    let mut score = 0;
    let mut reasons = Vec::new();
    let mut fixes = Vec::new();

    for rule in &RULES {
        if (rule.fires)(invoice) {
            score += rule.weight;
            reasons.push(rule.reason.to_string());
            fixes.push(rule.fix.to_string());
        }
    }

    let risk_score = score.min(MAX_SCORE);
    let risk_level = RiskLevel::from_score(risk_score);

    RiskAssessment {
        risk_score,
        risk_level,
        confidence: Confidence::Medium,
        shipment_decision: ShipmentDecision::from(risk_level),
        risk_reasons: reasons,
        fix_suggestions: fixes,
        risk_summary: format!("{risk_level} customs risk based on compliance signals"),
    }
}

/// The rule evaluator wired to a stats sink.
///
/// Every [`RiskEngine::assess`] call reports exactly one [`StatsDelta`]. A
/// failing sink is logged and never changes the assessment.
#[derive(Clone)]
pub struct RiskEngine {
    sink: Arc<dyn StatsSink>,
}

impl RiskEngine {
    pub fn new(sink: Arc<dyn StatsSink>) -> Self {
        Self { sink }
    }

    pub fn assess(&self, invoice: &InvoiceRecord) -> RiskAssessment {
        let assessment = assess(invoice);
        let delta = StatsDelta::from_assessment(&assessment);
        debug!(
            score = assessment.risk_score,
            level = %assessment.risk_level,
            risky = delta.risky_shipment,
            hold = delta.hold_predicted,
            "Assessed invoice"
        );

        if let Err(e) = self.sink.record_delta(delta) {
            warn!(error = %e, "Failed to report stats delta");
        }
        assessment
    }
}
