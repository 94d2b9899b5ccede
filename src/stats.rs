// src/stats.rs

use crate::error::{Error, Result};
use crate::risk::{RiskAssessment, RiskLevel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Scores at or above this are counted as predicted holds.
pub const HOLD_PREDICTED_SCORE: u32 = 70;

/// What one assessment contributes to the aggregate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsDelta {
    pub risky_shipment: bool,
    pub hold_predicted: bool,
}

impl StatsDelta {
    pub fn from_assessment(assessment: &RiskAssessment) -> Self {
        Self {
            risky_shipment: matches!(
                assessment.risk_level,
                RiskLevel::Medium | RiskLevel::High
            ),
            hold_predicted: assessment.risk_score >= HOLD_PREDICTED_SCORE,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.risky_shipment && !self.hold_predicted
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    pub invoices_analyzed: u64,
    pub risky_shipments: u64,
    pub holds_predicted: u64,
}

/// Real-world result an exporter reports after shipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NotShippedYet,
    ClearedSmoothly,
    QueriedByCustoms,
    HeldOrRejected,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::NotShippedYet,
        Outcome::ClearedSmoothly,
        Outcome::QueriedByCustoms,
        Outcome::HeldOrRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NotShippedYet => "not_shipped_yet",
            Outcome::ClearedSmoothly => "cleared_smoothly",
            Outcome::QueriedByCustoms => "queried_by_customs",
            Outcome::HeldOrRejected => "held_or_rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::NotShippedYet => "Not shipped yet",
            Outcome::ClearedSmoothly => "Cleared smoothly",
            Outcome::QueriedByCustoms => "Queried by customs",
            Outcome::HeldOrRejected => "Held / Rejected",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Outcome {
    type Err = String;

    /// Accepts the snake_case id or the display label, case-insensitively.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Outcome::ALL
            .into_iter()
            .find(|o| {
                o.as_str().eq_ignore_ascii_case(wanted) || o.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| {
                let ids: Vec<_> = Outcome::ALL.iter().map(Outcome::as_str).collect();
                format!("unknown outcome '{wanted}', expected one of: {}", ids.join(", "))
            })
    }
}

/// Aggregate counters owned outside the risk engine.
///
/// Implementations serialize concurrent updates themselves; callers only
/// report events.
pub trait StatsSink: Send + Sync {
    fn record_analyzed(&self) -> Result<()>;

    fn record_delta(&self, delta: StatsDelta) -> Result<()>;

    /// Remember an assessment under its invoice id. Counters are not touched.
    fn record_assessment(&self, _invoice_id: &str, _assessment: &RiskAssessment) -> Result<()> {
        Ok(())
    }

    /// Score of the latest remembered assessment for `invoice_id`.
    fn last_score(&self, _invoice_id: &str) -> Result<Option<u32>> {
        Ok(None)
    }

    fn snapshot(&self) -> Result<SystemStats>;
}

/// Outcome log. Nothing reads it back into scoring yet.
pub trait FeedbackSink: Send + Sync {
    fn record_outcome(&self, invoice_id: &str, outcome: Outcome) -> Result<()>;

    fn outcomes(&self, invoice_id: &str) -> Result<Vec<Outcome>>;
}

/// Process-local counters for runs that should leave nothing behind.
#[derive(Debug, Default)]
pub struct MemoryStats {
    invoices_analyzed: AtomicU64,
    risky_shipments: AtomicU64,
    holds_predicted: AtomicU64,
    feedback: Mutex<Vec<(String, Outcome)>>,
}

impl StatsSink for MemoryStats {
    fn record_analyzed(&self) -> Result<()> {
        self.invoices_analyzed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn record_delta(&self, delta: StatsDelta) -> Result<()> {
        if delta.risky_shipment {
            self.risky_shipments.fetch_add(1, Ordering::Relaxed);
        }
        if delta.hold_predicted {
            self.holds_predicted.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<SystemStats> {
        Ok(SystemStats {
            invoices_analyzed: self.invoices_analyzed.load(Ordering::Relaxed),
            risky_shipments: self.risky_shipments.load(Ordering::Relaxed),
            holds_predicted: self.holds_predicted.load(Ordering::Relaxed),
        })
    }
}

impl FeedbackSink for MemoryStats {
    fn record_outcome(&self, invoice_id: &str, outcome: Outcome) -> Result<()> {
        self.feedback
            .lock()
            .map_err(|_| Error::Poisoned)?
            .push((invoice_id.to_string(), outcome));
        Ok(())
    }

    fn outcomes(&self, invoice_id: &str) -> Result<Vec<Outcome>> {
        let feedback = self.feedback.lock().map_err(|_| Error::Poisoned)?;
        Ok(feedback
            .iter()
            .filter(|(id, _)| id == invoice_id)
            .map(|(_, outcome)| *outcome)
            .collect())
    }
}
