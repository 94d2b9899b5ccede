// src/simulation.rs

use crate::record::{Incoterm, InvoiceRecord};
use crate::risk::RiskEngine;
use serde::Serialize;
use std::convert::Infallible;
use std::str::FromStr;

/// Text sentinel for "keep the trade term as it is".
pub const UNCHANGED: &str = "UNCHANGED";

/// What-if change to the trade term.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IncotermOverride {
    #[default]
    Unchanged,
    /// Any text, recognized or not. Normalized like extracted input.
    Set(String),
}

impl FromStr for IncotermOverride {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == UNCHANGED {
            IncotermOverride::Unchanged
        } else {
            IncotermOverride::Set(s.to_string())
        })
    }
}

/// The slice of an assessment a what-if caller gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Simulation {
    pub risk_score: u32,
    pub summary: String,
}

/// Copy `base` with the overrides applied.
///
/// A `new_total` of exactly zero means "no override": the value input this
/// backs defaults to zero, so zero cannot be told apart from "left alone".
pub fn apply_overrides(
    base: &InvoiceRecord,
    new_total: Option<f64>,
    new_incoterm: &IncotermOverride,
) -> InvoiceRecord {
    let mut simulated = base.clone();

    if let Some(total) = new_total.filter(|&t| t != 0.0) {
        simulated.total_amount = Some(total);
    }

    if let IncotermOverride::Set(raw) = new_incoterm {
        simulated.incoterms = Incoterm::parse(raw);
    }

    simulated
}

/// Re-run the engine against a modified copy of `base`. `base` is untouched.
pub fn simulate(
    engine: &RiskEngine,
    base: &InvoiceRecord,
    new_total: Option<f64>,
    new_incoterm: &IncotermOverride,
) -> Simulation {
    let simulated = apply_overrides(base, new_total, new_incoterm);
    let assessment = engine.assess(&simulated);
    Simulation {
        risk_score: assessment.risk_score,
        summary: assessment.risk_summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Currency;
    use crate::risk;
    use crate::stats::{MemoryStats, StatsSink};
    use std::sync::Arc;

    fn engine() -> (RiskEngine, Arc<MemoryStats>) {
        let stats = Arc::new(MemoryStats::default());
        (RiskEngine::new(stats.clone()), stats)
    }

    /// IEC and HSN present, no trade term, INR, negative total: 55.
    fn base() -> InvoiceRecord {
        InvoiceRecord {
            iec_code: Some("0123456789".into()),
            hsn_code: Some("850431".into()),
            currency: Some(Currency::Inr),
            total_amount: Some(-5.0),
            ..Default::default()
        }
    }

    #[test]
    fn fixing_total_and_term_lowers_score() {
        let (engine, _) = engine();
        let sim = simulate(
            &engine,
            &base(),
            Some(12_000.0),
            &IncotermOverride::Set("FOB".into()),
        );
        assert_eq!(sim.risk_score, 20);
        assert_eq!(sim.summary, "Low customs risk based on compliance signals");
    }

    #[test]
    fn zero_total_is_no_override() {
        let (engine, _) = engine();
        let original = risk::assess(&base());
        let sim = simulate(&engine, &base(), Some(0.0), &IncotermOverride::Unchanged);
        assert_eq!(sim.risk_score, original.risk_score);
        assert_eq!(sim.summary, original.risk_summary);

        let copy = apply_overrides(&base(), Some(0.0), &IncotermOverride::Unchanged);
        assert_eq!(copy.total_amount, Some(-5.0));
    }

    #[test]
    fn unrecognized_term_counts_as_declared() {
        let (engine, _) = engine();
        let sim = simulate(&engine, &base(), None, &IncotermOverride::Set("FCA".into()));
        // R4 + R5 only.
        assert_eq!(sim.risk_score, 40);
    }

    #[test]
    fn blank_term_clears_it() {
        let mut with_term = base();
        with_term.incoterms = Some(Incoterm::Cif);
        let copy = apply_overrides(&with_term, None, &IncotermOverride::Set("  ".into()));
        assert_eq!(copy.incoterms, None);
    }

    #[test]
    fn base_is_never_mutated() {
        let (engine, _) = engine();
        let base = base();
        let snapshot = base.clone();

        let a = simulate(&engine, &base, Some(900.0), &IncotermOverride::Unchanged);
        let b = simulate(&engine, &base, None, &IncotermOverride::Set("DAP".into()));

        assert_eq!(base, snapshot);
        assert_eq!(a.risk_score, 35); // R3 + R4
        assert_eq!(b.risk_score, 40); // R4 + R5
    }

    #[test]
    fn simulation_reports_to_the_sink() {
        let (engine, stats) = engine();
        simulate(&engine, &base(), None, &IncotermOverride::Unchanged);
        assert_eq!(stats.snapshot().unwrap().risky_shipments, 1);
    }

    #[test]
    fn sentinel_parsing() {
        assert_eq!(
            "UNCHANGED".parse::<IncotermOverride>(),
            Ok(IncotermOverride::Unchanged)
        );
        assert_eq!(
            "cif".parse::<IncotermOverride>(),
            Ok(IncotermOverride::Set("cif".into()))
        );
    }
}
