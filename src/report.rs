// src/report.rs

use crate::processor::ProcessedInvoice;
use crate::risk::RiskAssessment;
use crate::simulation::Simulation;
use crate::stats::SystemStats;
use serde::Serialize;
use std::fmt::Write;

/// Must accompany every rendered assessment.
pub const DISCLAIMER: &str =
    "Risk signals only. Not legal or customs advice. Final responsibility remains with exporter.";

/// Machine-readable output with the disclaimer attached alongside.
#[derive(Debug, Serialize)]
pub struct Disclaimed<'a, T: Serialize> {
    #[serde(flatten)]
    pub body: &'a T,
    pub disclaimer: &'static str,
}

pub fn to_json<T: Serialize>(body: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Disclaimed {
        body,
        disclaimer: DISCLAIMER,
    })
}

pub fn render_assessment(assessment: &RiskAssessment) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Shipment decision: {}", assessment.shipment_decision);
    let _ = writeln!(out, "  {}", assessment.risk_summary);
    let _ = writeln!(
        out,
        "Hold probability: {}%   Risk level: {}   Confidence: {:?}",
        assessment.risk_score, assessment.risk_level, assessment.confidence
    );

    if !assessment.risk_reasons.is_empty() {
        let _ = writeln!(out, "\nWhy customs might intervene:");
        for reason in &assessment.risk_reasons {
            let _ = writeln!(out, "  - {reason}");
        }
        let _ = writeln!(out, "\nWhat you can fix:");
        for fix in &assessment.fix_suggestions {
            let _ = writeln!(out, "  + {fix}");
        }
    }

    let _ = writeln!(out, "\n{DISCLAIMER}");
    out
}

pub fn render_processed(report: &ProcessedInvoice) -> String {
    let mut out = String::new();
    let (filled, total) = report.invoice_data.coverage();
    let _ = writeln!(out, "Invoice id: {}", report.invoice_id);
    let _ = writeln!(
        out,
        "Type: {}   Quality: {:?}   Extraction: {}   Fields: {filled}/{total}",
        report.invoice_type, report.invoice_quality, report.extraction_method
    );
    let _ = writeln!(out);
    out.push_str(&render_assessment(&report.risk_assessment));
    let _ = writeln!(out, "\nHow a customs officer may see this:");
    let _ = writeln!(out, "  {}", report.customs_officer_view);
    let _ = writeln!(out);
    out.push_str(&render_stats(&report.system_stats));
    out
}

pub fn render_simulation(simulation: &Simulation) -> String {
    format!(
        "New hold probability: {}%\n{}\n\n{DISCLAIMER}\n",
        simulation.risk_score, simulation.summary
    )
}

pub fn render_stats(stats: &SystemStats) -> String {
    format!(
        "Invoices analyzed: {}   Risky shipments detected: {}   Holds predicted: {}\n",
        stats.invoices_analyzed, stats.risky_shipments, stats.holds_predicted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::InvoiceRecord;
    use crate::risk;

    #[test]
    fn assessment_lists_pairs_and_disclaimer() {
        let text = render_assessment(&risk::assess(&InvoiceRecord::default()));
        assert!(text.starts_with("Shipment decision: DO_NOT_SHIP"));
        assert!(text.contains("Hold probability: 80%"));
        assert!(text.contains("  - IEC missing"));
        assert!(text.contains("  + Add valid IEC"));
        assert!(text.trim_end().ends_with(DISCLAIMER));
    }

    #[test]
    fn clean_assessment_skips_empty_sections() {
        let text = render_assessment(&risk::assess(&InvoiceRecord {
            iec_code: Some("0123456789".into()),
            hsn_code: Some("850431".into()),
            incoterms: Some(crate::record::Incoterm::Fob),
            total_amount: Some(10.0),
            ..Default::default()
        }));
        assert!(text.contains("SAFE_TO_SHIP"));
        assert!(!text.contains("Why customs might intervene"));
        assert!(text.contains(DISCLAIMER));
    }

    #[test]
    fn json_output_is_flat_with_disclaimer() {
        let json = to_json(&risk::assess(&InvoiceRecord::default())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["risk_score"], 80);
        assert_eq!(value["disclaimer"], DISCLAIMER);
    }

    #[test]
    fn simulation_carries_disclaimer() {
        let text = render_simulation(&Simulation {
            risk_score: 35,
            summary: "Medium customs risk based on compliance signals".into(),
        });
        assert!(text.starts_with("New hold probability: 35%"));
        assert!(text.contains(DISCLAIMER));
    }
}
