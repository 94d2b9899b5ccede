// src/processor.rs

use crate::explain::explain;
use crate::heuristics;
use crate::llm_extract::FieldInference;
use crate::record::{InvoiceRecord, PartialRecord, merge};
use crate::risk::{RiskAssessment, RiskEngine};
use crate::stats::{StatsSink, SystemStats};
use crate::text_extract;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};

/// Extracted text longer than this reads as a good-quality document.
const GOOD_QUALITY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvoiceQuality {
    Good,
    Poor,
}

/// Everything one pipeline run produced for one document.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedInvoice {
    pub invoice_id: String,
    pub invoice_type: String,
    pub invoice_quality: InvoiceQuality,
    pub invoice_data: InvoiceRecord,
    pub risk_assessment: RiskAssessment,
    pub customs_officer_view: String,
    pub system_stats: SystemStats,
    pub extraction_method: String,
}

/// Runs extraction, merging, scoring and explanation for one document.
pub struct InvoiceProcessor {
    engine: RiskEngine,
    stats: Arc<dyn StatsSink>,
    inference: Option<Box<dyn FieldInference>>,
}

impl InvoiceProcessor {
    pub fn new(stats: Arc<dyn StatsSink>) -> Self {
        Self {
            engine: RiskEngine::new(Arc::clone(&stats)),
            stats,
            inference: None,
        }
    }

    pub fn with_inference(mut self, inference: Box<dyn FieldInference>) -> Self {
        self.inference = Some(inference);
        self
    }

    pub fn engine(&self) -> &RiskEngine {
        &self.engine
    }

    pub async fn process_pdf(&self, pdf_bytes: &[u8]) -> ProcessedInvoice {
        let invoice_id = document_id(pdf_bytes);
        let short_id = &invoice_id[..12];
        let span = info_span!("invoice", id = %short_id, bytes = pdf_bytes.len());

        async {
            let text = text_extract::extract_text(pdf_bytes);
            self.process_text(invoice_id, &text).await
        }
        .instrument(span)
        .await
    }

    /// The pipeline from extracted text onwards.
    pub async fn process_text(&self, invoice_id: String, text: &str) -> ProcessedInvoice {
        if let Err(e) = self.stats.record_analyzed() {
            warn!(error = %e, "Failed to count analyzed invoice");
        }

        let rules = heuristics::extract_fields(text);
        let inferred = match &self.inference {
            Some(inference) => inference.infer(text).await.unwrap_or_default(),
            None => PartialRecord::default(),
        };

        let invoice = merge(rules, inferred);
        let (filled, total) = invoice.coverage();
        info!(
            filled,
            total,
            invoice_number = ?invoice.invoice_number,
            currency = ?invoice.currency,
            total_amount = ?invoice.total_amount,
            line_items = invoice.line_items.len(),
            "Extraction result"
        );

        let risk_assessment = self.engine.assess(&invoice);
        if let Err(e) = self.stats.record_assessment(&invoice_id, &risk_assessment) {
            warn!(error = %e, "Failed to store assessment");
        }
        info!(
            score = risk_assessment.risk_score,
            decision = %risk_assessment.shipment_decision,
            "Risk assessed"
        );

        let system_stats = self.stats.snapshot().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read stats");
            SystemStats::default()
        });

        let invoice_quality = if text.chars().count() > GOOD_QUALITY_CHARS {
            InvoiceQuality::Good
        } else {
            InvoiceQuality::Poor
        };

        ProcessedInvoice {
            invoice_id,
            invoice_type: "Commercial".to_string(),
            invoice_quality,
            customs_officer_view: explain(&invoice),
            invoice_data: invoice,
            risk_assessment,
            system_stats,
            extraction_method: self.extraction_method().to_string(),
        }
    }

    fn extraction_method(&self) -> &'static str {
        if self.inference.is_some() {
            "ai+rules"
        } else {
            "rules"
        }
    }
}

/// Content hash of the document; the same file always gets the same id.
pub fn document_id(pdf_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pdf_bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Currency, Incoterm};
    use crate::risk::ShipmentDecision;
    use crate::stats::MemoryStats;
    use async_trait::async_trait;
    use serde_json::json;

    const RULES_TEXT: &str = "\
COMMERCIAL INVOICE
Invoice No: EXP/2025/014   Date: 14/03/2025
IEC: 0123456789
Payment in INR
";

    struct CannedInference(Option<PartialRecord>);

    #[async_trait]
    impl FieldInference for CannedInference {
        async fn infer(&self, _text: &str) -> Option<PartialRecord> {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn processor(stats: Arc<MemoryStats>) -> InvoiceProcessor {
        InvoiceProcessor::new(stats)
    }

    #[tokio::test]
    async fn rules_only_pipeline() {
        let stats = Arc::new(MemoryStats::default());
        let report = processor(stats.clone())
            .process_text("id-1".into(), RULES_TEXT)
            .await;

        assert_eq!(report.extraction_method, "rules");
        assert_eq!(report.invoice_quality, InvoiceQuality::Poor);
        assert_eq!(report.invoice_data.iec_code.as_deref(), Some("0123456789"));
        assert_eq!(report.invoice_data.currency, Some(Currency::Inr));
        // HSN 20 + Incoterms 15 + INR 20 + value 20.
        assert_eq!(report.risk_assessment.risk_score, 75);
        assert_eq!(
            report.risk_assessment.shipment_decision,
            ShipmentDecision::DoNotShip
        );
        assert!(
            report
                .customs_officer_view
                .starts_with("A customs officer may question this shipment because")
        );
        assert_eq!(
            report.system_stats,
            SystemStats {
                invoices_analyzed: 1,
                risky_shipments: 1,
                holds_predicted: 1,
            }
        );
    }

    #[tokio::test]
    async fn inference_fills_gaps_but_not_over_rules() {
        let stats = Arc::new(MemoryStats::default());
        let overlay = PartialRecord {
            iec_code: None,
            currency: Some("USD".into()),
            hsn_code: Some("850431".into()),
            incoterms: Some("CIF".into()),
            total_amount: json!(18250.0),
            ..Default::default()
        };
        let report = processor(stats)
            .with_inference(Box::new(CannedInference(Some(overlay))))
            .process_text("id-2".into(), RULES_TEXT)
            .await;

        assert_eq!(report.extraction_method, "ai+rules");
        assert_eq!(report.invoice_data.iec_code.as_deref(), Some("0123456789"));
        assert_eq!(report.invoice_data.currency, Some(Currency::Usd));
        assert_eq!(report.invoice_data.incoterms, Some(Incoterm::Cif));
        assert_eq!(report.risk_assessment.risk_score, 0);
        assert_eq!(
            report.customs_officer_view,
            "Invoice appears standard with no obvious red flags."
        );
    }

    #[tokio::test]
    async fn failed_inference_looks_like_missing_fields() {
        let stats = Arc::new(MemoryStats::default());
        let with_failure = processor(stats.clone())
            .with_inference(Box::new(CannedInference(None)))
            .process_text("id-3".into(), RULES_TEXT)
            .await;
        let rules_only = processor(stats)
            .process_text("id-3".into(), RULES_TEXT)
            .await;

        assert_eq!(with_failure.invoice_data, rules_only.invoice_data);
        assert_eq!(with_failure.risk_assessment, rules_only.risk_assessment);
    }

    #[tokio::test]
    async fn unreadable_pdf_scores_as_empty_record() {
        let stats = Arc::new(MemoryStats::default());
        let report = processor(stats).process_pdf(b"not a pdf at all").await;

        assert_eq!(report.invoice_id, document_id(b"not a pdf at all"));
        assert_eq!(report.invoice_data, InvoiceRecord::default());
        assert_eq!(report.risk_assessment.risk_score, 80);
        assert_eq!(report.invoice_quality, InvoiceQuality::Poor);
    }

    #[test]
    fn document_id_is_stable_sha256() {
        assert_eq!(
            document_id(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(document_id(b"abc"), document_id(b"abc"));
        assert_ne!(document_id(b"abc"), document_id(b"abd"));
    }
}
