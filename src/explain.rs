// src/explain.rs

use crate::record::InvoiceRecord;
use crate::risk::{hsn_missing, incoterms_missing, invoiced_in_inr};

const NO_FLAGS: &str = "Invoice appears standard with no obvious red flags.";

/// How a customs officer might read the invoice. Independent of the score.
pub fn explain(invoice: &InvoiceRecord) -> String {
    let checks: [(fn(&InvoiceRecord) -> bool, &str); 3] = [
        (hsn_missing, "HSN not declared"),
        (incoterms_missing, "Incoterms missing"),
        (invoiced_in_inr, "Export invoiced in INR"),
    ];

    let clauses: Vec<&str> = checks
        .iter()
        .filter(|(flagged, _)| flagged(invoice))
        .map(|&(_, clause)| clause)
        .collect();

    if clauses.is_empty() {
        NO_FLAGS.to_string()
    } else {
        format!(
            "A customs officer may question this shipment because {}",
            clauses.join("; ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Currency, Incoterm};

    #[test]
    fn clean_invoice() {
        let invoice = InvoiceRecord {
            hsn_code: Some("850431".into()),
            incoterms: Some(Incoterm::Fob),
            currency: Some(Currency::Usd),
            ..Default::default()
        };
        assert_eq!(explain(&invoice), NO_FLAGS);
    }

    #[test]
    fn all_clauses_in_order() {
        let invoice = InvoiceRecord {
            currency: Some(Currency::Inr),
            ..Default::default()
        };
        assert_eq!(
            explain(&invoice),
            "A customs officer may question this shipment because HSN not declared; \
             Incoterms missing; Export invoiced in INR"
        );
    }

    #[test]
    fn ignores_signals_outside_its_checks() {
        // IEC and total feed the score but not this view.
        let invoice = InvoiceRecord {
            hsn_code: Some("850431".into()),
            currency: Some(Currency::Eur),
            ..Default::default()
        };
        assert_eq!(
            explain(&invoice),
            "A customs officer may question this shipment because Incoterms missing"
        );
    }
}
