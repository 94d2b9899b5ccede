use crate::record::PartialRecord;
use regex::Regex;
use serde_json::Value;

/// Main extraction entry point: keyword-anchored regex patterns.
pub fn extract(text: &str) -> PartialRecord {
    PartialRecord {
        invoice_number: find(r"(?i)invoice\s*no[:\-]?\s*([A-Z0-9\-/]+)", text),
        invoice_date: find(r"(?i)date[:\-]?\s*([0-9/\-.]+)", text),
        seller_name: find(
            r"(?i)\b(?:exporter|seller|shipper)(?:\s+name)?\s*[:\-]\s*([^\n]+)",
            text,
        ),
        buyer_name: find(
            r"(?i)\b(?:consignee|buyer|importer|bill\s+to)(?:\s+name)?\s*[:\-]\s*([^\n]+)",
            text,
        ),
        gstin: find(r"(?i)GSTIN(?:\s*no\.?)?\s*[:\-]?\s*([A-Z0-9]{15})", text),
        iec_code: find(r"(?i)IEC(?:\s*(?:code|no\.?))?\s*[:\-]?\s*([0-9]{10})", text),
        currency: find(r"(?i)\b(USD|EUR|GBP|INR)\b", text),
        subtotal: amount_value(extract_subtotal(text)),
        tax_amount: amount_value(extract_tax(text)),
        total_amount: amount_value(extract_total(text)),
        hsn_code: find(r"(?i)\bHSN(?:\s*code)?\s*[:\-]?\s*([0-9]{6,8})\b", text),
        incoterms: find(r"(?i)\b(EXW|FOB|CIF|DAP|DDP|CFR)\b", text),
        lut_reference: find(
            r"(?i)\bLUT\s*(?:no\.?|ref(?:erence)?\.?|ARN)?\s*[:\-]?\s*([A-Z0-9][A-Z0-9\-/]{4,})",
            text,
        ),
        line_items: Vec::new(),
    }
}

/// First capture of `pattern`, trimmed. Blank captures count as no match.
fn find(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    let cap = re.captures(text)?;
    let value = cap.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Amounts stay as text; the normalizer owns the parsing.
fn amount_value(raw: Option<String>) -> Value {
    raw.map(Value::String).unwrap_or(Value::Null)
}

const AMOUNT: &str = r"(?:US\$|\$|€|£|₹)?\s*([0-9][0-9,]*(?:\.[0-9]+)?)";
const CURRENCY_TAG: &str = r"(?:\s*\(?(?:USD|EUR|GBP|INR)\)?)?";

fn extract_subtotal(text: &str) -> Option<String> {
    let pattern = format!(r"(?i)\bsub\s*-?\s*total{CURRENCY_TAG}\s*[:\-]?\s*{AMOUNT}");
    find(&pattern, text)
}

fn extract_tax(text: &str) -> Option<String> {
    // The keyword boundary keeps "GSTIN" out; the trailing one stops a
    // GSTIN printed after a bare "GST:" label from reading as an amount.
    let pattern = format!(
        r"(?i)\b(?:IGST|CGST|SGST|GST|tax)\b(?:\s+(?:amount|value))?\s*(?:@\s*[0-9.]+\s*%)?\s*[:\-]?\s*{AMOUNT}\b"
    );
    find(&pattern, text)
}

fn extract_total(text: &str) -> Option<String> {
    // The grand total usually comes last, after any per-page or sub-totals.
    // "Sub Total" matches here too, so the prefix is captured and skipped.
    let pattern = format!(
        r"(?i)\b(sub\s*-?\s*)?(?:grand\s+)?total(?:\s+(?:amount|value))?{CURRENCY_TAG}\s*[:\-]?\s*{AMOUNT}"
    );
    let re = Regex::new(&pattern).ok()?;

    let mut last = None;
    for cap in re.captures_iter(text) {
        if cap.get(1).is_some() {
            continue;
        }
        if let Some(amount) = cap.get(2) {
            last = Some(amount.as_str().to_string());
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = "\
COMMERCIAL INVOICE
Exporter: Shakti Exports Pvt Ltd
GSTIN: 27AAACS1234F1Z5
IEC: 0123456789
Invoice No: EXP/2025/014   Date: 14/03/2025
Consignee: Nordic Trading AB
Terms of delivery: FOB Nhava Sheva
Description            HSN: 850431     Qty 10
Sub Total USD 4,500.00
Freight 500.00
IGST @ 0%: 0.00
Total Amount USD 5,000.00
LUT ARN: AD270325012345X
";

    #[test]
    fn sample_export_invoice() {
        let p = extract(SAMPLE);
        assert_eq!(p.invoice_number.as_deref(), Some("EXP/2025/014"));
        assert_eq!(p.invoice_date.as_deref(), Some("14/03/2025"));
        assert_eq!(p.seller_name.as_deref(), Some("Shakti Exports Pvt Ltd"));
        assert_eq!(p.buyer_name.as_deref(), Some("Nordic Trading AB"));
        assert_eq!(p.gstin.as_deref(), Some("27AAACS1234F1Z5"));
        assert_eq!(p.iec_code.as_deref(), Some("0123456789"));
        assert_eq!(p.currency.as_deref(), Some("USD"));
        assert_eq!(p.hsn_code.as_deref(), Some("850431"));
        assert_eq!(p.incoterms.as_deref(), Some("FOB"));
        assert_eq!(p.lut_reference.as_deref(), Some("AD270325012345X"));
        assert_eq!(p.subtotal, json!("4,500.00"));
        assert_eq!(p.total_amount, json!("5,000.00"));
        assert_eq!(p.tax_amount, json!("0.00"));
        assert!(p.line_items.is_empty());
    }

    #[test]
    fn tax_amount_takes_currency_symbols() {
        let p = extract("IGST @ 18%: ₹ 900.00\nTotal: ₹ 5,900.00");
        assert_eq!(p.tax_amount, json!("900.00"));
        assert_eq!(p.total_amount, json!("5,900.00"));
    }

    #[test]
    fn gstin_is_never_read_as_tax() {
        let p = extract("GST: 27AAACS1234F1Z5\nTax Amount: 0.00");
        assert_eq!(p.tax_amount, json!("0.00"));

        let p = extract("GSTIN: 27AAACS1234F1Z5");
        assert_eq!(p.tax_amount, Value::Null);
    }

    #[test]
    fn subtotal_is_not_the_total() {
        let p = extract("Subtotal: 900.00\nSub Total 950");
        assert_eq!(p.total_amount, Value::Null);
        assert_eq!(p.subtotal, json!("900.00"));
    }

    #[test]
    fn last_total_wins() {
        let p = extract("Page total: 1,200\nGrand Total: 3,450.75");
        assert_eq!(p.total_amount, json!("3,450.75"));
    }

    #[test]
    fn currency_match_is_case_insensitive() {
        let p = extract("amount payable in inr only");
        assert_eq!(p.currency.as_deref(), Some("inr"));
    }

    #[test]
    fn short_codes_are_rejected() {
        let p = extract("IEC: 12345\nHSN: 8504");
        assert_eq!(p.iec_code, None);
        assert_eq!(p.hsn_code, None);
    }

    #[test]
    fn empty_text_yields_empty_record() {
        assert_eq!(extract(""), PartialRecord::default());
    }
}
