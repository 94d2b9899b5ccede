// src/record.rs

use crate::normalize::{self, de_number, de_text, is_empty_value, normalize_text};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Invoice currency. Anything outside the known codes is `Unknown`, never
/// the closest match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Inr,
    Unknown,
}

impl Currency {
    /// Blank input is absent; everything else maps to a code or `Unknown`.
    pub fn parse(raw: &str) -> Option<Self> {
        let code = raw.trim().to_uppercase();
        if code.is_empty() {
            return None;
        }
        Some(match code.as_str() {
            "USD" => Self::Usd,
            "EUR" => Self::Eur,
            "GBP" => Self::Gbp,
            "INR" => Self::Inr,
            _ => Self::Unknown,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Inr => "INR",
            Self::Unknown => "unknown",
        }
    }
}

/// Trade term. Same rule as [`Currency`]: unrecognized but present is
/// `Unknown`, which still counts as declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Incoterm {
    Exw,
    Fob,
    Cif,
    Dap,
    Ddp,
    Cfr,
    Unknown,
}

impl Incoterm {
    pub fn parse(raw: &str) -> Option<Self> {
        let term = raw.trim().to_uppercase();
        if term.is_empty() {
            return None;
        }
        Some(match term.as_str() {
            "EXW" => Self::Exw,
            "FOB" => Self::Fob,
            "CIF" => Self::Cif,
            "DAP" => Self::Dap,
            "DDP" => Self::Ddp,
            "CFR" => Self::Cfr,
            _ => Self::Unknown,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exw => "EXW",
            Self::Fob => "FOB",
            Self::Cif => "CIF",
            Self::Dap => "DAP",
            Self::Ddp => "DDP",
            Self::Cfr => "CFR",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Incoterm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl Serialize for Incoterm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn de_currency<'de, D>(deserializer: D) -> Result<Option<Currency>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_text(deserializer)?.as_deref().and_then(Currency::parse))
}

fn de_incoterm<'de, D>(deserializer: D) -> Result<Option<Incoterm>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_text(deserializer)?.as_deref().and_then(Incoterm::parse))
}

/// Keep whatever line items parse; drop the rest.
fn de_line_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// A single invoice line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "de_description")]
    pub description: String,
    #[serde(default, deserialize_with = "de_number")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "de_number")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "de_number")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "de_text")]
    pub hsn_code: Option<String>,
}

fn de_description<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_text(deserializer)?.unwrap_or_default())
}

/// The canonical, typed invoice under assessment.
///
/// Built once per document (or once per what-if request) and treated as
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceRecord {
    #[serde(deserialize_with = "de_text")]
    pub invoice_number: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub invoice_date: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub seller_name: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub buyer_name: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub gstin: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub iec_code: Option<String>,
    #[serde(deserialize_with = "de_currency")]
    pub currency: Option<Currency>,
    #[serde(deserialize_with = "de_number")]
    pub subtotal: Option<f64>,
    #[serde(deserialize_with = "de_number")]
    pub tax_amount: Option<f64>,
    #[serde(deserialize_with = "de_number")]
    pub total_amount: Option<f64>,
    #[serde(deserialize_with = "de_text")]
    pub hsn_code: Option<String>,
    #[serde(deserialize_with = "de_incoterm")]
    pub incoterms: Option<Incoterm>,
    #[serde(deserialize_with = "de_text")]
    pub lut_reference: Option<String>,
    #[serde(deserialize_with = "de_line_items")]
    pub line_items: Vec<LineItem>,
}

impl InvoiceRecord {
    /// How many scalar fields are filled, out of how many.
    pub fn coverage(&self) -> (usize, usize) {
        let filled = [
            self.invoice_number.is_some(),
            self.invoice_date.is_some(),
            self.seller_name.is_some(),
            self.buyer_name.is_some(),
            self.gstin.is_some(),
            self.iec_code.is_some(),
            self.currency.is_some(),
            self.subtotal.is_some(),
            self.tax_amount.is_some(),
            self.total_amount.is_some(),
            self.hsn_code.is_some(),
            self.incoterms.is_some(),
            self.lut_reference.is_some(),
        ];
        let total = filled.len();
        (filled.iter().filter(|&&v| v).count(), total)
    }
}

/// Loosely-typed fields as an extractor produced them.
///
/// Text fields accept bare numbers; amounts stay raw until [`merge`]
/// normalizes them. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialRecord {
    #[serde(deserialize_with = "de_text")]
    pub invoice_number: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub invoice_date: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub seller_name: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub buyer_name: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub gstin: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub iec_code: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub currency: Option<String>,
    pub subtotal: Value,
    pub tax_amount: Value,
    pub total_amount: Value,
    #[serde(deserialize_with = "de_text")]
    pub hsn_code: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub incoterms: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub lut_reference: Option<String>,
    #[serde(deserialize_with = "de_line_items")]
    pub line_items: Vec<LineItem>,
}

impl From<PartialRecord> for InvoiceRecord {
    fn from(partial: PartialRecord) -> Self {
        merge(partial, PartialRecord::default())
    }
}

fn pick_text(primary: Option<String>, overlay: Option<String>) -> Option<String> {
    normalize_text(overlay).or_else(|| normalize_text(primary))
}

fn pick_value(primary: Value, overlay: Value) -> Value {
    if is_empty_value(&overlay) {
        primary
    } else {
        overlay
    }
}

/// Combine two extraction passes into one record.
///
/// A field from `overlay` wins only when it is non-null and non-empty;
/// otherwise `primary`'s value stands. Precedence is decided on the raw
/// values, normalization happens after.
pub fn merge(primary: PartialRecord, overlay: PartialRecord) -> InvoiceRecord {
    let line_items = if overlay.line_items.is_empty() {
        primary.line_items
    } else {
        overlay.line_items
    };

    InvoiceRecord {
        invoice_number: pick_text(primary.invoice_number, overlay.invoice_number),
        invoice_date: pick_text(primary.invoice_date, overlay.invoice_date),
        seller_name: pick_text(primary.seller_name, overlay.seller_name),
        buyer_name: pick_text(primary.buyer_name, overlay.buyer_name),
        gstin: pick_text(primary.gstin, overlay.gstin),
        iec_code: pick_text(primary.iec_code, overlay.iec_code),
        currency: pick_text(primary.currency, overlay.currency)
            .as_deref()
            .and_then(Currency::parse),
        subtotal: normalize::normalize_numeric(&pick_value(primary.subtotal, overlay.subtotal)),
        tax_amount: normalize::normalize_numeric(&pick_value(
            primary.tax_amount,
            overlay.tax_amount,
        )),
        total_amount: normalize::normalize_numeric(&pick_value(
            primary.total_amount,
            overlay.total_amount,
        )),
        hsn_code: pick_text(primary.hsn_code, overlay.hsn_code),
        incoterms: pick_text(primary.incoterms, overlay.incoterms)
            .as_deref()
            .and_then(Incoterm::parse),
        lut_reference: pick_text(primary.lut_reference, overlay.lut_reference),
        line_items,
    }
}
