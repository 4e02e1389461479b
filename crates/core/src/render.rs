use serde::{Deserialize, Serialize};

use crate::diagnostics::{self, Diagnostic};
use crate::error::{CoreError, Result};
use crate::model::{Category, EtfRecord, FieldValue};

pub const REQUIRED_BASE_FIELDS: &[&str] = &[
    "Name",
    "Description",
    "Manager",
    "Fund Asset Class Focus",
    "Fund Asset Group",
    "Fund Geographical Focus",
    "Fund Objective",
    "Fund Strategy",
    "Fund Market Cap Focus",
];

/// Industry columns considered for the major-sector summary, in tie-break order.
pub const TOP_SECTORS: [&str; 4] = [
    "Technology",
    "Consumer Non-Cyclical",
    "Communications",
    "Financials",
];

const GENERAL_FIELDS: [(&str, Source); 8] = [
    ("Fund Type", Source::Category(Category::Regulatory, "Fund Type")),
    ("Manager", Source::Base("Manager")),
    ("Asset Class Focus", Source::Base("Fund Asset Class Focus")),
    ("Fund Asset Group", Source::Base("Fund Asset Group")),
    ("Geographical Focus", Source::Base("Fund Geographical Focus")),
    ("Fund Objective", Source::Base("Fund Objective")),
    ("Fund Strategy", Source::Base("Fund Strategy")),
    ("Market Cap Focus", Source::Base("Fund Market Cap Focus")),
];

const REGIONS: [(&str, &str); 2] = [("North America", "N.Amer."), ("Western Europe", "West Euro")];

const ADDITIONAL_FIELDS: [(&str, Source); 4] = [
    ("Options Available", Source::Category(Category::Flow, "Options Available")),
    ("Payment Type", Source::Category(Category::Flow, "Payment Type")),
    ("Structure", Source::Category(Category::Regulatory, "Structure")),
    ("Inception Date", Source::Category(Category::Regulatory, "Inception Date")),
];

#[derive(Debug, Clone, Copy)]
enum Source {
    Base(&'static str),
    Category(Category, &'static str),
}

/// Rendered text for one ticker, the unit handed to the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub ticker: String,
    pub text: String,
}

impl Document {
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.ticker.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorSummary {
    pub major: Option<(String, f64)>,
    pub total: f64,
}

/// Renders the fixed ETF template. Pure: the same record always yields the
/// same bytes.
pub fn render_document(record: &EtfRecord) -> Result<RenderedDocument> {
    for field in REQUIRED_BASE_FIELDS {
        base(record, field)?;
    }
    let mut diagnostics = Vec::new();
    let sectors = summarize_sectors(record, &mut diagnostics)?;

    let mut out = String::new();
    out.push_str(&format!(
        "The ETF's ticker is {} ({}), known as the {}.\n",
        record.ticker,
        record.display_name,
        base(record, "Name")?
    ));
    out.push_str(&format!("{}\n", base(record, "Description")?));

    section(&mut out, "General Information");
    for (label, source) in GENERAL_FIELDS {
        field_line(&mut out, label, &lookup(record, source)?.to_string());
    }

    section(&mut out, "Holdings and Allocations");
    field_line(
        &mut out,
        "Number of Holdings",
        &lookup(record, Source::Category(Category::Summary, "Holdings"))?.to_string(),
    );
    let major = match &sectors.major {
        Some((name, share)) => format!("{} ({}%)", name, format_number(*share)),
        None => "N/A (0%)".to_string(),
    };
    field_line(&mut out, "Major Sector", &major);
    field_line(
        &mut out,
        "Top Sectors Total Allocation",
        &format!("{}%", format_number(sectors.total)),
    );
    out.push_str("- **Top Sectors**:\n");
    for sector in TOP_SECTORS {
        let value = lookup(record, Source::Category(Category::Industry, sector))?;
        out.push_str(&format!("  - {}: {}\n", sector, percent(&value)));
    }

    section(&mut out, "Geographic Allocation");
    for (label, column) in REGIONS {
        let value = lookup(record, Source::Category(Category::Geography, column))?;
        out.push_str(&format!("- {}: {}\n", label, percent(&value)));
    }

    section(&mut out, "Additional Features");
    for (label, source) in ADDITIONAL_FIELDS {
        field_line(&mut out, label, &lookup(record, source)?.to_string());
    }

    Ok(RenderedDocument {
        document: Document {
            ticker: record.ticker.clone(),
            text: out.trim_end().to_string(),
        },
        diagnostics,
    })
}

/// Renders every record in order, reporting data-quality findings as it goes.
/// The first record that cannot be rendered aborts the whole batch.
pub fn render_all(records: &[EtfRecord]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(records.len());
    for record in records {
        let rendered = render_document(record)?;
        diagnostics::emit_all(&rendered.diagnostics);
        documents.push(rendered.document);
    }
    Ok(documents)
}

/// Picks the largest of [`TOP_SECTORS`] and sums them. Sentinel values are
/// skipped; unparsable text is skipped and reported.
pub fn summarize_sectors(
    record: &EtfRecord,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<SectorSummary> {
    let mut major: Option<(String, f64)> = None;
    let mut total = 0.0;
    for sector in TOP_SECTORS {
        let value = lookup(record, Source::Category(Category::Industry, sector))?;
        let share = match parse_percent(&value) {
            Percent::Absent => continue,
            Percent::Invalid(raw) => {
                diagnostics.push(Diagnostic::UnparsableSector {
                    ticker: record.ticker.clone(),
                    sector: sector.to_string(),
                    value: raw,
                });
                continue;
            }
            Percent::Value(share) => share,
        };
        total += share;
        if major.as_ref().map_or(true, |(_, best)| share > *best) {
            major = Some((sector.to_string(), share));
        }
    }
    Ok(SectorSummary { major, total })
}

enum Percent {
    Absent,
    Invalid(String),
    Value(f64),
}

fn parse_percent(value: &FieldValue) -> Percent {
    match value {
        FieldValue::NotAvailable | FieldValue::NotApplicable => Percent::Absent,
        FieldValue::Number(number) => match number.as_f64() {
            Some(share) => Percent::Value(share),
            None => Percent::Invalid(number.to_string()),
        },
        FieldValue::Text(text) => {
            let stripped = text.strip_suffix('%').unwrap_or(text).trim();
            match stripped.parse::<f64>() {
                Ok(share) if share.is_finite() => Percent::Value(share),
                _ => Percent::Invalid(text.clone()),
            }
        }
    }
}

fn base<'a>(record: &'a EtfRecord, field: &str) -> Result<&'a FieldValue> {
    record
        .base(field)
        .ok_or_else(|| CoreError::MissingField {
            ticker: record.ticker.clone(),
            field: field.to_string(),
        })
}

fn lookup(record: &EtfRecord, source: Source) -> Result<FieldValue> {
    match source {
        Source::Base(field) => base(record, field).cloned(),
        Source::Category(category, field) => {
            let fields = record.category(category);
            if fields.is_empty() {
                // no row in that sheet for this ticker
                return Ok(FieldValue::NotAvailable);
            }
            fields
                .get(field)
                .cloned()
                .ok_or_else(|| CoreError::MissingField {
                    ticker: record.ticker.clone(),
                    field: format!("{category}.{field}"),
                })
        }
    }
}

fn section(out: &mut String, title: &str) {
    out.push_str(&format!("\n**{title}:**\n"));
}

fn field_line(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!("- **{label}**: {value}\n"));
}

fn percent(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(number) => match number.as_f64() {
            Some(share) => format!("{}%", format_number(share)),
            None => format!("{number}%"),
        },
        FieldValue::Text(text) if !text.ends_with('%') && text.trim().parse::<f64>().is_ok() => {
            format!("{}%", text.trim())
        }
        other => other.to_string(),
    }
}

/// At most two decimals, trailing zeros dropped.
pub fn format_number(value: f64) -> String {
    let mut text = format!("{value:.2}");
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}
