use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::model::{
    Category, EtfRecord, FieldMap, FieldValue, RawValue, PRIMARY_FIELDS, PRIMARY_SHEET,
    TICKER_FIELD,
};
use crate::sheet::{Sheet, SheetSource};

/// Takes the leading whitespace-delimited token of a textual ticker
/// ("SPY US Equity" -> "SPY"); numbers are used verbatim.
pub fn extract_ticker(raw: &RawValue) -> Option<String> {
    match raw {
        RawValue::Missing => None,
        RawValue::Number(number) => Some(number.to_string()),
        RawValue::Text(text) => text.split_whitespace().next().map(str::to_string),
    }
}

fn display_name(raw: &RawValue) -> String {
    match raw {
        RawValue::Missing => String::new(),
        RawValue::Number(number) => number.to_string(),
        RawValue::Text(text) => text.clone(),
    }
}

/// A sheet row keyed by its extracted ticker, ticker column removed.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRow {
    pub display_name: String,
    pub fields: FieldMap,
}

/// Keys the rows of `sheet` by ticker. Rows without a ticker are skipped and
/// later rows overwrite earlier rows with the same ticker; both are reported.
pub fn key_rows(sheet: &Sheet, diagnostics: &mut Vec<Diagnostic>) -> IndexMap<String, KeyedRow> {
    let mut keyed = IndexMap::with_capacity(sheet.len());
    for (idx, row) in sheet.rows().iter().enumerate() {
        let raw_ticker = row.get(TICKER_FIELD).unwrap_or(&RawValue::Missing);
        let Some(ticker) = extract_ticker(raw_ticker) else {
            diagnostics.push(Diagnostic::MissingTicker {
                sheet: sheet.name().to_string(),
                row: idx + 1,
            });
            continue;
        };
        let fields: FieldMap = row
            .iter()
            .filter(|(column, _)| column.as_str() != TICKER_FIELD)
            .map(|(column, value)| (column.clone(), FieldValue::from(value.clone())))
            .collect();
        let entry = KeyedRow {
            display_name: display_name(raw_ticker),
            fields,
        };
        if keyed.insert(ticker.clone(), entry).is_some() {
            diagnostics.push(Diagnostic::DuplicateTicker {
                sheet: sheet.name().to_string(),
                ticker,
            });
        }
    }
    keyed
}

pub type CategoryTables = IndexMap<Category, IndexMap<String, FieldMap>>;

#[derive(Debug, Clone, Default)]
pub struct NormalizedCorpus {
    pub records: IndexMap<String, EtfRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl NormalizedCorpus {
    pub fn get(&self, ticker: &str) -> Option<&EtfRecord> {
        self.records.get(ticker)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in primary sheet order.
    pub fn into_records(self) -> Vec<EtfRecord> {
        self.records.into_values().collect()
    }

    pub fn diagnostics_for<'a>(&'a self, ticker: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.ticker() == Some(ticker))
    }
}

/// Reads the primary sheet and every category sheet from `source` and merges
/// them into one record per primary ticker.
pub fn normalize_workbook<S: SheetSource + ?Sized>(source: &S) -> Result<NormalizedCorpus> {
    let mut diagnostics = Vec::new();
    let primary_sheet = source.sheet(PRIMARY_SHEET)?.select(PRIMARY_FIELDS)?;
    let primary = key_rows(&primary_sheet, &mut diagnostics);
    let mut tables = CategoryTables::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let sheet = source
            .sheet(category.sheet_name())?
            .select(category.fields())?;
        let rows = key_rows(&sheet, &mut diagnostics)
            .into_iter()
            .map(|(ticker, row)| (ticker, row.fields))
            .collect();
        tables.insert(category, rows);
    }
    let corpus = merge(primary, &tables, diagnostics);
    tracing::info!(
        records = corpus.len(),
        diagnostics = corpus.diagnostics.len(),
        "normalized workbook"
    );
    Ok(corpus)
}

/// Attaches every category to every primary ticker, using an empty map where a
/// category has no row for it.
pub fn merge(
    primary: IndexMap<String, KeyedRow>,
    tables: &CategoryTables,
    mut diagnostics: Vec<Diagnostic>,
) -> NormalizedCorpus {
    let orphans: BTreeSet<&String> = tables
        .values()
        .flat_map(|rows| rows.keys())
        .filter(|ticker| !primary.contains_key(*ticker))
        .collect();
    for ticker in orphans {
        diagnostics.push(Diagnostic::OrphanTicker {
            ticker: ticker.clone(),
        });
    }

    let mut records = IndexMap::with_capacity(primary.len());
    for (ticker, row) in primary {
        let mut categories = IndexMap::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let fields = match tables.get(&category).and_then(|rows| rows.get(&ticker)) {
                Some(fields) => fields.clone(),
                None => {
                    diagnostics.push(Diagnostic::MissingCategory {
                        ticker: ticker.clone(),
                        category,
                    });
                    FieldMap::new()
                }
            };
            categories.insert(category, fields);
        }
        let record = EtfRecord {
            ticker: ticker.clone(),
            display_name: row.display_name,
            base_fields: row.fields,
            categories,
        };
        records.insert(ticker, record);
    }
    NormalizedCorpus {
        records,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::MemoryWorkbook;
    use serde_json::Number;

    #[test]
    fn ticker_extraction_takes_leading_token() {
        assert_eq!(extract_ticker(&"SPY US Equity".into()), Some("SPY".into()));
        assert_eq!(extract_ticker(&"QQQ".into()), Some("QQQ".into()));
        assert_eq!(
            extract_ticker(&RawValue::Number(Number::from(2800))),
            Some("2800".into())
        );
        assert_eq!(extract_ticker(&"   ".into()), None);
        assert_eq!(extract_ticker(&RawValue::Missing), None);
    }

    #[test]
    fn key_rows_skips_missing_tickers_and_keeps_last_duplicate() {
        let sheet = Sheet::new("Expense", &["Ticker", "Premium"])
            .with_row(["AAA US Equity", "0.1"])
            .with_row(vec![RawValue::Missing, RawValue::text("9")])
            .with_row(["AAA US Equity", "0.2"]);
        let mut diagnostics = Vec::new();
        let rows = key_rows(&sheet, &mut diagnostics);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows["AAA"].fields["Premium"],
            FieldValue::Text("0.2".into())
        );
        assert!(!rows["AAA"].fields.contains_key(TICKER_FIELD));
        assert_eq!(
            diagnostics,
            vec![
                Diagnostic::MissingTicker {
                    sheet: "Expense".into(),
                    row: 2
                },
                Diagnostic::DuplicateTicker {
                    sheet: "Expense".into(),
                    ticker: "AAA".into()
                },
            ]
        );
    }

    #[test]
    fn merge_reports_orphans_and_fills_every_category() {
        let sheet = Sheet::new("Main", &["Ticker", "Name"]).with_row(["AAA US Equity", "Alpha"]);
        let mut diagnostics = Vec::new();
        let primary = key_rows(&sheet, &mut diagnostics);
        let mut tables = CategoryTables::new();
        let mut summary = IndexMap::new();
        summary.insert("ZZZ".to_string(), FieldMap::new());
        tables.insert(Category::Summary, summary);
        let corpus = merge(primary, &tables, diagnostics);
        let record = corpus.get("AAA").unwrap();
        assert_eq!(record.categories.len(), Category::ALL.len());
        assert_eq!(record.display_name, "AAA US Equity");
        assert!(corpus
            .diagnostics
            .contains(&Diagnostic::OrphanTicker { ticker: "ZZZ".into() }));
        assert_eq!(corpus.diagnostics_for("AAA").count(), Category::ALL.len());
    }

    #[test]
    fn normalize_workbook_requires_every_sheet() {
        let workbook = MemoryWorkbook::new().with_sheet(Sheet::new("Main", PRIMARY_FIELDS));
        let err = normalize_workbook(&workbook).unwrap_err();
        assert!(err.to_string().contains("Summary"));
    }
}
