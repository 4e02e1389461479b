use std::path::Path;

use folio_core::{
    normalize_workbook, render_all, Category, CsvWorkbook, Diagnostic, FieldValue,
    PRIMARY_FIELDS, PRIMARY_SHEET,
};
use tempfile::tempdir;

fn write_sheet(dir: &Path, name: &str, columns: &[&str], rows: &[Vec<&str>]) {
    let mut writer = csv::Writer::from_path(dir.join(format!("{name}.csv"))).unwrap();
    writer.write_record(columns).unwrap();
    for row in rows {
        writer.write_record(row).unwrap();
    }
    writer.flush().unwrap();
}

fn primary_row<'a>(ticker: &'a str, name: &'a str) -> Vec<&'a str> {
    PRIMARY_FIELDS
        .iter()
        .map(|field| match *field {
            "Ticker" => ticker,
            "Name" => name,
            "Domicile" => "N/A",
            "Fund Style" => "#N/A Field Not Applicable",
            "Tot Ret 1Y" => "",
            _ => "value",
        })
        .collect()
}

fn summary_row(ticker: &str) -> Vec<&str> {
    Category::Summary
        .fields()
        .iter()
        .map(|field| match *field {
            "Ticker" => ticker,
            "Holdings" => "503",
            "Expense Ratio" => "--",
            _ => "1.0",
        })
        .collect()
}

#[test]
fn summary_only_for_first_ticker() {
    let dir = tempdir().unwrap();
    write_sheet(
        dir.path(),
        PRIMARY_SHEET,
        PRIMARY_FIELDS,
        &[
            primary_row("AAA US Equity", "Alpha Fund"),
            primary_row("BBB US Equity", "Beta Fund"),
        ],
    );
    for category in Category::ALL {
        let rows = if category == Category::Summary {
            vec![summary_row("AAA US Equity")]
        } else {
            Vec::new()
        };
        write_sheet(dir.path(), category.sheet_name(), category.fields(), &rows);
    }

    let workbook = CsvWorkbook::open(dir.path()).unwrap();
    let corpus = normalize_workbook(&workbook).unwrap();
    assert_eq!(corpus.len(), 2);

    let tickers: Vec<&str> = corpus.records.keys().map(String::as_str).collect();
    assert_eq!(tickers, ["AAA", "BBB"]);

    let aaa = corpus.get("AAA").unwrap();
    let bbb = corpus.get("BBB").unwrap();
    assert_eq!(aaa.display_name, "AAA US Equity");
    let summary = aaa.category(Category::Summary);
    assert_eq!(summary["Holdings"], FieldValue::Text("503".into()));
    assert_eq!(summary["Expense Ratio"], FieldValue::NotAvailable);
    assert!(!summary.contains_key("Ticker"));
    assert!(bbb.category(Category::Summary).is_empty());

    for record in corpus.records.values() {
        for category in Category::ALL {
            assert!(record.categories.contains_key(&category));
        }
        assert_eq!(record.base("Domicile"), Some(&FieldValue::NotAvailable));
        assert_eq!(record.base("Fund Style"), Some(&FieldValue::NotApplicable));
        assert_eq!(record.base("Tot Ret 1Y"), Some(&FieldValue::NotAvailable));
    }

    let bbb_summary = Diagnostic::MissingCategory {
        ticker: "BBB".into(),
        category: Category::Summary,
    };
    assert!(corpus.diagnostics.contains(&bbb_summary));
    assert!(!corpus.diagnostics.contains(&Diagnostic::MissingCategory {
        ticker: "AAA".into(),
        category: Category::Summary,
    }));

    let documents = render_all(&corpus.into_records()).unwrap();
    assert_eq!(documents.len(), 2);
    assert!(documents[0].text.contains("- **Number of Holdings**: 503"));
    assert!(documents[1].text.contains("- **Number of Holdings**: Not Available"));
}

#[test]
fn missing_category_column_aborts() {
    let dir = tempdir().unwrap();
    write_sheet(dir.path(), PRIMARY_SHEET, PRIMARY_FIELDS, &[]);
    for category in Category::ALL {
        let columns: Vec<&str> = category
            .fields()
            .iter()
            .copied()
            .filter(|field| !(category == Category::Geography && *field == "APAC"))
            .collect();
        write_sheet(dir.path(), category.sheet_name(), &columns, &[]);
    }
    let workbook = CsvWorkbook::open(dir.path()).unwrap();
    let err = normalize_workbook(&workbook).unwrap_err();
    assert!(err.to_string().contains("APAC"));
}
