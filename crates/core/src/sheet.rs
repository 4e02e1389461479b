use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use flate2::read::MultiGzDecoder;
use indexmap::IndexMap;

use crate::error::{CoreError, Result};
use crate::model::RawValue;

pub type RawRow = IndexMap<String, RawValue>;

/// A named table of raw rows. Every row carries every column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    columns: Vec<String>,
    rows: Vec<RawRow>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.trim().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row; cells are matched to columns positionally and short rows
    /// are padded with [`RawValue::Missing`].
    pub fn push_row<I, V>(&mut self, cells: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<RawValue>,
    {
        let mut cells = cells.into_iter().map(Into::into);
        let row = self
            .columns
            .iter()
            .map(|column| (column.clone(), cells.next().unwrap_or(RawValue::Missing)))
            .collect();
        self.rows.push(row);
    }

    pub fn with_row<I, V>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RawValue>,
    {
        self.push_row(cells);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Restricts the sheet to `fields`, in that order. A declared field the
    /// sheet does not carry is an error.
    pub fn select(&self, fields: &[&str]) -> Result<Sheet> {
        for field in fields {
            if !self.columns.iter().any(|c| c == field) {
                return Err(CoreError::MissingColumn {
                    sheet: self.name.clone(),
                    column: field.to_string(),
                });
            }
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                fields
                    .iter()
                    .map(|field| {
                        let value = row.get(*field).cloned().unwrap_or(RawValue::Missing);
                        (field.to_string(), value)
                    })
                    .collect()
            })
            .collect();
        Ok(Sheet {
            name: self.name.clone(),
            columns: fields.iter().map(|f| f.to_string()).collect(),
            rows,
        })
    }
}

/// Anything that can hand out sheets by name.
pub trait SheetSource {
    fn sheet(&self, name: &str) -> Result<Sheet>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryWorkbook {
    sheets: HashMap<String, Sheet>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sheet: Sheet) {
        self.sheets.insert(sheet.name.clone(), sheet);
    }

    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.insert(sheet);
        self
    }
}

impl SheetSource for MemoryWorkbook {
    fn sheet(&self, name: &str) -> Result<Sheet> {
        self.sheets
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::MissingSheet {
                sheet: name.to_string(),
                root: PathBuf::from("<memory>"),
            })
    }
}

/// A directory holding one delimited file per sheet, e.g. `Main.csv`,
/// `Summary.tsv` or `Flow.csv.gz`.
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    root: PathBuf,
}

#[derive(Debug, Clone, Copy)]
enum SheetFormat {
    Csv,
    Tsv,
    CsvGz,
    TsvGz,
}

impl SheetFormat {
    const ALL: [SheetFormat; 4] = [
        SheetFormat::Csv,
        SheetFormat::Tsv,
        SheetFormat::CsvGz,
        SheetFormat::TsvGz,
    ];

    fn extension(&self) -> &'static str {
        match self {
            SheetFormat::Csv => "csv",
            SheetFormat::Tsv => "tsv",
            SheetFormat::CsvGz => "csv.gz",
            SheetFormat::TsvGz => "tsv.gz",
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            SheetFormat::Csv | SheetFormat::CsvGz => b',',
            SheetFormat::Tsv | SheetFormat::TsvGz => b'\t',
        }
    }

    fn gzipped(&self) -> bool {
        matches!(self, SheetFormat::CsvGz | SheetFormat::TsvGz)
    }
}

impl CsvWorkbook {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::metadata(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, name: &str) -> Option<(PathBuf, SheetFormat)> {
        SheetFormat::ALL.iter().find_map(|format| {
            let path = self.root.join(format!("{name}.{}", format.extension()));
            path.is_file().then_some((path, *format))
        })
    }
}

impl SheetSource for CsvWorkbook {
    fn sheet(&self, name: &str) -> Result<Sheet> {
        let (path, format) = self.locate(name).ok_or_else(|| CoreError::MissingSheet {
            sheet: name.to_string(),
            root: self.root.clone(),
        })?;
        let file = fs::File::open(&path)?;
        if format.gzipped() {
            read_delimited(name, &path, MultiGzDecoder::new(file), format.delimiter())
        } else {
            read_delimited(name, &path, file, format.delimiter())
        }
    }
}

fn read_delimited<R: Read>(name: &str, path: &Path, reader: R, delimiter: u8) -> Result<Sheet> {
    let csv_err = |source| CoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|cell| cell.trim().to_string())
        .collect();
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
    let mut sheet = Sheet::new(name, &header_refs);
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        sheet.push_row(record.iter().map(cell_value));
    }
    tracing::debug!(sheet = name, rows = sheet.len(), path = %path.display(), "loaded sheet");
    Ok(sheet)
}

fn cell_value(cell: &str) -> RawValue {
    if cell.is_empty() {
        RawValue::Missing
    } else {
        RawValue::Text(cell.to_string())
    }
}
