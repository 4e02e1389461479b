mod diagnostics;
mod error;
mod model;
mod normalize;
mod render;
mod sentinel;
mod sheet;
mod store;

pub use diagnostics::{emit_all, Diagnostic};
pub use error::{CoreError, Result};
pub use model::{
    Category, EtfRecord, FieldMap, FieldValue, RawValue, PRIMARY_FIELDS, PRIMARY_SHEET,
    TICKER_FIELD,
};
pub use normalize::{
    extract_ticker, key_rows, merge, normalize_workbook, CategoryTables, KeyedRow,
    NormalizedCorpus,
};
pub use render::{
    format_number, render_all, render_document, summarize_sectors, Document, RenderedDocument,
    SectorSummary, REQUIRED_BASE_FIELDS, TOP_SECTORS,
};
pub use sentinel::{renormalize, substitute, NOT_APPLICABLE, NOT_AVAILABLE};
pub use sheet::{CsvWorkbook, MemoryWorkbook, RawRow, Sheet, SheetSource};
pub use store::{export_documents, load_records, save_records, JsonlWriter};
