use std::fmt;

use crate::model::Category;

/// Recoverable data-quality findings. They are reported, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    MissingTicker { sheet: String, row: usize },
    DuplicateTicker { sheet: String, ticker: String },
    MissingCategory { ticker: String, category: Category },
    OrphanTicker { ticker: String },
    UnparsableSector {
        ticker: String,
        sector: String,
        value: String,
    },
}

impl Diagnostic {
    pub fn ticker(&self) -> Option<&str> {
        match self {
            Diagnostic::MissingTicker { .. } => None,
            Diagnostic::DuplicateTicker { ticker, .. }
            | Diagnostic::MissingCategory { ticker, .. }
            | Diagnostic::OrphanTicker { ticker }
            | Diagnostic::UnparsableSector { ticker, .. } => Some(ticker),
        }
    }

    pub fn emit(&self) {
        tracing::warn!(target: "folio::data_quality", "{self}");
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingTicker { sheet, row } => {
                write!(f, "skipping row {row} of sheet {sheet}: missing ticker")
            }
            Diagnostic::DuplicateTicker { sheet, ticker } => {
                write!(f, "duplicate ticker {ticker} in sheet {sheet}; keeping the later row")
            }
            Diagnostic::MissingCategory { ticker, category } => {
                write!(f, "missing data for ticker {ticker} in category {category}")
            }
            Diagnostic::OrphanTicker { ticker } => {
                write!(f, "ticker {ticker} has category data but no primary row")
            }
            Diagnostic::UnparsableSector {
                ticker,
                sector,
                value,
            } => write!(f, "ticker {ticker}: sector {sector} value {value:?} is not a percentage"),
        }
    }
}

pub fn emit_all(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        diagnostic.emit();
    }
}
