use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::CoreError;
use crate::sentinel::{self, NOT_APPLICABLE, NOT_AVAILABLE};

pub const TICKER_FIELD: &str = "Ticker";
pub const PRIMARY_SHEET: &str = "Main";

pub const PRIMARY_FIELDS: &[&str] = &[
    "Ticker",
    "BBG Ticker",
    "FIGI",
    "Name",
    "Description",
    "Type",
    "Domicile",
    "Tot Ret Ytd",
    "Tot Ret 1Y",
    "Manager",
    "Fund Asset Class Focus",
    "Fund Asset Group",
    "Fund Industry Focus",
    "Fund Geographical Focus",
    "Fund Objective",
    "Economic Association",
    "Fund Strategy",
    "Fund Market Cap Focus",
    "Fund Style",
];

/// One cell as read from a sheet, before sentinel substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Missing,
    Text(String),
    Number(Number),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Missing,
            Value::String(text) => RawValue::Text(text),
            Value::Number(number) => RawValue::Number(number),
            other => RawValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

/// A normalized cell. Raw "no data" markers never survive into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(Number),
    NotAvailable,
    NotApplicable,
}

impl FieldValue {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, FieldValue::NotAvailable | FieldValue::NotApplicable)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) => number.as_f64(),
            _ => None,
        }
    }
}

impl From<RawValue> for FieldValue {
    fn from(raw: RawValue) -> Self {
        sentinel::substitute(raw)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Number(number) => write!(f, "{number}"),
            FieldValue::NotAvailable => f.write_str(NOT_AVAILABLE),
            FieldValue::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(text) => serializer.serialize_str(text),
            FieldValue::Number(number) => number.serialize(serializer),
            FieldValue::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
            FieldValue::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(FieldValue::from(RawValue::from_json(value)))
    }
}

pub type FieldMap = IndexMap<String, FieldValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Summary,
    Flow,
    Expense,
    Regulatory,
    Performance,
    Liquidity,
    Industry,
    Geography,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Summary,
        Category::Flow,
        Category::Expense,
        Category::Regulatory,
        Category::Performance,
        Category::Liquidity,
        Category::Industry,
        Category::Geography,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Summary => "Summary",
            Category::Flow => "Flow",
            Category::Expense => "Expense",
            Category::Regulatory => "Regulatory",
            Category::Performance => "Performance",
            Category::Liquidity => "Liquidity",
            Category::Industry => "Industry",
            Category::Geography => "Geography",
        }
    }

    pub fn sheet_name(&self) -> &'static str {
        self.as_str()
    }

    /// Columns read from the category sheet, ticker key included.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Category::Summary => &[
                "Name",
                "Ticker",
                "Class Assets (MLN USD)",
                "Fund Assets (MLN USD)",
                "Expense Ratio",
                "Year-To-Date Return",
                "12Months Yield",
                "30Days Volatility",
                "Year-To-Date Flow",
                "1Month Flow",
                "1 Year NAV Tracking Error",
                "Holdings",
                "Primary",
                "Cross",
            ],
            Category::Flow => &[
                "Ticker",
                "Currency, Security",
                "OAS Effective Duration",
                "OAS Duration Coverage Ratio",
                "YAS Modified Duration",
                "Options Available",
                "Payment Type",
            ],
            Category::Expense => &[
                "Ticker",
                "Expense Ratio",
                "Fund Manager Stated Fee",
                "Average Bid Ask Spread",
                "1 Year NAV Tracking Error",
                "Premium",
                "52Weeks Average Premium",
            ],
            Category::Regulatory => &[
                "Ticker",
                "Fund Type",
                "Structure",
                "Index Weight",
                "SFDR Class.",
                "Use Derivative",
                "Tax Form",
                "NAIC",
                "UCITS",
                "UK Reporting",
                "SFC",
                "China",
                "Leverage",
                "Inception Date",
            ],
            Category::Performance => &[
                "Ticker",
                "Name",
                "1 Day Return",
                "Month-To-Date Return",
                "Year-To-Date Return",
                "1 Year Return",
                "3 Years Return",
                "5 Years Return",
                "10 Years Return",
                "12 Months Yield",
            ],
            Category::Liquidity => &[
                "Ticker",
                "1 Day Volume",
                "Aggregated Volume",
                "Aggregated Value Traded",
                "Implied Liquidity",
                "Bid Ask Spread",
                "Short Interest%",
                "Open Interest",
            ],
            Category::Industry => &[
                "Ticker",
                "Materials",
                "Communications",
                "Consumer Cyclical",
                "Consumer Non-Cyclical",
                "Diversified",
                "Energy",
                "Financials",
                "Industrials",
                "Technology",
                "Utilities",
                "Government",
            ],
            Category::Geography => &[
                "Ticker",
                "N.Amer.",
                "LATAM",
                "West Euro",
                "APAC",
                "East Euro",
                "Africa/Middle East",
                "Central Asia",
            ],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| CoreError::UnknownCategory(value.to_string()))
    }
}

/// Canonical per-ticker entity assembled from the primary sheet and every
/// category sheet. `categories` always holds all of [`Category::ALL`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EtfRecordRepr")]
pub struct EtfRecord {
    pub ticker: String,
    pub display_name: String,
    pub base_fields: FieldMap,
    pub categories: IndexMap<Category, FieldMap>,
}

impl EtfRecord {
    pub fn base(&self, field: &str) -> Option<&FieldValue> {
        self.base_fields.get(field)
    }

    pub fn category(&self, category: Category) -> &FieldMap {
        // construction and deserialization both guarantee every key exists
        &self.categories[&category]
    }
}

#[derive(Deserialize)]
struct EtfRecordRepr {
    ticker: String,
    display_name: String,
    #[serde(default)]
    base_fields: FieldMap,
    #[serde(default)]
    categories: IndexMap<Category, FieldMap>,
}

impl TryFrom<EtfRecordRepr> for EtfRecord {
    type Error = CoreError;

    fn try_from(repr: EtfRecordRepr) -> Result<Self, Self::Error> {
        let mut repr = repr;
        let mut categories = IndexMap::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let fields = repr.categories.shift_remove(&category).ok_or_else(|| {
                CoreError::MissingCategory {
                    ticker: repr.ticker.clone(),
                    category: category.to_string(),
                }
            })?;
            categories.insert(category, fields);
        }
        Ok(EtfRecord {
            ticker: repr.ticker,
            display_name: repr.display_name,
            base_fields: repr.base_fields,
            categories,
        })
    }
}
