//! List query options and filter predicates for the record service.
//!
//! Predicates are built from field names and values, never by pasting user
//! input into a filter string. Values are rendered as quoted literals with
//! `\` and `"` escaped, and field names are checked against the identifier
//! charset the service accepts.

use std::fmt;
use thiserror::Error;

use crate::records::Record;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid filter field name: {0:?}")]
    InvalidField(String),
}

/// Comparison operator of a [`Filter::Compare`] node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    /// Case-insensitive substring match
    Like,
}

impl FilterOp {
    fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Like => "~",
        }
    }
}

/// Literal operand of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<&String> for FilterValue {
    fn from(value: &String) -> Self {
        FilterValue::Text(value.clone())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value as f64)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(text) => {
                f.write_str("\"")?;
                for c in text.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '"' => f.write_str("\\\"")?,
                        _ => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            FilterValue::Number(n) => write!(f, "{n}"),
            FilterValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A filter predicate evaluated server-side
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        field: String,
        op: FilterOp,
        value: FilterValue,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn compare(
        field: &str,
        op: FilterOp,
        value: impl Into<FilterValue>,
    ) -> Result<Self, FilterError> {
        validate_field(field)?;
        Ok(Filter::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
        })
    }

    /// `field = value`
    pub fn eq(field: &str, value: impl Into<FilterValue>) -> Result<Self, FilterError> {
        Self::compare(field, FilterOp::Eq, value)
    }

    /// `field != value`
    pub fn ne(field: &str, value: impl Into<FilterValue>) -> Result<Self, FilterError> {
        Self::compare(field, FilterOp::Ne, value)
    }

    /// `field ~ value`
    pub fn like(field: &str, value: impl Into<FilterValue>) -> Result<Self, FilterError> {
        Self::compare(field, FilterOp::Like, value)
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut parts) => {
                parts.push(other);
                Filter::Or(parts)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    /// Render to the service's filter syntax
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { field, op, value } => {
                write!(f, "{} {} {}", field, op.as_str(), value)
            }
            Filter::And(parts) => write_group(f, parts, " && "),
            Filter::Or(parts) => write_group(f, parts, " || "),
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, parts: &[Filter], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{part}")?;
    }
    f.write_str(")")
}

fn validate_field(field: &str) -> Result<(), FilterError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidField(field.to_string()))
    }
}

/// Query options for a collection listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    pub page: u32,
    pub per_page: u32,
    pub sort: Option<String>,
    pub filter: Option<Filter>,
    pub expand: Vec<String>,
}

impl ListOptions {
    /// Defaults the app uses for `R`: its sort, its expansions, first page.
    pub fn for_record<R: Record>() -> Self {
        Self {
            page: 1,
            per_page: R::DEFAULT_PER_PAGE,
            sort: Some(R::DEFAULT_SORT.to_string()),
            filter: None,
            expand: R::EXPAND.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page.max(1);
        self.per_page = per_page.max(1);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Query string pairs in the service's parameter names
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("page", self.page.to_string()),
            ("perPage", self.per_page.to_string()),
        ];
        if let Some(sort) = &self.sort {
            query.push(("sort", sort.clone()));
        }
        if let Some(filter) = &self.filter {
            query.push(("filter", filter.render()));
        }
        if !self.expand.is_empty() {
            query.push(("expand", self.expand.join(",")));
        }
        query
    }
}
