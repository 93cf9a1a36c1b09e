//! Metadata filters over complaint documents.
//!
//! Filters arrive as loosely-typed JSON produced by the generative service,
//! e.g. `{"client_region": ["MC", "LC"], "complaint_date": ">2024-06-15"}`.
//! They are validated once into [`MetadataFilter`] and then evaluated against
//! document metadata during search.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::{DomainError, Document};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Metadata fields a filter may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterField {
    ClientName,
    ClientRegion,
    ComplaintDate,
}

impl FilterField {
    pub const ALL: [FilterField; 3] = [
        FilterField::ClientName,
        FilterField::ClientRegion,
        FilterField::ComplaintDate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterField::ClientName => "client_name",
            FilterField::ClientRegion => "client_region",
            FilterField::ComplaintDate => "complaint_date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    fn is_date(self) -> bool {
        matches!(self, FilterField::ComplaintDate)
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparison {
    fn symbol(self) -> &'static str {
        match self {
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
        }
    }

    fn holds(self, left: NaiveDate, right: NaiveDate) -> bool {
        match self {
            Comparison::Greater => left > right,
            Comparison::GreaterOrEqual => left >= right,
            Comparison::Less => left < right,
            Comparison::LessOrEqual => left <= right,
        }
    }

    /// Splits a leading operator off `raw`. Two-character operators win.
    fn split(raw: &str) -> Option<(Self, &str)> {
        [
            Comparison::GreaterOrEqual,
            Comparison::LessOrEqual,
            Comparison::Greater,
            Comparison::Less,
        ]
        .into_iter()
        .find_map(|op| raw.strip_prefix(op.symbol()).map(|rest| (op, rest)))
    }
}

/// Constraint applied to a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldConstraint {
    /// Exact match.
    Equals(String),
    /// Matches if the value equals any alternative.
    AnyOf(Vec<String>),
    /// Date comparison, e.g. `>2024-06-15`.
    Compare(Comparison, NaiveDate),
    /// Case-insensitive substring, written `~acme`.
    Like(String),
}

impl FieldConstraint {
    fn parse(field: FilterField, value: &Value) -> Result<Self, DomainError> {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(DomainError::validation(format!(
                        "filter field `{field}` has an empty set of alternatives"
                    )));
                }
                let alternatives = items
                    .iter()
                    .map(|item| scalar_literal(field, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FieldConstraint::AnyOf(alternatives))
            }
            Value::String(raw) => Self::parse_expression(field, raw.trim()),
            other => scalar_literal(field, other).map(FieldConstraint::Equals),
        }
    }

    fn parse_expression(field: FilterField, raw: &str) -> Result<Self, DomainError> {
        if let Some((op, rest)) = Comparison::split(raw) {
            if !field.is_date() {
                return Err(DomainError::validation(format!(
                    "comparison `{raw}` is only supported on date fields, not `{field}`"
                )));
            }
            let date = NaiveDate::parse_from_str(rest.trim(), DATE_FORMAT).map_err(|_| {
                DomainError::validation(format!(
                    "malformed date comparison `{raw}` on `{field}`, expected e.g. `>2024-06-15`"
                ))
            })?;
            return Ok(FieldConstraint::Compare(op, date));
        }

        if let Some(needle) = raw.strip_prefix('~') {
            if field != FilterField::ClientName {
                return Err(DomainError::validation(format!(
                    "like expression `{raw}` is only supported on `client_name`"
                )));
            }
            let needle = needle.trim();
            if needle.is_empty() {
                return Err(DomainError::validation("like expression cannot be empty"));
            }
            return Ok(FieldConstraint::Like(needle.to_lowercase()));
        }

        if field.is_date() && !raw.is_empty() {
            NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
                DomainError::validation(format!("malformed date `{raw}` on `{field}`"))
            })?;
        }

        Ok(FieldConstraint::Equals(raw.to_string()))
    }

    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            FieldConstraint::Equals(expected) => actual == expected,
            FieldConstraint::AnyOf(alternatives) => alternatives.iter().any(|alt| alt == actual),
            FieldConstraint::Compare(op, bound) => {
                NaiveDate::parse_from_str(actual.trim(), DATE_FORMAT)
                    .map(|date| op.holds(date, *bound))
                    .unwrap_or(false)
            }
            FieldConstraint::Like(needle) => actual.to_lowercase().contains(needle.as_str()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            FieldConstraint::Equals(value) => Value::String(value.clone()),
            FieldConstraint::AnyOf(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
            FieldConstraint::Compare(op, date) => {
                Value::String(format!("{}{}", op.symbol(), date.format(DATE_FORMAT)))
            }
            FieldConstraint::Like(needle) => Value::String(format!("~{needle}")),
        }
    }
}

fn scalar_literal(field: FilterField, value: &Value) -> Result<String, DomainError> {
    match value {
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Err(DomainError::validation(format!(
            "filter field `{field}` cannot be null"
        ))),
        Value::Array(_) | Value::Object(_) => Err(DomainError::validation(format!(
            "filter field `{field}` must hold literal values"
        ))),
    }
}

/// Validated metadata predicate: AND across fields, OR within a field's
/// alternatives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    constraints: BTreeMap<FilterField, FieldConstraint>,
}

impl MetadataFilter {
    /// Validates a JSON object into a filter. Unknown keys are rejected.
    pub fn from_json(value: &Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            Value::Null => Ok(Self::default()),
            _ => Err(DomainError::validation(
                "metadata filter must be a JSON object",
            )),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Result<Self, DomainError> {
        let mut constraints = BTreeMap::new();
        for (key, value) in map {
            let field = FilterField::from_name(key.trim()).ok_or_else(|| {
                DomainError::validation(format!(
                    "unknown filter field `{key}` (expected one of client_name, client_region, complaint_date)"
                ))
            })?;
            constraints.insert(field, FieldConstraint::parse(field, value)?);
        }
        Ok(Self { constraints })
    }

    pub fn with(mut self, field: FilterField, constraint: FieldConstraint) -> Self {
        self.constraints.insert(field, constraint);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn constraint(&self, field: FilterField) -> Option<&FieldConstraint> {
        self.constraints.get(&field)
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.constraints
            .iter()
            .all(|(field, constraint)| constraint.matches(document.field(field.name())))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.constraints
                .iter()
                .map(|(field, constraint)| (field.name().to_string(), constraint.to_json()))
                .collect(),
        )
    }
}

impl Serialize for MetadataFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
