//! The fixed tool menu offered to the generative service.
//!
//! Every tool the service may call is a [`ToolKind`] variant with a typed
//! input. Requests are decoded into a [`ToolInvocation`] before anything runs,
//! so an unknown name or an ill-shaped input is rejected up front instead of
//! being skipped.

use schemars::{schema_for, JsonSchema};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use super::ports::ToolSpec;
use crate::domain::{DomainError, ToolUseBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    IdentifyFilters,
    RetrieveComplaints,
    GenerateResponse,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::IdentifyFilters,
        ToolKind::RetrieveComplaints,
        ToolKind::GenerateResponse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::IdentifyFilters => "identify_complaints_filters",
            ToolKind::RetrieveComplaints => "get_complaints_data",
            ToolKind::GenerateResponse => "generate_response",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            ToolKind::IdentifyFilters => {
                "Break the user's query down into metadata filters for the complaints store. \
Filterable columns: client_name (company making the complaint; prefix the value with ~ for a \
partial, case-insensitive match since users may not type the exact name), client_region (one of \
'MC' mid-corporate, 'LC' large corporate, 'ICB' international corporate; a list means any of \
them), complaint_date (YYYY-MM-DD; prefix with >, >=, < or <= for ranges, e.g. '>2024-06-15'). \
Only include columns the query actually constrains. Returns metadata_filter and k_filter."
            }
            ToolKind::RetrieveComplaints => {
                "Retrieve the complaints relevant to the user's query, narrowed by the filter terms \
returned from identify_complaints_filters. Returns the complaints as CSV in `context`."
            }
            ToolKind::GenerateResponse => {
                "Generate an answer to the user's query grounded in the retrieved complaints. Only \
use this when the user wants insights or a summary of the complaints."
            }
        }
    }

    fn input_schema(self) -> Value {
        let schema = match self {
            ToolKind::IdentifyFilters => schema_for!(IdentifyFiltersInput),
            ToolKind::RetrieveComplaints => schema_for!(RetrieveComplaintsInput),
            ToolKind::GenerateResponse => schema_for!(GenerateResponseInput),
        };
        serde_json::to_value(schema).unwrap_or(Value::Bool(true))
    }

    pub fn spec(self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Variant of the filter tool used by the standalone extractor: the
    /// service fills in the filter terms itself instead of passing the query.
    pub fn extraction_spec(self) -> ToolSpec {
        let schema = serde_json::to_value(schema_for!(FilterTerms)).unwrap_or(Value::Bool(true));
        ToolSpec {
            name: self.name().to_string(),
            description: format!(
                "{} The number of complaints to return defaults to 100 when the query does not \
give one. If unsure about a column, leave it out.",
                self.description()
            ),
            input_schema: schema,
        }
    }

    pub fn menu() -> Vec<ToolSpec> {
        Self::ALL.into_iter().map(ToolKind::spec).collect()
    }
}

/// Input of `identify_complaints_filters`.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct IdentifyFiltersInput {
    /// The user's original query.
    pub user_query: String,
}

/// Filter terms as produced by `identify_complaints_filters`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, JsonSchema)]
pub struct FilterTerms {
    /// Column filters, e.g. {"client_region": ["MC", "LC"]} or {"client_region": "MC"}.
    #[serde(default)]
    pub metadata_filter: Option<Value>,
    /// Number of complaints to return. Defaults to 100 when the query does not say.
    #[serde(default)]
    pub k_filter: Option<Value>,
}

/// Input of `get_complaints_data`.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct RetrieveComplaintsInput {
    /// The user's original query.
    pub user_query: String,
    /// Output of identify_complaints_filters.
    #[serde(default)]
    pub filter_terms: Option<FilterTerms>,
}

/// Input of `generate_response`.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct GenerateResponseInput {
    /// The user's original query.
    pub user_query: String,
    /// The CSV context returned by get_complaints_data.
    pub context: String,
}

/// A decoded tool request.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    IdentifyFilters(IdentifyFiltersInput),
    RetrieveComplaints(RetrieveComplaintsInput),
    GenerateResponse(GenerateResponseInput),
}

impl ToolInvocation {
    pub fn decode(request: &ToolUseBlock) -> Result<Self, DomainError> {
        let kind = ToolKind::from_name(&request.name)
            .ok_or_else(|| DomainError::validation(format!("unknown tool `{}`", request.name)))?;

        Ok(match kind {
            ToolKind::IdentifyFilters => Self::IdentifyFilters(decode_input(kind, &request.input)?),
            ToolKind::RetrieveComplaints => {
                Self::RetrieveComplaints(decode_input(kind, &request.input)?)
            }
            ToolKind::GenerateResponse => {
                Self::GenerateResponse(decode_input(kind, &request.input)?)
            }
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::IdentifyFilters(_) => ToolKind::IdentifyFilters,
            Self::RetrieveComplaints(_) => ToolKind::RetrieveComplaints,
            Self::GenerateResponse(_) => ToolKind::GenerateResponse,
        }
    }
}

fn decode_input<T: DeserializeOwned>(kind: ToolKind, input: &Value) -> Result<T, DomainError> {
    T::deserialize(input).map_err(|err| {
        DomainError::validation(format!("invalid input for `{}`: {err}", kind.name()))
    })
}
