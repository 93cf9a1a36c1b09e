use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::ports::{ConverseRequest, GenerativeModel, InferenceConfig, ToolChoice};
use super::tools::ToolKind;
use crate::domain::{DomainError, Message, MetadataFilter, ResultBound};

const EXTRACTION_SYSTEM_PROMPT: &str = "You are an assistant for the complaints team of a \
corporate bank. Your job is to retrieve complaints matching the user's query. Always start by \
breaking the query down with the identify_complaints_filters tool.";

/// Filter and bound derived from a free-text query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    #[serde(rename = "metadata_filter")]
    pub filter: Option<MetadataFilter>,
    #[serde(rename = "k_filter")]
    pub bound: ResultBound,
    /// Set when the service reply could not be used and the broad default
    /// applies.
    #[serde(skip)]
    pub fell_back: bool,
}

impl Extraction {
    pub fn broad_default() -> Self {
        Self {
            filter: None,
            bound: ResultBound::default(),
            fell_back: true,
        }
    }
}

/// Maps a query onto a [`MetadataFilter`] with one forced tool call.
pub struct FilterExtractor {
    model: Arc<dyn GenerativeModel>,
    inference: InferenceConfig,
}

impl FilterExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>, inference: InferenceConfig) -> Self {
        Self { model, inference }
    }

    /// Never fails: any problem with the service reply yields
    /// [`Extraction::broad_default`]. The service is called exactly once.
    pub fn extract(&self, query: &str) -> Extraction {
        match self.try_extract(query) {
            Ok(extraction) => {
                let filter = extraction
                    .filter
                    .as_ref()
                    .map_or(Value::Null, MetadataFilter::to_json);
                debug!(
                    target: "complaint_rag::extraction",
                    filter = %filter,
                    bound = extraction.bound.get(),
                    "extracted filters"
                );
                extraction
            }
            Err(err) => {
                warn!(
                    target: "complaint_rag::extraction",
                    error = %err,
                    "cannot extract filters, using broad default"
                );
                Extraction::broad_default()
            }
        }
    }

    fn try_extract(&self, query: &str) -> Result<Extraction, DomainError> {
        let tool = ToolKind::IdentifyFilters;
        let request = ConverseRequest::new(
            EXTRACTION_SYSTEM_PROMPT,
            vec![Message::user_text(query)],
            self.inference,
        )
        .with_tools(vec![tool.extraction_spec()], ToolChoice::Tool(tool.name().to_string()));

        let reply = self.model.converse(&request)?;
        let tool_use = reply
            .tool_uses()
            .find(|tool_use| tool_use.name == tool.name())
            .ok_or_else(|| DomainError::validation("service did not call the filter tool"))?;

        parse_extraction(&tool_use.input)
    }
}

/// Reads `{metadata_filter, k_filter}` (or the short `{x, y}` form).
fn parse_extraction(input: &Value) -> Result<Extraction, DomainError> {
    let payload = input
        .as_object()
        .ok_or_else(|| DomainError::validation("filter tool input is not an object"))?;

    let raw_filter = payload
        .get("metadata_filter")
        .or_else(|| payload.get("x"))
        .ok_or_else(|| DomainError::validation("filter tool input has no metadata_filter"))?;
    let filter = MetadataFilter::from_json(raw_filter)?;

    let bound = payload
        .get("k_filter")
        .or_else(|| payload.get("y"))
        .and_then(ResultBound::from_json)
        .unwrap_or_default();

    Ok(Extraction {
        filter: (!filter.is_empty()).then_some(filter),
        bound,
        fell_back: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentBlock, FieldConstraint, FilterField, Role, ToolUseBlock};
    use crate::testing::ScriptedModel;
    use serde_json::json;

    fn tool_reply(input: Value) -> Message {
        Message {
            role: Role::Assistant,
            content: vec![
                ContentBlock::Text("Identifying filters.".into()),
                ContentBlock::ToolUse(ToolUseBlock {
                    tool_use_id: "tooluse_f".into(),
                    name: "identify_complaints_filters".into(),
                    input,
                }),
            ],
        }
    }

    fn extractor(
        replies: Vec<Result<Message, DomainError>>,
    ) -> (Arc<ScriptedModel>, FilterExtractor) {
        let model = Arc::new(ScriptedModel::new(replies));
        let extractor = FilterExtractor::new(model.clone(), InferenceConfig::default());
        (model, extractor)
    }

    #[test]
    fn region_query_defaults_bound_to_100() {
        let (model, extractor) = extractor(vec![Ok(tool_reply(
            json!({"metadata_filter": {"client_region": "MC"}, "k_filter": 100}),
        ))]);

        let extraction = extractor.extract("Show me all complaints in region MC");

        assert_eq!(extraction.bound.get(), 100);
        assert!(!extraction.fell_back);
        assert_eq!(
            extraction.filter.unwrap().constraint(FilterField::ClientRegion),
            Some(&FieldConstraint::Equals("MC".into()))
        );

        let request = model.request(0);
        assert_eq!(request.tools.len(), 1);
        assert_eq!(
            request.tool_choice,
            Some(ToolChoice::Tool("identify_complaints_filters".into()))
        );
    }

    #[test]
    fn extraction_with_debug_logging_enabled() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::sink)
            .finish();
        let (_, extractor) = extractor(vec![
            Ok(tool_reply(json!({"metadata_filter": {"client_name": "Globex"}}))),
            Ok(tool_reply(json!({"metadata_filter": {}, "k_filter": 7}))),
        ]);

        tracing::subscriber::with_default(subscriber, || {
            let filtered = extractor.extract("Globex complaints");
            assert!(filtered.filter.is_some());
            let unfiltered = extractor.extract("any seven complaints");
            assert_eq!(unfiltered.bound.get(), 7);
        });
    }

    #[test]
    fn count_and_alternatives_are_extracted() {
        let (_, extractor) = extractor(vec![Ok(tool_reply(
            json!({"x": {"client_region": ["MC", "LC"]}, "y": 5}),
        ))]);

        let extraction = extractor.extract("Show me 5 complaints in regions MC and LC");

        assert_eq!(extraction.bound.get(), 5);
        assert_eq!(
            extraction.filter.unwrap().constraint(FilterField::ClientRegion),
            Some(&FieldConstraint::AnyOf(vec!["MC".into(), "LC".into()]))
        );
    }

    #[test]
    fn missing_tool_call_falls_back_once() {
        let (model, extractor) = extractor(vec![
            Ok(Message::assistant_text("I'd rather not.")),
            Ok(tool_reply(json!({"metadata_filter": {}, "k_filter": 3}))),
        ]);

        let extraction = extractor.extract("complaints please");

        assert_eq!(extraction, Extraction::broad_default());
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn malformed_payloads_fall_back() {
        for input in [
            json!("client_region=MC"),
            json!({"k_filter": 5}),
            json!({"metadata_filter": "MC", "k_filter": 5}),
            json!({"metadata_filter": {"region": "MC"}, "k_filter": 5}),
        ] {
            let (_, extractor) = extractor(vec![Ok(tool_reply(input))]);
            let extraction = extractor.extract("complaints in MC");
            assert!(extraction.fell_back);
            assert!(extraction.filter.is_none());
            assert_eq!(extraction.bound.get(), 100);
        }
    }

    #[test]
    fn service_error_falls_back() {
        let (_, extractor) = extractor(vec![Err(DomainError::generation("connection refused"))]);
        assert_eq!(extractor.extract("anything"), Extraction::broad_default());
    }

    #[test]
    fn unparseable_bound_keeps_filter() {
        let (_, extractor) = extractor(vec![Ok(tool_reply(
            json!({"metadata_filter": {"client_region": "ICB"}, "k_filter": "a few"}),
        ))]);
        let extraction = extractor.extract("a few ICB complaints");
        assert!(extraction.filter.is_some());
        assert_eq!(extraction.bound.get(), 100);
    }

    #[test]
    fn extraction_serializes_as_filter_terms() {
        let extraction = Extraction {
            filter: Some(
                MetadataFilter::from_json(&json!({"complaint_date": ">2024-06-15"})).unwrap(),
            ),
            bound: ResultBound::new(100).unwrap(),
            fell_back: false,
        };
        assert_eq!(
            serde_json::to_value(&extraction).unwrap(),
            json!({"metadata_filter": {"complaint_date": ">2024-06-15"}, "k_filter": 100})
        );
    }
}
