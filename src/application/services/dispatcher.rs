use serde_json::{json, Value};
use tracing::{debug, warn};

use super::answer_generator::AnswerGenerator;
use super::context_assembler::{Context, ContextAssembler};
use super::extractor::FilterExtractor;
use super::retriever::Retriever;
use super::tools::{
    FilterTerms, GenerateResponseInput, IdentifyFiltersInput, RetrieveComplaintsInput,
    ToolInvocation,
};
use crate::domain::{DomainError, Message, ResultBound, ToolResultBlock, ToolUseBlock};

/// Output of a successful tool run, before it is tied to an invocation id.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Json(Value),
    Text(String),
}

/// Executes tool requests against the pipeline components.
pub struct ToolDispatcher<'a> {
    extractor: &'a FilterExtractor,
    retriever: &'a Retriever,
    assembler: &'a ContextAssembler,
    generator: &'a AnswerGenerator,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(
        extractor: &'a FilterExtractor,
        retriever: &'a Retriever,
        assembler: &'a ContextAssembler,
        generator: &'a AnswerGenerator,
    ) -> Self {
        Self {
            extractor,
            retriever,
            assembler,
            generator,
        }
    }

    /// Runs every tool request of `reply` in emitted order and packages the
    /// results into one user turn. Returns `None` when nothing was requested.
    pub fn dispatch_turn(&self, reply: &Message) -> Option<Message> {
        let results: Vec<ToolResultBlock> = reply
            .tool_uses()
            .map(|request| self.dispatch(request))
            .collect();
        (!results.is_empty()).then(|| Message::tool_results(results))
    }

    /// Exactly one result per request; failures become error-flagged results.
    pub fn dispatch(&self, request: &ToolUseBlock) -> ToolResultBlock {
        let id = request.tool_use_id.clone();
        match ToolInvocation::decode(request).and_then(|invocation| self.execute(invocation)) {
            Ok(ToolOutput::Json(value)) => ToolResultBlock::json(id, value),
            Ok(ToolOutput::Text(text)) => ToolResultBlock::text(id, text),
            Err(err) => {
                warn!(
                    target: "complaint_rag::dispatch",
                    tool = %request.name,
                    tool_use_id = %request.tool_use_id,
                    error = %err,
                    "tool invocation failed"
                );
                ToolResultBlock::error(id, err.to_string())
            }
        }
    }

    fn execute(&self, invocation: ToolInvocation) -> Result<ToolOutput, DomainError> {
        debug!(
            target: "complaint_rag::dispatch",
            tool = invocation.kind().name(),
            "executing tool"
        );
        match invocation {
            ToolInvocation::IdentifyFilters(input) => self.identify_filters(input),
            ToolInvocation::RetrieveComplaints(input) => self.retrieve_complaints(input),
            ToolInvocation::GenerateResponse(input) => self.generate_response(input),
        }
    }

    fn identify_filters(&self, input: IdentifyFiltersInput) -> Result<ToolOutput, DomainError> {
        let extraction = self.extractor.extract(&input.user_query);
        let value = serde_json::to_value(&extraction)
            .map_err(|err| DomainError::other(format!("cannot encode filter terms: {err}")))?;
        Ok(ToolOutput::Json(value))
    }

    fn retrieve_complaints(
        &self,
        input: RetrieveComplaintsInput,
    ) -> Result<ToolOutput, DomainError> {
        let FilterTerms {
            metadata_filter,
            k_filter,
        } = input.filter_terms.unwrap_or_default();
        let bound = k_filter
            .as_ref()
            .and_then(ResultBound::from_json)
            .unwrap_or_default();

        let documents =
            self.retriever
                .retrieve_raw(&input.user_query, metadata_filter.as_ref(), bound)?;
        let context = self.assembler.assemble(&documents);

        Ok(ToolOutput::Json(json!({
            "context": context.to_csv(),
            "document_count": context.len(),
        })))
    }

    fn generate_response(&self, input: GenerateResponseInput) -> Result<ToolOutput, DomainError> {
        let context = Context::from_csv(&input.context)?;
        let answer = self.generator.generate(&input.user_query, &context)?;
        Ok(ToolOutput::Text(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::VectorStore;
    use crate::domain::{ContentBlock, Role, ToolResultContent};
    use crate::testing::{pipeline, tool_use, ScriptedModel};
    use std::sync::Arc;

    #[test]
    fn results_follow_request_order() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let parts = pipeline(model);
        let dispatcher = parts.dispatcher();

        let reply = Message {
            role: Role::Assistant,
            content: vec![
                ContentBlock::Text("Fetching.".into()),
                tool_use("b-2", "get_complaints_data", json!({"user_query": "fees"})),
                tool_use("a-1", "no_such_tool", json!({})),
                tool_use(
                    "c-3",
                    "get_complaints_data",
                    json!({
                        "user_query": "fees",
                        "filter_terms": {"metadata_filter": {"client_region": "LC"}}
                    }),
                ),
            ],
        };

        let turn = dispatcher.dispatch_turn(&reply).unwrap();
        assert_eq!(turn.role, Role::User);
        let ids: Vec<&str> = turn
            .content
            .iter()
            .map(|block| match block {
                ContentBlock::ToolResult(result) => result.tool_use_id.as_str(),
                other => panic!("unexpected block {other:?}"),
            })
            .collect();
        assert_eq!(ids, ["b-2", "a-1", "c-3"]);
    }

    #[test]
    fn invalid_filter_becomes_error_result() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let parts = pipeline(model);
        let dispatcher = parts.dispatcher();

        let ContentBlock::ToolUse(request) = tool_use(
            "r-1",
            "get_complaints_data",
            json!({
                "user_query": "fees",
                "filter_terms": {"metadata_filter": {"severity": "high"}}
            }),
        ) else {
            unreachable!()
        };

        let result = dispatcher.dispatch(&request);
        assert!(result.is_error());
        let ToolResultContent::Text(description) = &result.content[0] else {
            panic!("error results carry text");
        };
        assert!(description.contains("unknown filter field `severity`"));
    }

    #[test]
    fn retrieval_without_filter_terms_uses_default_bound() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let parts = pipeline(model);
        let dispatcher = parts.dispatcher();

        let ContentBlock::ToolUse(request) =
            tool_use("r-2", "get_complaints_data", json!({"user_query": "complaints"}))
        else {
            unreachable!()
        };
        let result = dispatcher.dispatch(&request);

        assert!(!result.is_error());
        let ToolResultContent::Json(value) = &result.content[0] else {
            panic!("retrieval returns json");
        };
        assert_eq!(value["document_count"], json!(parts.store.len().unwrap()));
    }

    #[test]
    fn generation_failure_is_reported_not_raised() {
        let model = Arc::new(ScriptedModel::new(vec![Err(DomainError::generation("throttled"))]));
        let parts = pipeline(model);
        let dispatcher = parts.dispatcher();

        let ContentBlock::ToolUse(request) = tool_use(
            "g-1",
            "generate_response",
            json!({"user_query": "why?", "context": "client_region,complaint_text\nMC,late\n"}),
        ) else {
            unreachable!()
        };
        let result = dispatcher.dispatch(&request);
        assert!(result.is_error());
    }

    #[test]
    fn no_requests_means_no_turn() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let parts = pipeline(model);
        assert!(parts
            .dispatcher()
            .dispatch_turn(&Message::assistant_text("done"))
            .is_none());
    }
}
