//! End-to-end question scenarios against a temporary index and a scripted
//! generative model.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{json, Value};

use complaint_rag::application::services::{
    Context, ConverseRequest, EmbeddingEngine, FilterExtractor, GenerativeModel,
    InferenceConfig, Retriever, ServiceConfig, DONT_KNOW_ANSWER,
};
use complaint_rag::application::{AskStatus, ComplaintService};
use complaint_rag::domain::{
    ComplaintEmbedding, ComplaintRecord, ContentBlock, Document, DomainError, Message, Role,
    ToolResultContent, ToolUseBlock,
};
use complaint_rag::infrastructure::{SimpleEmbedEngine, SledVectorStore};

const MODEL: &str = "complaints/simple-hash";

struct Script {
    replies: Mutex<VecDeque<Message>>,
    seen: Mutex<Vec<ConverseRequest>>,
}

impl Script {
    fn new(replies: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<ConverseRequest> {
        self.seen.lock().clone()
    }
}

impl GenerativeModel for Script {
    fn converse(&self, request: &ConverseRequest) -> Result<Message, DomainError> {
        self.seen.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| DomainError::generation("no scripted reply left"))
    }
}

fn tool_call(id: &str, name: &str, input: Value) -> Message {
    Message {
        role: Role::Assistant,
        content: vec![ContentBlock::ToolUse(ToolUseBlock {
            tool_use_id: id.into(),
            name: name.into(),
            input,
        })],
    }
}

fn index() -> Arc<SledVectorStore> {
    let rows = [
        ("Acme Corp", "MC", "2024-02-01", "Card payments declined at several merchants."),
        ("Acme Corp", "MC", "2024-08-11", "Fees for card payments doubled without notice."),
        ("Globex", "LC", "2024-03-17", "Transfer to supplier stuck for a week."),
        ("Globex", "LC", "2024-09-03", "Card payments blocked while travelling."),
        ("Initech", "ICB", "2024-06-15", "Statement shows duplicated card payments."),
        ("Initech", "ICB", "2024-06-16", "Branch closed the account without warning."),
        ("Umbrella", "MC", "2024-05-09", "Payroll batch rejected twice."),
        ("Umbrella", "LC", "2024-12-20", "Card payments limit lowered unexpectedly."),
        ("Hooli", "MC", "2024-07-30", "Relationship manager unreachable for a month."),
        ("Hooli", "LC", "2024-01-05", "Online banking token never arrived."),
    ];

    let store = SledVectorStore::temporary().unwrap();
    let engine = SimpleEmbedEngine::default();
    for (client, region, date, text) in rows {
        let document = Document::new(
            text,
            [
                ("client_name", client),
                ("client_region", region),
                ("complaint_date", date),
            ],
        );
        let vector = engine.embed(MODEL, text).unwrap();
        store
            .append(&ComplaintRecord::new(document, ComplaintEmbedding::new(MODEL, vector)))
            .unwrap();
    }
    Arc::new(store)
}

fn retriever(store: Arc<SledVectorStore>) -> Retriever {
    Retriever::new(Arc::new(SimpleEmbedEngine::default()), store, MODEL, 1_000)
}

fn column<'a>(context: &'a Context, name: &str) -> Vec<&'a str> {
    let index = context
        .columns()
        .iter()
        .position(|column| column == name)
        .unwrap();
    context.rows().iter().map(|row| row[index].as_str()).collect()
}

#[test]
fn region_question_runs_through_the_tool_loop() {
    let script = Script::new(vec![
        tool_call(
            "call-1",
            "identify_complaints_filters",
            json!({"user_query": "Show me all complaints in region MC"}),
        ),
        // the extractor's own forced call
        tool_call(
            "extract-1",
            "identify_complaints_filters",
            json!({"metadata_filter": {"client_region": "MC"}, "k_filter": 100}),
        ),
        tool_call(
            "call-2",
            "get_complaints_data",
            json!({
                "user_query": "Show me all complaints in region MC",
                "filter_terms": {"metadata_filter": {"client_region": "MC"}, "k_filter": 100}
            }),
        ),
        Message::assistant_text("There are four complaints from region MC."),
    ]);
    let service = ComplaintService::new(
        Arc::new(SimpleEmbedEngine::default()),
        index(),
        script.clone(),
        ServiceConfig::with_model(MODEL),
    );

    let response = service.ask("Show me all complaints in region MC").unwrap();

    assert_eq!(response.status, AskStatus::Answered);
    assert_eq!(response.rounds, 3);
    assert_eq!(
        response.answer.as_deref(),
        Some("There are four complaints from region MC.")
    );

    let seen = script.seen();
    assert_eq!(seen.len(), 4);

    // extraction result handed back to the loop
    let ContentBlock::ToolResult(extracted) = &seen[2].messages[2].content[0] else {
        panic!("expected extraction result");
    };
    let ToolResultContent::Json(extracted) = &extracted.content[0] else {
        panic!("extraction returns json");
    };
    assert_eq!(extracted["metadata_filter"], json!({"client_region": "MC"}));
    assert_eq!(extracted["k_filter"], json!(100));

    // retrieval result seen by the final call
    let ContentBlock::ToolResult(retrieved) = &seen[3].messages[4].content[0] else {
        panic!("expected retrieval result");
    };
    assert_eq!(retrieved.tool_use_id, "call-2");
    let ToolResultContent::Json(payload) = &retrieved.content[0] else {
        panic!("retrieval returns json");
    };
    assert_eq!(payload["document_count"], json!(4));
    let context = Context::from_csv(payload["context"].as_str().unwrap()).unwrap();
    assert_eq!(context.len(), 4);
    assert!(column(&context, "client_region").iter().all(|region| *region == "MC"));
}

#[test]
fn bounded_multi_region_question() {
    let script = Script::new(vec![tool_call(
        "x",
        "identify_complaints_filters",
        json!({"metadata_filter": {"client_region": ["MC", "LC"]}, "k_filter": 5}),
    )]);
    let extractor = FilterExtractor::new(script, InferenceConfig::default());
    let query = "Show me 5 complaints in region MC or LC about card payments";

    let extraction = extractor.extract(query);
    assert!(!extraction.fell_back);
    assert_eq!(extraction.bound.get(), 5);

    let documents = retriever(index())
        .retrieve(query, extraction.filter.as_ref(), extraction.bound)
        .unwrap();

    assert_eq!(documents.len(), 5);
    assert!(documents
        .iter()
        .all(|doc| matches!(doc.field("client_region"), Some("MC") | Some("LC"))));
}

#[test]
fn date_question_keeps_only_later_complaints() {
    let script = Script::new(vec![tool_call(
        "x",
        "identify_complaints_filters",
        json!({"metadata_filter": {"complaint_date": ">2024-06-15"}}),
    )]);
    let extractor = FilterExtractor::new(script, InferenceConfig::default());
    let query = "Show me complaints after 15 June 2024";

    let extraction = extractor.extract(query);
    assert_eq!(extraction.bound.get(), 100);

    let documents = retriever(index())
        .retrieve(query, extraction.filter.as_ref(), extraction.bound)
        .unwrap();

    let cutoff = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    assert_eq!(documents.len(), 5);
    for doc in &documents {
        let date =
            NaiveDate::parse_from_str(doc.field("complaint_date").unwrap(), "%Y-%m-%d").unwrap();
        assert!(date > cutoff, "{date} is not after the cutoff");
    }
}

#[test]
fn unusable_extraction_falls_back_to_everything() {
    let script = Script::new(vec![Message::assistant_text(
        "I'm not sure which filters apply here.",
    )]);
    let extractor = FilterExtractor::new(script, InferenceConfig::default());

    let extraction = extractor.extract("what are people upset about?");
    assert!(extraction.fell_back);
    assert!(extraction.filter.is_none());
    assert_eq!(extraction.bound.get(), 100);

    let documents = retriever(index())
        .retrieve("what are people upset about?", None, extraction.bound)
        .unwrap();
    assert_eq!(documents.len(), 10);
}

#[test]
fn direct_pipeline_answers_from_context_or_says_dont_know() {
    let script = Script::new(vec![
        tool_call(
            "x",
            "identify_complaints_filters",
            json!({"metadata_filter": {"client_name": "Globex"}, "k_filter": 10}),
        ),
        Message::assistant_text("Globex reported a stuck transfer and blocked cards."),
        tool_call(
            "y",
            "identify_complaints_filters",
            json!({"metadata_filter": {"client_name": "Nobody Ltd"}}),
        ),
    ]);
    let service = ComplaintService::new(
        Arc::new(SimpleEmbedEngine::default()),
        index(),
        script.clone(),
        ServiceConfig::with_model(MODEL),
    );

    let answered = service.ask_direct("What did Globex complain about?").unwrap();
    assert_eq!(
        answered.answer.as_deref(),
        Some("Globex reported a stuck transfer and blocked cards.")
    );
    let grounding = &script.seen()[1].system;
    assert!(grounding.contains("Transfer to supplier stuck for a week."));
    assert!(!grounding.contains("Acme Corp"));

    let unknown = service.ask_direct("What did Nobody Ltd complain about?").unwrap();
    assert_eq!(unknown.answer.as_deref(), Some(DONT_KNOW_ANSWER));
    // no generation call for an empty context
    assert_eq!(script.seen().len(), 3);
}
