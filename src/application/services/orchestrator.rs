//! Tool-calling conversation loop.
//!
//! ```text
//!            reply without tool requests
//!   AwaitingModelTurn ─────────────────────────▶ Terminated(Answered)
//!        │  ▲       reply with tool requests at the round cap
//!        │  │      ─────────────────────────────▶ Terminated(IterationCap)
//!  tools │  │ results appended
//!        ▼  │
//!   DispatchingTools
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::dispatcher::ToolDispatcher;
use super::ports::{ConverseRequest, GenerativeModel, InferenceConfig, ToolChoice};
use super::tools::ToolKind;
use crate::domain::{Conversation, DomainError, Query};

pub const DEFAULT_MAX_ROUNDS: usize = 10;

const LOOP_SYSTEM_PROMPT: &str = "You are an assistant for the complaints team of a corporate \
bank. Answer questions about customer complaints using the tools provided. First call \
identify_complaints_filters with the user's query, then pass its output as filter_terms to \
get_complaints_data. If the user wants insights or a summary, call generate_response with the \
retrieved context; otherwise present the retrieved complaints directly. If a tool reports an \
error, decide whether to retry with different input or explain the problem. Never invent \
complaints that were not retrieved.";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Ceiling on service calls per conversation.
    pub max_rounds: usize,
    pub inference: InferenceConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            inference: InferenceConfig::default(),
        }
    }
}

impl LoopConfig {
    pub fn new(max_rounds: usize, inference: InferenceConfig) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
            inference,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The service replied without requesting tools.
    Answered,
    /// The round cap was hit while tools were still being requested.
    IterationCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    AwaitingModelTurn,
    DispatchingTools,
    Terminated(Termination),
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub conversation: Conversation,
    pub rounds: usize,
    pub termination: Termination,
}

impl LoopOutcome {
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Answered
    }

    /// Text of the last assistant turn. For an incomplete conversation this
    /// is whatever the service said before it was cut off, if anything.
    pub fn last_text(&self) -> Option<String> {
        self.conversation
            .last_assistant()
            .and_then(|message| message.text())
    }
}

pub struct Orchestrator {
    model: Arc<dyn GenerativeModel>,
    config: LoopConfig,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn GenerativeModel>, config: LoopConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Drives one conversation to termination. Tool failures are fed back to
    /// the service; only a failed service call aborts the loop.
    pub fn run(
        &self,
        query: &Query,
        dispatcher: &ToolDispatcher<'_>,
    ) -> Result<LoopOutcome, DomainError> {
        let mut conversation = Conversation::seeded(query.as_str());
        let mut rounds = 0usize;
        let mut state = LoopState::AwaitingModelTurn;

        loop {
            state = match state {
                LoopState::AwaitingModelTurn => {
                    let request = ConverseRequest::new(
                        LOOP_SYSTEM_PROMPT,
                        conversation.messages().to_vec(),
                        self.config.inference,
                    )
                    .with_tools(ToolKind::menu(), ToolChoice::Auto);

                    let reply = self.model.converse(&request)?;
                    rounds += 1;
                    let wants_tools = reply.requests_tools();
                    debug!(
                        target: "complaint_rag::loop",
                        round = rounds,
                        tool_requests = reply.tool_uses().count(),
                        "service replied"
                    );
                    conversation.push(reply);

                    if !wants_tools {
                        LoopState::Terminated(Termination::Answered)
                    } else if rounds >= self.config.max_rounds {
                        warn!(
                            target: "complaint_rag::loop",
                            rounds,
                            "hit round limit with tool requests pending"
                        );
                        LoopState::Terminated(Termination::IterationCap)
                    } else {
                        LoopState::DispatchingTools
                    }
                }
                LoopState::DispatchingTools => {
                    let results = conversation
                        .last_assistant()
                        .and_then(|reply| dispatcher.dispatch_turn(reply));
                    if let Some(turn) = results {
                        conversation.push(turn);
                    }
                    LoopState::AwaitingModelTurn
                }
                LoopState::Terminated(termination) => {
                    info!(
                        target: "complaint_rag::loop",
                        rounds,
                        turns = conversation.len(),
                        ?termination,
                        "conversation finished"
                    );
                    return Ok(LoopOutcome {
                        conversation,
                        rounds,
                        termination,
                    });
                }
            };
        }
    }
}
