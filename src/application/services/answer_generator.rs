use std::sync::Arc;

use tracing::debug;

use super::context_assembler::Context;
use super::ports::{ConverseRequest, GenerativeModel, InferenceConfig};
use crate::domain::{ContentBlock, DomainError, Message};

/// Returned without a service call when no document grounds the answer.
pub const DONT_KNOW_ANSWER: &str =
    "I don't know. No complaints matched your request, so there is nothing to answer from.";

/// Grounded answer generation over an assembled [`Context`].
pub struct AnswerGenerator {
    model: Arc<dyn GenerativeModel>,
    inference: InferenceConfig,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn GenerativeModel>, inference: InferenceConfig) -> Self {
        Self { model, inference }
    }

    /// One service call, no retries. The first content block of the reply is
    /// returned verbatim and must be text.
    pub fn generate(&self, query: &str, context: &Context) -> Result<String, DomainError> {
        if context.is_empty() {
            debug!(target: "complaint_rag::generation", "empty context, answering don't know");
            return Ok(DONT_KNOW_ANSWER.to_string());
        }

        let request = ConverseRequest::new(
            grounded_system_prompt(context),
            vec![Message::user_text(query)],
            self.inference,
        );
        let reply = self.model.converse(&request)?;

        match reply.content.into_iter().next() {
            Some(ContentBlock::Text(text)) => Ok(text),
            Some(_) => Err(DomainError::generation(
                "answer reply did not start with a text block",
            )),
            None => Err(DomainError::generation("answer reply was empty")),
        }
    }
}

fn grounded_system_prompt(context: &Context) -> String {
    format!(
        "You are an assistant for the complaints team of a corporate bank. Answer the user's \
question about complaints using only the context below. Base the answer mainly on the \
complaint_text column; the other columns may be used to check the question's conditions.\n\n\
Here is the context, contained in <context> tags:\n\n<context>\n{}</context>\n\n\
If the context does not contain the answer, say that you don't know. Do not make up an answer.",
        context.to_csv()
    )
}
