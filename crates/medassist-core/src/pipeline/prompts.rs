//! Prompt templates and fixed user-facing texts.

use super::types::AssistantContent;

/// Shown when the whole pipeline fails.
pub const TROUBLE_ANSWER: &str = "I'm having trouble right now. Please try again in a moment, \
     or try one of the example questions below.";

pub const TROUBLE_SUGGESTIONS: &[&str] = &[
    "What are the OPD timings?",
    "How can I book an appointment?",
    "Where is the emergency department?",
    "What are the visiting hours?",
];

/// Shown when the answer model fails or times out.
pub const GENERATION_FALLBACK_ANSWER: &str = "I'm sorry, I couldn't prepare an answer right now. \
     Please try again shortly or contact the hospital help desk.";

const CANNED_SUGGESTIONS: &[&str] = &[
    "What are the OPD timings?",
    "Which departments are available?",
    "How can I book an appointment?",
];

/// Replies that bypass retrieval and generation.
#[derive(Debug, Clone)]
pub struct CannedReplies {
    pub greeting: AssistantContent,
    pub identity: AssistantContent,
    pub unclear: AssistantContent,
}

impl CannedReplies {
    #[must_use]
    pub fn new(assistant_name: &str, hospital_name: &str) -> Self {
        Self {
            greeting: AssistantContent::new(
                format!(
                    "Hello! I'm {assistant_name}, the virtual assistant of {hospital_name}. \
                     How can I help you today?"
                ),
                CANNED_SUGGESTIONS,
            ),
            identity: AssistantContent::new(
                format!(
                    "I'm {assistant_name}, the virtual assistant of {hospital_name}. \
                     I can answer questions about departments, doctors, timings, \
                     services, and facilities using the hospital's own documents."
                ),
                CANNED_SUGGESTIONS,
            ),
            unclear: AssistantContent::new(
                "I'm not sure I understood that. Could you rephrase your question \
                 about the hospital?",
                CANNED_SUGGESTIONS,
            ),
        }
    }
}

#[must_use]
pub fn trouble_content() -> AssistantContent {
    AssistantContent::new(TROUBLE_ANSWER, TROUBLE_SUGGESTIONS)
}

#[must_use]
pub fn classifier_system(hospital_name: &str) -> String {
    format!(
        "You classify messages sent to the virtual assistant of {hospital_name}.\n\
         Return JSON with these fields:\n\
         - intent: one of \"greeting\", \"identity\", \"hospital_info\", \"complex_query\", \"unclear\".\n\
         - refinedQuery: the message rewritten as a clear, self-contained search query in English, \
         whatever language the message is written in.\n\
         - needsRAG: true when answering requires the hospital's documents.\n\
         - subQueries: only for complex_query, one short English search query per distinct question.\n\
         Rules:\n\
         - greeting: salutations such as hi, hello, salam, namaste, good morning. needsRAG is false.\n\
         - identity: questions about the assistant itself (who are you, what can you do). needsRAG is false.\n\
         - hospital_info: a single question about the hospital, its doctors, departments, services, \
         timings, fees, or facilities. needsRAG is true.\n\
         - complex_query: several distinct questions in one message. needsRAG is true.\n\
         - unclear: meaningless or unrelated input.\n\
         Judge the intent the same way regardless of the language of the message."
    )
}

#[must_use]
pub fn answer_system(assistant_name: &str, hospital_name: &str) -> String {
    format!(
        "You are {assistant_name}, the virtual assistant of {hospital_name}. \
         Reply in the same language as the user's question. \
         Return JSON with an \"answer\" string and a \"suggestions\" array of follow-up questions."
    )
}

#[must_use]
pub fn answer_with_context(query: &str, context: &str) -> String {
    format!(
        "Answer the question using ONLY the hospital information below.\n\
         - Keep the answer to at most about ten lines.\n\
         - If the information is not sufficient to answer, say so plainly and do not guess.\n\
         - Always give 5 to 6 follow-up questions the information below can answer.\n\n\
         Hospital information:\n{context}\n\n\
         Question: {query}"
    )
}

#[must_use]
pub fn answer_without_context(query: &str) -> String {
    format!(
        "No relevant information was found in the hospital's documents for this question.\n\
         Politely tell the user you could not find this information and suggest contacting \
         the hospital help desk. Then give 4 to 6 related questions the user might ask instead, \
         inferred from their question.\n\n\
         Question: {query}"
    )
}
