//! Prompt construction and canned fallback phrases.

use rand::prelude::IndexedRandom;

use crate::models::Message;

/// How many transcript messages are included in the prompt.
pub const HISTORY_WINDOW: usize = 10;

/// Persona instruction prepended to every prompt.
const SYSTEM_PROMPT: &str = "You are a helpful, friendly customer support chatbot.\n\
You should:\n\
- Be concise but helpful\n\
- Ask clarifying questions when needed\n\
- Provide practical solutions\n\
- Be polite and professional\n\
- If you don't know something, admit it and suggest alternatives";

/// Canned replies served when no AI backend is configured or as a
/// displayable extra alongside an unclassified upstream failure.
pub const FALLBACK_RESPONSES: [&str; 4] = [
    "I apologize, but I'm having trouble connecting to my knowledge base right now. Could you please try again?",
    "I'm experiencing some technical difficulties. Is there a specific way I can help you?",
    "Sorry for the inconvenience! While I resolve this issue, is there something urgent I can assist with?",
    "I'm temporarily unavailable, but I'd be happy to help you shortly. Please try again in a moment.",
];

/// Pick a fallback phrase uniformly at random.
pub fn pick_fallback() -> String {
    let mut rng = rand::rng();
    FALLBACK_RESPONSES
        .choose(&mut rng)
        .copied()
        .unwrap_or(FALLBACK_RESPONSES[0])
        .to_string()
}

/// Build the prompt sent to the Response Source: the persona
/// instruction, the tail of the transcript as `role: content` lines,
/// and the latest user message. `messages` is expected to already end
/// with the latest user message, matching the handler's append-then-ask
/// order.
pub fn build_prompt(messages: &[Message], latest: &str) -> String {
    let start = messages.len().saturating_sub(HISTORY_WINDOW);
    let history = messages[start..]
        .iter()
        .map(|msg| format!("{}: {}", msg.role, msg.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{SYSTEM_PROMPT}\n\nPrevious conversation:\n{history}\n\nUser's latest message: {latest}")
}
