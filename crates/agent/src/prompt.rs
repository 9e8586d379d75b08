use crate::llm::{ChatMessage, CompletionOptions, ResponseFormat};

pub const SYSTEM_INSTRUCTION: &str = r#"You are an intent router. Output ONE JSON OBJECT ONLY (no prose, no code fences).
Schema:
{
  "action": "createPaymentHold" | null,
  "answer": string | null,
  "invoiceId": string | null,
  "amount": number | null
}
Rules:
- If the user asks to place a payment hold, set action="createPaymentHold" and fill invoiceId and amount (number).
- Otherwise set a short 'answer' and action=null.
- No markdown, no commentary, no extra keys.
"#;

pub const STRICT_DIRECTIVE: &str = "Return ONLY the JSON object. No markdown, no commentary.";

/// (user, assistant) pairs shown before the live query on the first attempt.
const FEW_SHOT_EXCHANGES: [(&str, &str); 2] = [
    (
        "Place a hold on invoice INV-1001 for $120.50",
        r#"{"action":"createPaymentHold","answer":null,"invoiceId":"INV-1001","amount":120.50}"#,
    ),
    (
        "How can I reduce p95 latency?",
        r#"{"action":null,"answer":"Increase DB pool size, add caching, and profile slow queries.","invoiceId":null,"amount":null}"#,
    ),
];

/// Ordered messages plus decoding options for a single provider call.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptSpec {
    messages: Vec<ChatMessage>,
    options: CompletionOptions,
}

impl PromptSpec {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn options(&self) -> &CompletionOptions {
        &self.options
    }
}

#[derive(Clone, Debug)]
pub struct PromptBuilder {
    model: String,
    temperature: f32,
}

impl PromptBuilder {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self { model: model.into(), temperature }
    }

    pub fn build_primary(&self, query: &str) -> PromptSpec {
        let mut messages = Vec::with_capacity(2 + FEW_SHOT_EXCHANGES.len() * 2);
        messages.push(ChatMessage::system(SYSTEM_INSTRUCTION));
        for (user, assistant) in FEW_SHOT_EXCHANGES {
            messages.push(ChatMessage::user(user));
            messages.push(ChatMessage::assistant(assistant));
        }
        messages.push(ChatMessage::user(query));

        PromptSpec { messages, options: self.options() }
    }

    /// Same instruction with the JSON-only directive appended and no example
    /// turns, so a verbose model has less to imitate on retry.
    pub fn build_strict(&self, query: &str) -> PromptSpec {
        let system = format!("{SYSTEM_INSTRUCTION}\n{STRICT_DIRECTIVE}");
        PromptSpec {
            messages: vec![ChatMessage::system(system), ChatMessage::user(query)],
            options: self.options(),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            response_format: ResponseFormat::JsonObject,
        }
    }
}
