use std::str::FromStr;
use std::sync::Arc;

use routey_core::domain::intent::{
    HoldRequest, IntentOutcome, InvoiceId, CREATE_PAYMENT_HOLD, DEFAULT_PLAIN_ANSWER,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::coercion::{coerce, strip_fences, JsonObject};
use crate::llm::{LlmClient, LlmError};
use crate::prompt::{PromptBuilder, PromptSpec};

pub const FALLBACK_MAX_CHARS: usize = 800;

/// Runs the primary/strict/fallback protocol for one query.
///
/// The router holds no per-request state, so a single instance can serve
/// concurrent requests. Provider failures on either attempt are returned as
/// errors; unparseable output never is.
#[derive(Clone)]
pub struct IntentRouter {
    llm: Arc<dyn LlmClient>,
    prompts: PromptBuilder,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptBuilder) -> Self {
        Self { llm, prompts }
    }

    pub async fn route(&self, query: &str) -> Result<IntentOutcome, LlmError> {
        let first_raw = self.attempt(1, &self.prompts.build_primary(query)).await?;
        if let Some(object) = coerce(&first_raw) {
            return Ok(finish(1, &object));
        }
        warn!(
            event_name = "ai.route.coercion_failed",
            attempt = 1,
            raw_chars = first_raw.chars().count(),
            "primary completion was not a JSON object; retrying with strict prompt"
        );

        let second_raw = self.attempt(2, &self.prompts.build_strict(query)).await?;
        if let Some(object) = coerce(&second_raw) {
            return Ok(finish(2, &object));
        }
        warn!(
            event_name = "ai.route.fallback",
            attempt = 2,
            raw_chars = second_raw.chars().count(),
            "strict completion was not a JSON object; answering with raw text"
        );

        Ok(IntentOutcome::FallbackAnswer { text: fallback_text(&first_raw, &second_raw) })
    }

    async fn attempt(&self, attempt: u8, spec: &PromptSpec) -> Result<String, LlmError> {
        info!(
            event_name = "ai.route.attempt",
            attempt,
            message_count = spec.messages().len(),
            model = %spec.options().model,
            "requesting completion"
        );

        self.llm.complete(spec.messages(), spec.options()).await.map_err(|err| {
            error!(
                event_name = "ai.route.provider_failed",
                attempt,
                error = %err,
                "completion provider call failed"
            );
            err
        })
    }
}

fn finish(attempt: u8, object: &JsonObject) -> IntentOutcome {
    let outcome = IntentFields::from_object(object).into_outcome();
    info!(
        event_name = "ai.route.completed",
        attempt,
        outcome = outcome.kind(),
        "intent routed"
    );
    outcome
}

/// The four fields the router reads from a coerced object. Missing and
/// `null` values are both absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntentFields {
    pub action: Option<String>,
    pub answer: Option<String>,
    pub invoice_id: Option<String>,
    pub amount: Option<Decimal>,
}

impl IntentFields {
    pub fn from_object(object: &JsonObject) -> Self {
        Self {
            action: text_field(object, "action"),
            answer: text_field(object, "answer"),
            invoice_id: text_field(object, "invoiceId"),
            amount: decimal_field(object, "amount"),
        }
    }

    pub fn into_outcome(self) -> IntentOutcome {
        let Some(action) = self.action.filter(|action| !action.trim().is_empty()) else {
            return match self.answer.filter(|answer| !answer.trim().is_empty()) {
                Some(text) => IntentOutcome::PlainAnswer { text },
                None => IntentOutcome::PlainAnswer { text: DEFAULT_PLAIN_ANSWER.to_string() },
            };
        };

        if !action.eq_ignore_ascii_case(CREATE_PAYMENT_HOLD) {
            return IntentOutcome::UnsupportedAction { name: action };
        }

        let invoice_id = self.invoice_id.and_then(|raw| InvoiceId::parse(raw).ok());
        match (invoice_id, self.amount) {
            (Some(invoice_id), Some(amount)) => {
                IntentOutcome::PaymentHold(HoldRequest { invoice_id, amount })
            }
            _ => IntentOutcome::IncompleteHold,
        }
    }
}

fn text_field(object: &JsonObject, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Numbers keep their literal text; strings are parsed as plain or
/// scientific decimals. Anything else is absent, and so is any literal that
/// `Decimal` cannot hold without rounding.
fn decimal_field(object: &JsonObject, key: &str) -> Option<Decimal> {
    let raw = match object.get(key)? {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        _ => return None,
    };

    let literal = DecimalLiteral::parse(&raw)?;
    let amount = if literal.scientific {
        Decimal::from_scientific(&raw).ok()?
    } else {
        Decimal::from_str(&raw).ok()?
    };
    literal.is_exactly(&amount).then_some(amount)
}

/// Sign, significant digits and power of ten of a decimal literal, so a
/// parsed value can be checked against what the provider actually wrote.
#[derive(Debug)]
struct DecimalLiteral {
    negative: bool,
    digits: String,
    power: i64,
    scientific: bool,
    fraction_len: usize,
}

impl DecimalLiteral {
    /// Accepts `[+-]digits[.digits][(e|E)[+-]digits]` with at least one
    /// mantissa digit. Separators, currency marks and spaces are rejected.
    fn parse(raw: &str) -> Option<Self> {
        let (negative, unsigned) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };
        let (mantissa, exponent) = match unsigned.find(|c: char| c == 'e' || c == 'E') {
            Some(index) => (&unsigned[..index], Some(&unsigned[index + 1..])),
            None => (unsigned, None),
        };
        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));

        let all_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
        if integer.len() + fraction.len() == 0 || !all_digits(integer) || !all_digits(fraction) {
            return None;
        }
        let scientific = exponent.is_some();
        let exponent = match exponent {
            Some(text) => {
                let unsigned = text.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(text);
                if unsigned.is_empty() || !all_digits(unsigned) {
                    return None;
                }
                text.parse::<i64>().ok()?
            }
            None => 0,
        };

        let digits = format!("{integer}{fraction}");
        let significant = digits.trim_end_matches('0');
        let power = exponent - fraction.len() as i64 + (digits.len() - significant.len()) as i64;
        let significant = significant.trim_start_matches('0');
        if significant.is_empty() {
            return Some(Self {
                negative: false,
                digits: String::new(),
                power: 0,
                scientific,
                fraction_len: fraction.len(),
            });
        }

        Some(Self {
            negative,
            digits: significant.to_string(),
            power,
            scientific,
            fraction_len: fraction.len(),
        })
    }

    /// Same value, and for plain literals the same scale, so `75.00` is
    /// never reported as `75` or `75.0000`.
    fn is_exactly(&self, amount: &Decimal) -> bool {
        let Some(parsed) = Self::parse(&amount.to_string()) else {
            return false;
        };
        let same_value = (parsed.negative, &parsed.digits, parsed.power)
            == (self.negative, &self.digits, self.power);
        let same_scale = self.scientific || amount.scale() as usize == self.fraction_len;
        same_value && same_scale
    }
}

fn fallback_text(first_raw: &str, second_raw: &str) -> String {
    let raw = if second_raw.trim().is_empty() { first_raw } else { second_raw };
    let unfenced = strip_fences(raw.trim());

    match unfenced.char_indices().nth(FALLBACK_MAX_CHARS) {
        Some((byte_index, _)) => unfenced[..byte_index].to_string(),
        None => unfenced.to_string(),
    }
}
