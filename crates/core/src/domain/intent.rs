use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// The only action name the router turns into a structured hold.
pub const CREATE_PAYMENT_HOLD: &str = "createPaymentHold";

pub const DEFAULT_PLAIN_ANSWER: &str = "OK. No actionable intent detected.";
pub const INCOMPLETE_HOLD_ANSWER: &str = "Detected hold intent but missing invoiceId/amount.";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(String);

impl InvoiceId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DomainError::BlankInvoiceId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A payment-hold request whose amount keeps the scale the provider wrote
/// (`120.50` stays `120.50`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HoldRequest {
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntentOutcome {
    PaymentHold(HoldRequest),
    IncompleteHold,
    UnsupportedAction { name: String },
    PlainAnswer { text: String },
    FallbackAnswer { text: String },
}

impl IntentOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PaymentHold(_) => "payment_hold",
            Self::IncompleteHold => "incomplete_hold",
            Self::UnsupportedAction { .. } => "unsupported_action",
            Self::PlainAnswer { .. } => "plain_answer",
            Self::FallbackAnswer { .. } => "fallback_answer",
        }
    }

    /// Shapes the outcome into the wire body: either an action with args, or
    /// a plain answer. Shortfalls are reported as answers, never as errors.
    pub fn to_response(&self) -> RouteResponse {
        match self {
            Self::PaymentHold(hold) => RouteResponse::Action {
                action: CREATE_PAYMENT_HOLD,
                args: HoldArgs {
                    invoice_id: hold.invoice_id.as_str().to_string(),
                    amount: hold.amount,
                },
            },
            Self::IncompleteHold => {
                RouteResponse::Answer { answer: INCOMPLETE_HOLD_ANSWER.to_string() }
            }
            Self::UnsupportedAction { name } => RouteResponse::Answer {
                answer: format!("Unsupported action '{name}'. Returning as plain answer."),
            },
            Self::PlainAnswer { text } | Self::FallbackAnswer { text } => {
                RouteResponse::Answer { answer: text.clone() }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RouteResponse {
    Action { action: &'static str, args: HoldArgs },
    Answer { answer: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HoldArgs {
    #[serde(rename = "invoiceId")]
    pub invoice_id: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::{HoldRequest, IntentOutcome, InvoiceId};
    use crate::errors::DomainError;

    #[test]
    fn invoice_id_rejects_blank_values() {
        assert_eq!(InvoiceId::parse("   "), Err(DomainError::BlankInvoiceId));
        assert_eq!(InvoiceId::parse(""), Err(DomainError::BlankInvoiceId));
        assert_eq!(InvoiceId::parse("INV-1").map(|id| id.as_str().to_string()), Ok("INV-1".into()));
    }

    #[test]
    fn payment_hold_serializes_literal_amount() {
        let outcome = IntentOutcome::PaymentHold(HoldRequest {
            invoice_id: InvoiceId::parse("INV-1001").expect("valid invoice"),
            amount: Decimal::from_str("120.50").expect("decimal"),
        });

        let body = serde_json::to_string(&outcome.to_response()).expect("serialize");

        assert_eq!(
            body,
            r#"{"action":"createPaymentHold","args":{"invoiceId":"INV-1001","amount":120.50}}"#
        );
    }

    #[test]
    fn shortfalls_serialize_as_answers() {
        let incomplete = serde_json::to_string(&IntentOutcome::IncompleteHold.to_response())
            .expect("serialize");
        assert_eq!(
            incomplete,
            r#"{"answer":"Detected hold intent but missing invoiceId/amount."}"#
        );

        let unsupported = serde_json::to_string(
            &IntentOutcome::UnsupportedAction { name: "refund".to_string() }.to_response(),
        )
        .expect("serialize");
        assert_eq!(
            unsupported,
            r#"{"answer":"Unsupported action 'refund'. Returning as plain answer."}"#
        );
    }

    #[test]
    fn fallback_and_plain_answers_share_wire_shape() {
        let plain = IntentOutcome::PlainAnswer { text: "hi".to_string() }.to_response();
        let fallback = IntentOutcome::FallbackAnswer { text: "hi".to_string() }.to_response();
        assert_eq!(plain, fallback);
    }
}
