pub mod config;
pub mod domain;
pub mod errors;

pub use domain::document::Document;
pub use domain::intent::{
    HoldArgs, HoldRequest, IntentOutcome, InvoiceId, RouteResponse, CREATE_PAYMENT_HOLD,
    DEFAULT_PLAIN_ANSWER,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
