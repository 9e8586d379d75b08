pub mod document;
pub mod intent;
