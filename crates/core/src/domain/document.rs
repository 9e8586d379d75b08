use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key that carries the caller-supplied document id.
pub const DOC_ID_METADATA_KEY: &str = "docId";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        let id = id.into();
        let mut metadata = metadata;
        metadata.insert(DOC_ID_METADATA_KEY.to_string(), Value::String(id.clone()));
        Self { id, content: content.into(), metadata }
    }

    /// Content cut to `max_chars` characters, with `...` appended when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((byte_index, _)) => format!("{}...", &self.content[..byte_index]),
            None => self.content.clone(),
        }
    }
}
