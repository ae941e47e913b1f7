use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// =============================================================================
// Document conventions
// =============================================================================

/// A stored document: an arbitrary JSON object.
///
/// Field names are the schema; the store imposes only the `_id` convention
/// and the `<field>_embedding` sibling convention for embedded fields.
pub type Document = Map<String, Value>;

/// The identity field every stored document carries.
pub const ID_FIELD: &str = "_id";

/// Suffix appended to a field name to hold its embedding vector.
pub const EMBEDDING_SUFFIX: &str = "_embedding";

/// Fixed probe text embedded once to size a new vector index.
pub const DIMENSION_PROBE_TEXT: &str = "sample text";

/// Returns the sibling field name that carries `field`'s embedding.
pub fn embedding_field(field: &str) -> String {
    format!("{}{}", field, EMBEDDING_SUFFIX)
}

/// Returns true if `field` is an embedding sibling (stripped from search
/// results).
pub fn is_embedding_field(field: &str) -> bool {
    field.ends_with(EMBEDDING_SUFFIX)
}

/// Ensures the document carries an `_id`, generating a UUIDv4 string when
/// absent, and returns the id value.
pub fn ensure_document_id(doc: &mut Document) -> Value {
    if let Some(id) = doc.get(ID_FIELD) {
        return id.clone();
    }
    let id = Value::String(Uuid::new_v4().to_string());
    doc.insert(ID_FIELD.to_string(), id.clone());
    id
}

/// Extracts the vector stored at `path` in the document, if present and
/// numeric.
pub fn document_vector(doc: &Document, path: &str) -> Option<Vec<f32>> {
    let values = doc.get(path)?.as_array()?;
    let mut vector = Vec::with_capacity(values.len());
    for value in values {
        vector.push(value.as_f64()? as f32);
    }
    Some(vector)
}

// =============================================================================
// Index enums
// =============================================================================

/// Distance metric used by a vector index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl DistanceMetric {
    /// The metric name as the managed store spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::DotProduct => "dotProduct",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a vector index as observed through the store.
///
/// The managed store reports status as a free-form string; `from_report`
/// interprets it. `Absent` is never reported; it is the state of a name
/// missing from the index listing entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    /// No index of this name exists.
    Absent,
    /// Created but not yet queryable (includes in-progress build states).
    Pending,
    /// Queryable.
    Ready,
    /// The store reported a failed build.
    Failed,
}

impl IndexStatus {
    /// Interprets a status string from the store's index listing.
    ///
    /// Only an exact case-insensitive `READY` counts as ready; `FAILED` is
    /// surfaced as such; every other report (e.g. `PENDING`, `BUILDING`, or
    /// an unrecognized value) is treated as still pending.
    pub fn from_report(report: &str) -> Self {
        if report.eq_ignore_ascii_case("ready") {
            IndexStatus::Ready
        } else if report.eq_ignore_ascii_case("failed") {
            IndexStatus::Failed
        } else {
            IndexStatus::Pending
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, IndexStatus::Ready)
    }
}
