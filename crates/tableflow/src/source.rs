// ── Data source seam ──
//
// Where rows come from. The controller hands implementations the full
// state current at fetch time; they pick out whatever they need (page,
// filters, search, sorting) to build their query, and return one of
// three payload shapes. Normalization turns each shape into a uniform
// rows-plus-meta batch or a typed error.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{SourceError, TableError};
use crate::state::{Meta, TableState};

/// Asynchronous row provider driven by a
/// [`TableController`](crate::controller::TableController).
#[async_trait]
pub trait DataSource<R>: Send + Sync {
    async fn fetch(&self, state: Arc<TableState<R>>) -> Result<SourcePayload<R>, SourceError>;
}

// ── Payload shapes ──────────────────────────────────────────────────

/// Response shapes a [`DataSource`] may return.
#[derive(Debug)]
pub enum SourcePayload<R> {
    /// A bare sequence of rows; metadata is synthesized as `{"count": n}`.
    Rows(Vec<R>),
    /// Rows plus source-reported metadata, passed through verbatim.
    Envelope { data: Vec<R>, meta: Meta },
    /// Untyped JSON from sources that don't decode rows themselves.
    /// The envelope and bare-array rules above are applied to the value.
    Json(Value),
}

/// A fully normalized fetch result.
#[derive(Debug)]
pub(crate) struct ResolvedBatch<R> {
    pub rows: Vec<R>,
    pub meta: Meta,
}

impl<R: DeserializeOwned> SourcePayload<R> {
    /// Normalize into rows plus metadata, or a typed shape error.
    pub(crate) fn normalize(self) -> Result<ResolvedBatch<R>, TableError> {
        match self {
            Self::Rows(rows) => {
                let meta = count_meta(rows.len());
                Ok(ResolvedBatch { rows, meta })
            }
            Self::Envelope { data, meta } => Ok(ResolvedBatch { rows: data, meta }),
            Self::Json(value) => normalize_json(value),
        }
    }
}

fn normalize_json<R: DeserializeOwned>(value: Value) -> Result<ResolvedBatch<R>, TableError> {
    match value {
        Value::Array(items) => {
            let meta = count_meta(items.len());
            let rows = decode_rows(items)?;
            Ok(ResolvedBatch { rows, meta })
        }
        Value::Object(mut fields) => {
            // An envelope is an object carrying both a `data` array and
            // a `meta` object. An object missing either is not a row
            // sequence.
            match (fields.remove("data"), fields.remove("meta")) {
                (Some(Value::Array(items)), Some(Value::Object(meta))) => {
                    let rows = decode_rows(items)?;
                    Ok(ResolvedBatch { rows, meta })
                }
                _ => Err(TableError::InvalidShape { got: "object" }),
            }
        }
        other => Err(TableError::InvalidShape {
            got: json_type_name(&other),
        }),
    }
}

fn decode_rows<R: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<R>, TableError> {
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| TableError::Decode {
                message: e.to_string(),
            })
        })
        .collect()
}

fn count_meta(count: usize) -> Meta {
    let mut meta = Meta::new();
    meta.insert("count".into(), Value::from(count));
    meta
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Closure adapter ─────────────────────────────────────────────────

/// Wrap an async closure as a [`DataSource`].
pub fn source_fn<R, F, Fut>(f: F) -> FnSource<F>
where
    F: Fn(Arc<TableState<R>>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<SourcePayload<R>, SourceError>> + Send + 'static,
{
    FnSource(f)
}

/// [`DataSource`] backed by a closure. Built by [`source_fn`].
pub struct FnSource<F>(F);

#[async_trait]
impl<R, F, Fut> DataSource<R> for FnSource<F>
where
    R: Send + Sync + 'static,
    F: Fn(Arc<TableState<R>>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<SourcePayload<R>, SourceError>> + Send + 'static,
{
    async fn fetch(&self, state: Arc<TableState<R>>) -> Result<SourcePayload<R>, SourceError> {
        (self.0)(state).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::SourcePayload;
    use crate::error::TableError;
    use crate::state::Meta;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Record {
        id: u32,
        name: String,
    }

    #[test]
    fn bare_rows_synthesize_count_meta() {
        let payload: SourcePayload<u32> = SourcePayload::Rows(vec![1, 2, 3]);
        let batch = payload.normalize().unwrap();
        assert_eq!(batch.rows, vec![1, 2, 3]);
        assert_eq!(batch.meta.get("count"), Some(&json!(3)));
    }

    #[test]
    fn typed_envelope_passes_meta_through() {
        let mut meta = Meta::new();
        meta.insert("total".into(), json!(99));
        let payload = SourcePayload::Envelope {
            data: vec![1u32],
            meta,
        };
        let batch = payload.normalize().unwrap();
        assert_eq!(batch.meta.get("total"), Some(&json!(99)));
        assert!(batch.meta.get("count").is_none());
    }

    #[test]
    fn json_array_becomes_rows_with_count() {
        let payload: SourcePayload<Record> = SourcePayload::Json(json!([
            { "id": 1, "name": "one" },
            { "id": 2, "name": "two" },
        ]));
        let batch = payload.normalize().unwrap();
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[1].name, "two");
        assert_eq!(batch.meta.get("count"), Some(&json!(2)));
    }

    #[test]
    fn json_envelope_decodes_rows_and_meta() {
        let payload: SourcePayload<Record> = SourcePayload::Json(json!({
            "data": [{ "id": 7, "name": "seven" }],
            "meta": { "total": 40 },
        }));
        let batch = payload.normalize().unwrap();
        assert_eq!(batch.rows, vec![Record { id: 7, name: "seven".into() }]);
        assert_eq!(batch.meta.get("total"), Some(&json!(40)));
    }

    #[test]
    fn json_object_without_meta_is_a_shape_error() {
        let payload: SourcePayload<Record> = SourcePayload::Json(json!({
            "data": [{ "id": 7, "name": "seven" }],
        }));
        assert_eq!(
            payload.normalize().unwrap_err(),
            TableError::InvalidShape { got: "object" }
        );
    }

    #[test]
    fn json_scalar_is_a_shape_error() {
        let payload: SourcePayload<u32> = SourcePayload::Json(json!(42));
        assert_eq!(
            payload.normalize().unwrap_err(),
            TableError::InvalidShape { got: "number" }
        );
    }

    #[test]
    fn json_object_without_data_is_a_shape_error() {
        let payload: SourcePayload<u32> = SourcePayload::Json(json!({ "rows": [1, 2] }));
        assert_eq!(
            payload.normalize().unwrap_err(),
            TableError::InvalidShape { got: "object" }
        );
    }

    #[test]
    fn json_envelope_with_non_array_data_is_a_shape_error() {
        let payload: SourcePayload<u32> = SourcePayload::Json(json!({
            "data": 5,
            "meta": {},
        }));
        assert_eq!(
            payload.normalize().unwrap_err(),
            TableError::InvalidShape { got: "object" }
        );
    }

    #[test]
    fn undecodable_records_are_decode_errors() {
        let payload: SourcePayload<Record> = SourcePayload::Json(json!([{ "id": "oops" }]));
        assert!(matches!(
            payload.normalize().unwrap_err(),
            TableError::Decode { .. }
        ));
    }
}
