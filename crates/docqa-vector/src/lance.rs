//! LanceDB-backed vector index.
//!
//! The table is rebuilt from scratch on every start: `create_fresh` wipes the
//! database directory before connecting.

use std::path::Path;
use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use tokio::sync::RwLock;
use tracing::{debug, info};

use docqa_core::error::{Error, Result};
use docqa_core::traits::VectorIndex;
use docqa_core::types::{DocumentChunk, ScoredChunk};

use crate::memory::check_batch;
use crate::schema::build_arrow_schema;

const INSERT_BATCH: usize = 1000;

fn index_err(e: impl std::fmt::Display) -> Error {
	Error::Index(e.to_string())
}

pub struct LanceIndex {
	db: Connection,
	table_name: String,
	dim: RwLock<Option<usize>>,
}

impl LanceIndex {
	/// Remove any previous database at `db_path` and connect to an empty one.
	pub async fn create_fresh(db_path: &Path, table_name: &str) -> Result<Self> {
		if tokio::fs::try_exists(db_path).await.map_err(index_err)? {
			tokio::fs::remove_dir_all(db_path).await.map_err(index_err)?;
		}
		tokio::fs::create_dir_all(db_path).await.map_err(index_err)?;
		let db = connect(db_path.to_string_lossy().as_ref()).execute().await.map_err(index_err)?;
		info!(path = %db_path.display(), table = table_name, "LanceDB index ready");
		Ok(Self { db, table_name: table_name.to_string(), dim: RwLock::new(None) })
	}

	async fn table_exists(&self) -> Result<bool> {
		let names = self.db.table_names().execute().await.map_err(index_err)?;
		Ok(names.contains(&self.table_name))
	}

	async fn insert_batch(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>], dim: usize) -> Result<()> {
		let record_batch = to_record_batch(chunks, vectors, dim)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if self.table_exists().await? {
			self.db.open_table(&self.table_name).execute().await.map_err(index_err)?.add(reader).execute().await.map_err(index_err)?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await.map_err(index_err)?;
		}
		Ok(())
	}
}

fn to_record_batch(chunks: &[DocumentChunk], vectors: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
	let dim = i32::try_from(dim).map_err(index_err)?;
	let schema = build_arrow_schema(dim);
	let vectors: Vec<Option<Vec<Option<f32>>>> = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect())).collect();
	RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from(chunks.iter().map(|c| c.id.clone()).collect::<Vec<_>>())),
		Arc::new(StringArray::from(chunks.iter().map(|c| c.doc_id.clone()).collect::<Vec<_>>())),
		Arc::new(StringArray::from(chunks.iter().map(|c| c.source.clone()).collect::<Vec<_>>())),
		Arc::new(StringArray::from(chunks.iter().map(|c| c.content.clone()).collect::<Vec<_>>())),
		Arc::new(Int64Array::from(chunks.iter().map(|c| c.start_offset as i64).collect::<Vec<_>>())),
		Arc::new(Int32Array::from(chunks.iter().map(|c| c.chunk_index as i32).collect::<Vec<_>>())),
		Arc::new(Int32Array::from(chunks.iter().map(|c| c.total_chunks as i32).collect::<Vec<_>>())),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
	]).map_err(index_err)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| Error::Index(format!("column '{name}' missing from search results")))
}

fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
	let ids = column::<StringArray>(batch, "id")?;
	let doc_ids = column::<StringArray>(batch, "doc_id")?;
	let sources = column::<StringArray>(batch, "source")?;
	let contents = column::<StringArray>(batch, "content")?;
	let offsets = column::<Int64Array>(batch, "start_offset")?;
	let indices = column::<Int32Array>(batch, "chunk_index")?;
	let totals = column::<Int32Array>(batch, "total_chunks")?;
	let distances = column::<Float32Array>(batch, "_distance").ok();

	let mut hits = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		// L2 distance: smaller is closer, so flip it into a higher-is-better score.
		let score = distances.map_or(0.5, |d| 1.0 - d.value(i));
		hits.push(ScoredChunk {
			chunk: DocumentChunk {
				id: ids.value(i).to_string(),
				doc_id: doc_ids.value(i).to_string(),
				source: sources.value(i).to_string(),
				content: contents.value(i).to_string(),
				start_offset: usize::try_from(offsets.value(i)).unwrap_or(0),
				chunk_index: usize::try_from(indices.value(i)).unwrap_or(0),
				total_chunks: usize::try_from(totals.value(i)).unwrap_or(0),
			},
			score,
		});
	}
	Ok(hits)
}

#[async_trait]
impl VectorIndex for LanceIndex {
	async fn add(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()> {
		if chunks.is_empty() && vectors.is_empty() {
			return Ok(());
		}
		let mut dim_guard = self.dim.write().await;
		let dim = check_batch(chunks, vectors, *dim_guard)?;
		for (chunk_batch, vector_batch) in chunks.chunks(INSERT_BATCH).zip(vectors.chunks(INSERT_BATCH)) {
			self.insert_batch(chunk_batch, vector_batch, dim).await?;
			debug!(rows = chunk_batch.len(), table = %self.table_name, "inserted LanceDB batch");
		}
		*dim_guard = Some(dim);
		Ok(())
	}

	async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
		if let Some(dim) = *self.dim.read().await {
			if vector.len() != dim {
				return Err(Error::Index(format!("query dimension {} does not match index dimension {}", vector.len(), dim)));
			}
		}
		if !self.table_exists().await? {
			return Ok(vec![]);
		}
		let table = self.db.open_table(&self.table_name).execute().await.map_err(index_err)?;
		let mut results = table.vector_search(vector.to_vec()).map_err(index_err)?.limit(k).execute().await.map_err(index_err)?;
		let mut hits = Vec::new();
		while let Some(batch) = results.try_next().await.map_err(index_err)? {
			hits.extend(batch_to_hits(&batch)?);
		}
		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		hits.truncate(k);
		Ok(hits)
	}

	async fn len(&self) -> Result<usize> {
		if !self.table_exists().await? {
			return Ok(0);
		}
		let table = self.db.open_table(&self.table_name).execute().await.map_err(index_err)?;
		table.count_rows(None).await.map_err(index_err)
	}
}
