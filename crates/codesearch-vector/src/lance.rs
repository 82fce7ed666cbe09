//! LanceDB-backed point index.
//!
//! The index owns a Tokio runtime and blocks on every LanceDB call so it can
//! sit behind the synchronous `PointIndex` trait. A reset deletes the table's
//! directory and recreates an empty table of the requested dimension.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray, UInt64Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use codesearch_core::traits::PointIndex;
use codesearch_core::types::{IndexedPoint, LanguageBucket, PointPayload, ScoredPoint};
use codesearch_core::{Error, Result};

use crate::schema::{build_points_schema, vector_dimension};
use crate::table::{column, contains_pattern, ensure_table, open_db, quote, single_batch_reader, table_exists};

pub struct LanceIndex {
    rt: Runtime,
    dir: PathBuf,
    db: Connection,
    table_name: String,
    dimension: Option<usize>,
}

impl LanceIndex {
    /// Connect to the database under `dir`. An existing table is picked up
    /// as-is, so a previously built index is searchable immediately.
    pub fn open(dir: &Path, table_name: &str) -> Result<Self> {
        let rt = Runtime::new()?;
        std::fs::create_dir_all(dir)?;
        let uri = dir.to_string_lossy().to_string();
        let (db, dimension) = rt.block_on(async {
            let db = open_db(&uri).await?;
            let dimension = if table_exists(&db, table_name).await? {
                let table = db.open_table(table_name).execute().await.map_err(Error::backend)?;
                let schema = table.schema().await.map_err(Error::backend)?;
                vector_dimension(&schema)
            } else {
                None
            };
            Ok::<_, Error>((db, dimension))
        })?;
        info!(dir = %dir.display(), table = table_name, ?dimension, "opened lance index");
        Ok(Self { rt, dir: dir.to_path_buf(), db, table_name: table_name.to_string(), dimension })
    }

    fn table(&self) -> Result<Table> {
        if self.dimension.is_none() {
            return Err(Error::IndexNotReady(format!("table '{}' does not exist", self.table_name)));
        }
        self.rt.block_on(self.db.open_table(&self.table_name).execute()).map_err(Error::backend)
    }

    fn collect_rows(&self, table: &Table, filter: Option<String>) -> Result<Vec<ScoredPoint>> {
        self.rt.block_on(async {
            let query = match filter {
                Some(f) => table.query().only_if(f),
                None => table.query(),
            };
            let mut stream = query.execute().await.map_err(Error::backend)?;
            let mut out = Vec::new();
            while let Some(batch) = stream.try_next().await.map_err(Error::backend)? {
                decode_points(&batch, &mut out)?;
            }
            Ok::<_, Error>(out)
        })
    }
}

impl PointIndex for LanceIndex {
    fn create_or_reset(&mut self, dimension: usize) -> Result<()> {
        let table_dir = self.dir.join(format!("{}.lance", self.table_name));
        if table_dir.exists() {
            std::fs::remove_dir_all(&table_dir)?;
        }
        self.dimension = None;
        self.rt.block_on(ensure_table(&self.db, &self.table_name, build_points_schema(dimension)))?;
        self.dimension = Some(dimension);
        info!(table = %self.table_name, dimension, "collection reset");
        Ok(())
    }

    fn upsert_batch(&mut self, points: &[IndexedPoint]) -> Result<()> {
        let table = self.table()?;
        let expected = self.dimension.unwrap_or_default();
        if let Some(bad) = points.iter().find(|p| p.vector.len() != expected) {
            return Err(Error::DimensionMismatch { expected, actual: bad.vector.len() });
        }
        if points.is_empty() {
            return Ok(());
        }
        // Last write wins for ids repeated inside one batch.
        let unique: BTreeMap<u64, &IndexedPoint> = points.iter().map(|p| (p.id, p)).collect();
        let batch = points_to_batch(unique.values().copied(), expected)?;
        self.rt.block_on(async {
            let mut mi = table.merge_insert(&["id"]);
            mi.when_matched_update_all(None).when_not_matched_insert_all();
            mi.execute(single_batch_reader(batch)).await.map_err(Error::backend)
        })?;
        debug!(table = %self.table_name, points = unique.len(), "upserted batch");
        Ok(())
    }

    fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let table = self.table()?;
        let expected = self.dimension.unwrap_or_default();
        if query.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: query.len() });
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut hits = self.rt.block_on(async {
            let mut stream = table
                .vector_search(query.to_vec())
                .map_err(Error::backend)?
                .distance_type(DistanceType::Cosine)
                .limit(k)
                .execute()
                .await
                .map_err(Error::backend)?;
            let mut out = Vec::new();
            while let Some(batch) = stream.try_next().await.map_err(Error::backend)? {
                let start = out.len();
                decode_points(&batch, &mut out)?;
                let distance = column::<Float32Array>(&batch, "_distance")?;
                for (i, hit) in out[start..].iter_mut().enumerate() {
                    hit.score = 1.0 - distance.value(i);
                }
            }
            Ok::<_, Error>(out)
        })?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<ScoredPoint>> {
        let table = self.table()?;
        // Prefilter in Lance, then confirm with an exact substring check.
        let filter = format!("`text` LIKE {}", quote(&contains_pattern(query)));
        let mut rows = self.collect_rows(&table, Some(filter))?;
        rows.retain(|p| p.payload.text.contains(query));
        rows.sort_by_key(|p| p.id);
        rows.truncate(k);
        Ok(rows)
    }

    fn is_ready(&self) -> bool { self.dimension.is_some() }

    fn dimension(&self) -> Option<usize> { self.dimension }

    fn len(&self) -> Result<usize> {
        let table = self.table()?;
        self.rt.block_on(table.count_rows(None)).map_err(Error::backend)
    }
}

fn points_to_batch<'a>(points: impl Iterator<Item = &'a IndexedPoint>, dimension: usize) -> Result<RecordBatch> {
    let mut ids = Vec::new();
    let mut texts = Vec::new();
    let mut sources = Vec::new();
    let mut langs = Vec::new();
    let mut files = Vec::new();
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
    for p in points {
        ids.push(p.id);
        texts.push(p.payload.text.clone());
        sources.push(p.payload.source.clone());
        langs.push(p.payload.lang.as_str());
        files.push(p.payload.file.clone());
        starts.push(p.payload.start_line as u64);
        ends.push(p.payload.end_line as u64);
        vectors.push(Some(p.vector.iter().map(|&x| Some(x)).collect()));
    }
    RecordBatch::try_new(
        build_points_schema(dimension),
        vec![
            Arc::new(UInt64Array::from(ids)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(langs)),
            Arc::new(StringArray::from(files)),
            Arc::new(UInt64Array::from(starts)),
            Arc::new(UInt64Array::from(ends)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dimension as i32)),
        ],
    )
    .map_err(Error::backend)
}

fn decode_points(batch: &RecordBatch, out: &mut Vec<ScoredPoint>) -> Result<()> {
    let ids = column::<UInt64Array>(batch, "id")?;
    let texts = column::<StringArray>(batch, "text")?;
    let sources = column::<StringArray>(batch, "source")?;
    let langs = column::<StringArray>(batch, "lang")?;
    let files = column::<StringArray>(batch, "file")?;
    let starts = column::<UInt64Array>(batch, "start_line")?;
    let ends = column::<UInt64Array>(batch, "end_line")?;
    for i in 0..batch.num_rows() {
        let lang: LanguageBucket = langs.value(i).parse().map_err(Error::Backend)?;
        let file = if files.is_null(i) { None } else { Some(files.value(i).to_string()) };
        out.push(ScoredPoint {
            id: ids.value(i),
            score: 0.0,
            payload: PointPayload {
                text: texts.value(i).to_string(),
                source: sources.value(i).to_string(),
                lang,
                file,
                start_line: starts.value(i) as usize,
                end_line: ends.value(i) as usize,
            },
        });
    }
    Ok(())
}
