//! Lance-backed embedding cache store.
//!
//! One row per `(content_hash, bucket)`, recording the model that produced
//! the vector. Lookups must name the same model; writing a vector for a new
//! model or width replaces the row instead of appending next to it.

use std::path::Path;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{ListArray, RecordBatch, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use tokio::runtime::Runtime;
use tracing::debug;

use codesearch_core::traits::CacheStore;
use codesearch_core::types::CacheKey;
use codesearch_core::{Error, Result};

use crate::schema::build_cache_schema;
use crate::table::{column, ensure_table, open_db, quote, single_batch_reader};

pub struct LanceCacheStore {
    rt: Runtime,
    db: Connection,
    table_name: String,
    rows: usize,
}

impl LanceCacheStore {
    pub fn open(dir: &Path, table_name: &str) -> Result<Self> {
        let rt = Runtime::new()?;
        std::fs::create_dir_all(dir)?;
        let uri = dir.to_string_lossy().to_string();
        let (db, rows) = rt.block_on(async {
            let db = open_db(&uri).await?;
            ensure_table(&db, table_name, build_cache_schema()).await?;
            let table = db.open_table(table_name).execute().await.map_err(Error::backend)?;
            let rows = table.count_rows(None).await.map_err(Error::backend)?;
            Ok::<_, Error>((db, rows))
        })?;
        debug!(table = table_name, rows, "opened persistent embedding cache");
        Ok(Self { rt, db, table_name: table_name.to_string(), rows })
    }
}

impl CacheStore for LanceCacheStore {
    fn get(&mut self, key: &CacheKey) -> Result<Option<Arc<[f32]>>> {
        let filter = format!(
            "content_hash = {} AND bucket = {} AND model = {}",
            quote(&key.content_hash),
            quote(key.bucket.as_str()),
            quote(&key.model)
        );
        self.rt.block_on(async {
            let table = self.db.open_table(&self.table_name).execute().await.map_err(Error::backend)?;
            let mut stream = table.query().only_if(filter).limit(1).execute().await.map_err(Error::backend)?;
            while let Some(batch) = stream.try_next().await.map_err(Error::backend)? {
                if batch.num_rows() == 0 { continue; }
                let vectors = column::<ListArray>(&batch, "vector")?;
                let values = vectors.value(0);
                let v: Vec<f32> = values.as_primitive::<Float32Type>().values().iter().copied().collect();
                return Ok(Some(Arc::from(v)));
            }
            Ok::<_, Error>(None)
        })
    }

    fn put(&mut self, key: CacheKey, vector: Arc<[f32]>) -> Result<()> {
        let batch = RecordBatch::try_new(
            build_cache_schema(),
            vec![
                Arc::new(StringArray::from(vec![key.content_hash])),
                Arc::new(StringArray::from(vec![key.bucket.as_str()])),
                Arc::new(StringArray::from(vec![key.model])),
                Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
                Arc::new(ListArray::from_iter_primitive::<Float32Type, _, _>(vec![Some(
                    vector.iter().map(|&x| Some(x)).collect::<Vec<_>>(),
                )])),
            ],
        )
        .map_err(Error::backend)?;
        self.rows = self.rt.block_on(async {
            let table = self.db.open_table(&self.table_name).execute().await.map_err(Error::backend)?;
            let mut mi = table.merge_insert(&["content_hash", "bucket"]);
            mi.when_matched_update_all(None).when_not_matched_insert_all();
            mi.execute(single_batch_reader(batch)).await.map_err(Error::backend)?;
            table.count_rows(None).await.map_err(Error::backend)
        })?;
        Ok(())
    }

    fn len(&self) -> usize { self.rows }
}
