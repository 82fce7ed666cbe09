use codesearch_core::traits::{CacheStore, PointIndex};
use codesearch_core::types::{CacheKey, IndexedPoint, LanguageBucket, PointPayload};
use codesearch_core::Error;
use codesearch_vector::{LanceCacheStore, LanceIndex, MemoryIndex};
use std::sync::Arc;
use tempfile::TempDir;

fn point(id: u64, text: &str, vector: Vec<f32>) -> IndexedPoint {
    IndexedPoint {
        id,
        vector,
        payload: PointPayload {
            text: text.to_string(),
            source: "merged_code.txt".to_string(),
            lang: LanguageBucket::classify(text),
            file: Some("App.cs".to_string()),
            start_line: id as usize + 1,
            end_line: id as usize + 1,
        },
    }
}

fn sample_points() -> Vec<IndexedPoint> {
    vec![
        point(0, "namespace Demo {", vec![1.0, 0.0, 0.0]),
        point(1, "public class Widget {}", vec![0.0, 1.0, 0.0]),
        point(2, "<Grid x:Name=\"Root\">", vec![0.7, 0.7, 0.0]),
        point(3, "class Widget_Factory", vec![0.0, 0.0, 1.0]),
        point(4, r#"var log = @"C:\temp\log.txt";"#, vec![0.0, 0.3, 0.9]),
    ]
}

/// Behaviour every backend must share.
fn exercise_backend(index: &mut dyn PointIndex) {
    assert!(!index.is_ready());
    assert!(matches!(index.vector_search(&[1.0, 0.0, 0.0], 3), Err(Error::IndexNotReady(_))));
    assert!(matches!(index.keyword_search("class", 3), Err(Error::IndexNotReady(_))));

    index.create_or_reset(3).expect("create");
    assert!(index.is_ready());
    assert_eq!(index.dimension(), Some(3));
    assert_eq!(index.len().unwrap(), 0);

    index.upsert_batch(&sample_points()).expect("upsert");
    assert_eq!(index.len().unwrap(), 5);

    let hits = index.vector_search(&[1.0, 0.1, 0.0], 2).expect("vector search");
    assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![0, 2]);
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(hits[0].payload.file.as_deref(), Some("App.cs"));

    let kw = index.keyword_search("class Widget", 10).expect("keyword search");
    let mut ids: Vec<u64> = kw.iter().map(|h| h.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3]);
    // `_` must be matched literally, not as a wildcard.
    let kw = index.keyword_search("Widget_", 10).expect("keyword search");
    assert_eq!(kw.iter().map(|h| h.id).collect::<Vec<_>>(), vec![3]);
    assert_eq!(index.keyword_search("class", 1).unwrap().len(), 1);
    // Backslashes are literal too.
    let kw = index.keyword_search(r"C:\temp", 10).expect("keyword search");
    assert_eq!(kw.iter().map(|h| h.id).collect::<Vec<_>>(), vec![4]);
    assert!(index.keyword_search("C:temp", 10).unwrap().is_empty());

    let err = index.upsert_batch(&[point(9, "x", vec![1.0, 2.0])]).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));

    // Re-using an id overwrites the point.
    index.upsert_batch(&[point(1, "struct Renamed", vec![0.0, 1.0, 0.0])]).unwrap();
    assert_eq!(index.len().unwrap(), 5);
    assert!(index.keyword_search("Renamed", 5).unwrap().iter().any(|h| h.id == 1));

    index.create_or_reset(2).expect("reset");
    assert_eq!(index.len().unwrap(), 0);
    assert_eq!(index.dimension(), Some(2));
}

#[test]
fn memory_index_behaviour() {
    let mut index = MemoryIndex::new();
    exercise_backend(&mut index);
}

#[test]
fn lance_index_behaviour() {
    let tmp = TempDir::new().expect("tmp");
    let mut index = LanceIndex::open(tmp.path(), "code_search").expect("open");
    exercise_backend(&mut index);
}

#[test]
fn lance_index_is_ready_after_reopen() {
    let tmp = TempDir::new().expect("tmp");
    {
        let mut index = LanceIndex::open(tmp.path(), "code_search").expect("open");
        index.create_or_reset(3).unwrap();
        index.upsert_batch(&sample_points()).unwrap();
    }
    let index = LanceIndex::open(tmp.path(), "code_search").expect("reopen");
    assert!(index.is_ready());
    assert_eq!(index.dimension(), Some(3));
    assert_eq!(index.len().unwrap(), 5);
}

#[test]
fn lance_cache_store_persists_vectors() {
    let tmp = TempDir::new().expect("tmp");
    let key = CacheKey { content_hash: "abc".into(), bucket: LanguageBucket::Code, model: "nomic-embed-text".into() };
    {
        let mut store = LanceCacheStore::open(tmp.path(), "embedding_cache").expect("open");
        assert!(store.is_empty());
        assert!(store.get(&key).unwrap().is_none());
        store.put(key.clone(), Arc::from(vec![0.5f32, -0.5])).unwrap();
    }
    let mut store = LanceCacheStore::open(tmp.path(), "embedding_cache").expect("reopen");
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&key).unwrap().as_deref(), Some(&[0.5f32, -0.5][..]));
    let other_bucket = CacheKey { bucket: LanguageBucket::Markup, ..key.clone() };
    assert!(store.get(&other_bucket).unwrap().is_none());
}

#[test]
fn lance_cache_store_is_model_aware_and_replaces_rows() {
    let tmp = TempDir::new().expect("tmp");
    let mut store = LanceCacheStore::open(tmp.path(), "embedding_cache").expect("open");
    let old = CacheKey { content_hash: "abc".into(), bucket: LanguageBucket::Code, model: "old-model".into() };
    let new = CacheKey { model: "new-model".into(), ..old.clone() };

    store.put(old.clone(), Arc::from(vec![1.0f32; 3])).unwrap();
    assert!(store.get(&new).unwrap().is_none(), "a vector from another model is never served");

    store.put(new.clone(), Arc::from(vec![0.25f32; 4])).unwrap();
    assert_eq!(store.len(), 1, "the old model's row is replaced, not kept alongside");
    assert!(store.get(&old).unwrap().is_none());
    assert_eq!(store.get(&new).unwrap().map(|v| v.len()), Some(4));
}
