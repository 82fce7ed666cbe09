use std::path::PathBuf;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{Index, IndexWriter, TantivyDocument, Term};
use tracing::{debug, info, warn};

use codesearch_core::types::{IndexedPoint, LanguageBucket, PointPayload, ScoredPoint};
use codesearch_core::{Error, Result};

use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 50_000_000;

struct Fields {
	id: Field,
	text: Field,
	source: Field,
	lang: Field,
	file: Field,
	start_line: Field,
	end_line: Field,
}

/// BM25 keyword index over chunk text.
///
/// Built either on disk (`in_dir`) or in RAM. Nothing is searchable until
/// the first `reset`.
pub struct TantivyKeywordIndex {
	dir: Option<PathBuf>,
	index: Option<Index>,
	fields: Fields,
}

impl TantivyKeywordIndex {
	pub fn in_dir(dir: PathBuf) -> Result<Self> { Self::with_location(Some(dir)) }

	pub fn in_ram() -> Result<Self> { Self::with_location(None) }

	fn with_location(dir: Option<PathBuf>) -> Result<Self> {
		let schema = build_schema();
		let field = |name: &str| schema.get_field(name).map_err(Error::backend);
		let fields = Fields {
			id: field("id")?,
			text: field("text")?,
			source: field("source")?,
			lang: field("lang")?,
			file: field("file")?,
			start_line: field("start_line")?,
			end_line: field("end_line")?,
		};
		let mut this = Self { dir, index: None, fields };
		if let Some(dir) = &this.dir {
			if dir.join("meta.json").exists() {
				let index = Index::open_in_dir(dir).map_err(Error::backend)?;
				register_tokenizer(&index);
				this.index = Some(index);
			}
		}
		Ok(this)
	}

	pub fn is_ready(&self) -> bool { self.index.is_some() }

	/// Drop every document and start from an empty index.
	pub fn reset(&mut self) -> Result<()> {
		let schema = build_schema();
		let index = match &self.dir {
			Some(dir) => {
				if dir.exists() { std::fs::remove_dir_all(dir)?; }
				std::fs::create_dir_all(dir)?;
				Index::create_in_dir(dir, schema).map_err(Error::backend)?
			}
			None => Index::create_in_ram(schema),
		};
		register_tokenizer(&index);
		self.index = Some(index);
		info!(dir = ?self.dir, "keyword index reset");
		Ok(())
	}

	fn index(&self) -> Result<&Index> {
		self.index.as_ref().ok_or_else(|| Error::IndexNotReady("keyword index has not been built".into()))
	}

	/// Add points, replacing any earlier document with the same id.
	pub fn index_points(&self, points: &[IndexedPoint]) -> Result<()> {
		let index = self.index()?;
		let mut writer: IndexWriter = index.writer(WRITER_HEAP_BYTES).map_err(Error::backend)?;
		for p in points {
			writer.delete_term(Term::from_field_u64(self.fields.id, p.id));
			writer.add_document(self.to_document(p)).map_err(Error::backend)?;
		}
		writer.commit().map_err(Error::backend)?;
		debug!(points = points.len(), "keyword index committed");
		Ok(())
	}

	fn to_document(&self, p: &IndexedPoint) -> TantivyDocument {
		let f = &self.fields;
		let mut doc = TantivyDocument::default();
		doc.add_u64(f.id, p.id);
		doc.add_text(f.text, &p.payload.text);
		doc.add_text(f.source, &p.payload.source);
		doc.add_text(f.lang, p.payload.lang.as_str());
		if let Some(file) = &p.payload.file { doc.add_text(f.file, file); }
		doc.add_u64(f.start_line, p.payload.start_line as u64);
		doc.add_u64(f.end_line, p.payload.end_line as u64);
		doc
	}

	/// Top `k` documents by BM25. Query syntax errors are tolerated: the
	/// parseable part of the query is used.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPoint>> {
		let index = self.index()?;
		if k == 0 { return Ok(Vec::new()); }
		let reader = index.reader().map_err(Error::backend)?;
		let searcher = reader.searcher();
		let qp = QueryParser::for_index(index, vec![self.fields.text]);
		let (q, errors) = qp.parse_query_lenient(query);
		if !errors.is_empty() { warn!(query, errors = errors.len(), "keyword query parsed leniently"); }
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k)).map_err(Error::backend)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(Error::backend)?;
			hits.push(self.to_scored_point(&doc, score)?);
		}
		Ok(hits)
	}

	fn to_scored_point(&self, doc: &TantivyDocument, score: f32) -> Result<ScoredPoint> {
		let f = &self.fields;
		let text_of = |field: Field| doc.get_first(field).and_then(|v| v.as_str()).map(str::to_string);
		let u64_of = |field: Field| doc.get_first(field).and_then(|v| v.as_u64());
		let id = u64_of(f.id).ok_or_else(|| Error::Backend("stored document has no id".into()))?;
		let lang: LanguageBucket = text_of(f.lang).unwrap_or_default().parse().map_err(Error::Backend)?;
		Ok(ScoredPoint {
			id,
			score,
			payload: PointPayload {
				text: text_of(f.text).unwrap_or_default(),
				source: text_of(f.source).unwrap_or_default(),
				lang,
				file: text_of(f.file),
				start_line: u64_of(f.start_line).unwrap_or_default() as usize,
				end_line: u64_of(f.end_line).unwrap_or_default() as usize,
			},
		})
	}
}
