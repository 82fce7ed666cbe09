use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, INDEXED, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use tantivy::Index;

pub const CODE_TOKENIZER: &str = "code";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _id_field = schema_builder.add_u64_field("id", INDEXED | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(CODE_TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	let _text_field = schema_builder.add_text_field("text", text_options);
	let _source_field = schema_builder.add_text_field("source", STRING | STORED);
	let _lang_field = schema_builder.add_text_field("lang", STRING | STORED);
	let _file_field = schema_builder.add_text_field("file", STRING | STORED);
	let _start_field = schema_builder.add_u64_field("start_line", STORED);
	let _end_field = schema_builder.add_u64_field("end_line", STORED);
	schema_builder.build()
}

/// Lowercased alphanumeric tokens, no stop words.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(80))
		.filter(LowerCaser)
		.build();
	index.tokenizers().register(CODE_TOKENIZER, tokenizer);
}
