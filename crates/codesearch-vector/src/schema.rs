use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use std::sync::Arc;

pub fn build_points_schema(dimension: usize) -> SchemaRef {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::UInt64, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("lang", DataType::Utf8, false),
		Field::new("file", DataType::Utf8, true),
		Field::new("start_line", DataType::UInt64, false),
		Field::new("end_line", DataType::UInt64, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension as i32), true),
	]))
}

/// Cache vectors are variable-length lists since one table serves every model.
pub fn build_cache_schema() -> SchemaRef {
	Arc::new(Schema::new(vec![
		Field::new("content_hash", DataType::Utf8, false),
		Field::new("bucket", DataType::Utf8, false),
		Field::new("model", DataType::Utf8, false),
		Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
		Field::new("vector", DataType::List(Arc::new(Field::new("item", DataType::Float32, true))), false),
	]))
}

/// Width of the `vector` column of a points table.
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
	match schema.field_with_name("vector").ok()?.data_type() {
		DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
		_ => None,
	}
}
