use crate::domain::model::{Record, Value};

/// Coerce a record to exactly `arity` fields.
///
/// Short records are padded on the right with empty text, long records are
/// truncated from the right. Malformed rows are never rejected.
pub fn normalize(mut record: Record, arity: usize) -> Record {
    record.fields.resize(arity, Value::empty());
    record
}
