pub mod etl;
pub mod normalize;
pub mod progress;
pub mod transfer;

pub use crate::domain::model::{Batch, Record, TableReport, TableSchema, TransferStats, Value};
pub use crate::domain::ports::{Pipeline, RecordSink, RecordSource};
pub use crate::utils::error::Result;
