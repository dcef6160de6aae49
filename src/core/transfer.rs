use crate::core::normalize::normalize;
use crate::core::progress::ProgressReporter;
use crate::domain::model::{Batch, TransferStats};
use crate::domain::ports::{RecordSink, RecordSource};
use crate::utils::error::{EtlError, Result};
use std::time::Instant;

/// The chunked transfer loop shared by every pipeline.
///
/// Pulls up to `batch_size` records, normalizes them to the table arity,
/// commits them through the sink and repeats until the source yields an
/// empty batch. Any error aborts the whole transfer.
#[derive(Debug, Clone)]
pub struct BatchTransfer {
    table: String,
    arity: usize,
    batch_size: usize,
}

impl BatchTransfer {
    pub fn new(table: impl Into<String>, arity: usize, batch_size: usize) -> Self {
        Self {
            table: table.into(),
            arity,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn run<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        reporter: &mut ProgressReporter,
    ) -> Result<TransferStats>
    where
        S: RecordSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        let started = Instant::now();
        let mut stats = TransferStats::default();

        loop {
            let raw = source.next_batch(self.batch_size).await.inspect_err(|e| {
                tracing::error!(
                    "❌ Reading '{}' failed after {} records: {}",
                    self.table,
                    stats.records_written,
                    e
                );
            })?;
            if raw.is_empty() {
                break;
            }
            stats.records_read += raw.len() as u64;

            let batch = Batch::new(
                raw.records
                    .into_iter()
                    .map(|record| normalize(record, self.arity))
                    .collect(),
            );

            let written = sink.commit_batch(&batch).await.map_err(|e| {
                tracing::error!(
                    "❌ Writing '{}' failed after {} records: {}",
                    self.table,
                    stats.records_written,
                    e
                );
                EtlError::TransferError {
                    table: self.table.clone(),
                    written: stats.records_written,
                    message: e.to_string(),
                }
            })?;
            stats.records_written += written;
            stats.batches += 1;

            tracing::debug!(
                "Committed batch {} of '{}' ({} records, {} total)",
                stats.batches,
                self.table,
                written,
                stats.records_written
            );

            if let Some(line) = reporter.observe(stats.records_written, stats.batches) {
                println!("{}", line);
            }
        }

        stats.elapsed = started.elapsed();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::ReportInterval;
    use crate::domain::model::{Record, Value};
    use async_trait::async_trait;

    struct VecSource {
        records: std::vec::IntoIter<Record>,
        pulls: usize,
    }

    impl VecSource {
        fn new(records: Vec<Record>) -> Self {
            Self {
                records: records.into_iter(),
                pulls: 0,
            }
        }

        fn numbered(count: usize) -> Self {
            Self::new(
                (0..count)
                    .map(|i| Record::new(vec![Value::Text(i.to_string())]))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl RecordSource for VecSource {
        async fn next_batch(&mut self, max: usize) -> Result<Batch> {
            self.pulls += 1;
            Ok(Batch::new(self.records.by_ref().take(max).collect()))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        batches: Vec<Batch>,
        fail_on_batch: Option<usize>,
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn commit_batch(&mut self, batch: &Batch) -> Result<u64> {
            if self.fail_on_batch == Some(self.batches.len() + 1) {
                return Err(EtlError::ConfigError {
                    message: "disk full".to_string(),
                });
            }
            self.batches.push(batch.clone());
            Ok(batch.len() as u64)
        }
    }

    fn reporter() -> ProgressReporter {
        ProgressReporter::new("records", ReportInterval::Records(1_000_000))
    }

    #[tokio::test]
    async fn test_three_full_batches_and_one_partial() {
        let batch_size = 10;
        let mut source = VecSource::numbered(batch_size * 3 + 7);
        let mut sink = MemorySink::default();

        let stats = BatchTransfer::new("t", 1, batch_size)
            .run(&mut source, &mut sink, &mut reporter())
            .await
            .unwrap();

        assert_eq!(stats.batches, 4);
        let sizes: Vec<usize> = sink.batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![10, 10, 10, 7]);
        // 第五次讀取回傳空批次後結束
        assert_eq!(source.pulls, 5);
    }

    #[tokio::test]
    async fn test_written_counts_sum_to_total_for_any_batch_size() {
        for batch_size in [1, 2, 3, 7, 64, 1000] {
            let mut source = VecSource::numbered(101);
            let mut sink = MemorySink::default();

            let stats = BatchTransfer::new("t", 1, batch_size)
                .run(&mut source, &mut sink, &mut reporter())
                .await
                .unwrap();

            let committed: usize = sink.batches.iter().map(Batch::len).sum();
            assert_eq!(committed, 101, "batch_size={}", batch_size);
            assert_eq!(stats.records_written, 101);
            assert_eq!(stats.records_read, 101);
            assert!(sink.batches.iter().all(|b| b.len() <= batch_size));
        }
    }

    #[tokio::test]
    async fn test_every_committed_record_has_schema_arity() {
        let ragged = vec![
            ["A", "B"].into_iter().collect(),
            ["A", "B", "C", "D", "E"].into_iter().collect(),
            Record::default(),
            ["1", "2", "3", "4"].into_iter().collect(),
        ];
        let mut source = VecSource::new(ragged);
        let mut sink = MemorySink::default();

        BatchTransfer::new("t", 4, 3)
            .run(&mut source, &mut sink, &mut reporter())
            .await
            .unwrap();

        let written: Vec<&Record> = sink.batches.iter().flat_map(|b| &b.records).collect();
        assert_eq!(written.len(), 4);
        assert!(written.iter().all(|r| r.arity() == 4));
        assert_eq!(*written[0], ["A", "B", "", ""].into_iter().collect::<Record>());
        assert_eq!(*written[1], ["A", "B", "C", "D"].into_iter().collect::<Record>());
    }

    #[tokio::test]
    async fn test_sink_failure_aborts_the_run() {
        let mut source = VecSource::numbered(50);
        let mut sink = MemorySink {
            fail_on_batch: Some(2),
            ..Default::default()
        };

        let err = BatchTransfer::new("products", 1, 10)
            .run(&mut source, &mut sink, &mut reporter())
            .await
            .unwrap_err();

        match err {
            EtlError::TransferError { table, written, .. } => {
                assert_eq!(table, "products");
                assert_eq!(written, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(source.pulls, 2);
    }

    #[tokio::test]
    async fn test_empty_source_commits_nothing() {
        let mut source = VecSource::new(Vec::new());
        let mut sink = MemorySink::default();

        let stats = BatchTransfer::new("t", 3, 10)
            .run(&mut source, &mut sink, &mut reporter())
            .await
            .unwrap();

        assert_eq!(stats.batches, 0);
        assert_eq!(stats.records_written, 0);
        assert!(sink.batches.is_empty());
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        assert_eq!(BatchTransfer::new("t", 1, 0).batch_size(), 1);
    }
}
