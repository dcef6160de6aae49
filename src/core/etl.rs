use crate::core::Pipeline;
use crate::domain::model::RunSummary;
use crate::utils::error::Result;
use crate::utils::format::{bytes_to_mb, format_count, format_duration};
use crate::utils::monitor::SystemMonitor;
use chrono::Local;
use std::time::{Duration, Instant};

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let started_at = Local::now();
        let start = Instant::now();

        println!("🚀 {}", self.pipeline.name());
        println!("{}", "=".repeat(40));
        println!("📁 Database: {}", self.pipeline.destination().display());

        // 先檢查前置條件，失敗時目的地完全不會被動到
        self.pipeline.check_preconditions().await?;
        self.monitor.log_stats("Preconditions");

        let tables = self.pipeline.execute().await?;
        self.monitor.log_stats("Transfer");

        // execute() 結束時連線已關閉，WAL 已併回主檔
        let destination = self.pipeline.destination().to_path_buf();
        let destination_size_bytes = std::fs::metadata(&destination).ok().map(|m| m.len());

        let summary = RunSummary {
            pipeline: self.pipeline.name().to_string(),
            started_at,
            elapsed_ms: start.elapsed().as_millis(),
            destination,
            destination_size_bytes,
            tables,
        };

        for line in render_summary(&summary) {
            println!("{}", line);
        }
        tracing::debug!("Run summary: {}", serde_json::to_string(&summary)?);
        self.monitor.log_final_stats();

        Ok(summary)
    }
}

pub fn render_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "=".repeat(50),
        "📊 TRANSFER COMPLETED".to_string(),
        "=".repeat(50),
        format!(
            "⏱️  Duration: {}",
            format_duration(Duration::from_millis(summary.elapsed_ms as u64))
        ),
    ];

    for table in &summary.tables {
        lines.push(format!(
            "📊 {}: {} records written, {} rows in table",
            table.table,
            format_count(table.stats.records_written),
            format_count(table.rows_in_table)
        ));
    }
    if summary.tables.len() > 1 {
        lines.push(format!(
            "📊 Total records: {}",
            format_count(summary.total_written())
        ));
    }

    match summary.destination_size_bytes {
        Some(bytes) => lines.push(format!("💾 Database size: {:.1} MB", bytes_to_mb(bytes))),
        None => lines.push("💾 Database size: unknown".to_string()),
    }
    lines.push(format!("📁 File: {}", summary.destination.display()));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{TableReport, TransferStats};
    use crate::utils::error::EtlError;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};

    struct StubPipeline {
        destination: PathBuf,
        precondition_fails: bool,
        executed: bool,
    }

    #[async_trait]
    impl Pipeline for StubPipeline {
        fn name(&self) -> &str {
            "Stub Import"
        }

        fn destination(&self) -> &Path {
            &self.destination
        }

        async fn check_preconditions(&mut self) -> Result<()> {
            if self.precondition_fails {
                return Err(EtlError::SourceNotFound {
                    path: PathBuf::from("missing.tsv"),
                });
            }
            Ok(())
        }

        async fn execute(&mut self) -> Result<Vec<TableReport>> {
            self.executed = true;
            Ok(vec![report("products", 3), report("ingredients", 2)])
        }
    }

    fn report(table: &str, n: u64) -> TableReport {
        TableReport {
            table: table.to_string(),
            stats: TransferStats {
                records_read: n,
                records_written: n,
                batches: 1,
                ..Default::default()
            },
            rows_in_table: n,
        }
    }

    #[tokio::test]
    async fn test_run_builds_summary() {
        let mut engine = EtlEngine::new(StubPipeline {
            destination: PathBuf::from("does-not-exist.db"),
            precondition_fails: false,
            executed: false,
        });

        let summary = engine.run().await.unwrap();
        assert_eq!(summary.total_written(), 5);
        assert_eq!(summary.destination_size_bytes, None);

        let lines = render_summary(&summary);
        assert!(lines.iter().any(|l| l == "📊 Total records: 5"));
        assert!(lines.iter().any(|l| l.contains("Database size: unknown")));
    }

    #[tokio::test]
    async fn test_precondition_failure_skips_execute() {
        let mut engine = EtlEngine::new(StubPipeline {
            destination: PathBuf::from("off-database.db"),
            precondition_fails: true,
            executed: false,
        });

        assert!(engine.run().await.is_err());
        assert!(!engine.pipeline.executed);
    }
}
