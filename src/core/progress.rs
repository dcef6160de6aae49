use crate::utils::format::{format_count, percent};

/// How often a progress line is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportInterval {
    Records(u64),
    Batches(u64),
}

/// Tracks cumulative counts for one table and decides when to report.
#[derive(Debug)]
pub struct ProgressReporter {
    label: String,
    interval: ReportInterval,
    total: Option<u64>,
    last_bucket: u64,
    total_reported: bool,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, interval: ReportInterval) -> Self {
        Self {
            label: label.into(),
            interval,
            total: None,
            last_bucket: 0,
            total_reported: false,
        }
    }

    pub fn with_total(mut self, total: Option<u64>) -> Self {
        self.total = total;
        self
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Called after every committed batch. Returns the line to print when a
    /// reporting threshold was crossed, or when a known total was reached.
    pub fn observe(&mut self, written: u64, batches: u64) -> Option<String> {
        let bucket = match self.interval {
            ReportInterval::Records(n) => written / n.max(1),
            ReportInterval::Batches(m) => batches / m.max(1),
        };
        let crossed = bucket > self.last_bucket;
        self.last_bucket = self.last_bucket.max(bucket);

        let reached_total =
            !self.total_reported && self.total.is_some_and(|total| written >= total);
        if reached_total {
            self.total_reported = true;
        }

        (crossed || reached_total).then(|| self.line(written))
    }

    pub fn line(&self, written: u64) -> String {
        match self.total {
            Some(total) => format!(
                "   Exported {} / {} {} ({:.1}%)",
                format_count(written),
                format_count(total),
                self.label,
                percent(written, total)
            ),
            None => format!("   Imported {} {}...", format_count(written), self.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_total_reports_absolute_count_every_n_records() {
        let mut reporter = ProgressReporter::new("records", ReportInterval::Records(100));
        assert_eq!(reporter.observe(40, 1), None);
        assert_eq!(reporter.observe(80, 2), None);
        assert_eq!(
            reporter.observe(120, 3).as_deref(),
            Some("   Imported 120 records...")
        );
        assert_eq!(reporter.observe(160, 4), None);
        assert!(reporter.observe(200, 5).is_some());
    }

    #[test]
    fn test_known_total_reports_percentage_and_completion() {
        let mut reporter =
            ProgressReporter::new("products", ReportInterval::Records(50_000)).with_total(Some(120_000));
        assert_eq!(reporter.observe(10_000, 1), None);
        assert_eq!(
            reporter.observe(50_000, 5).as_deref(),
            Some("   Exported 50,000 / 120,000 products (41.7%)")
        );
        assert_eq!(reporter.observe(60_000, 6), None);
        assert_eq!(
            reporter.observe(120_000, 12).as_deref(),
            Some("   Exported 120,000 / 120,000 products (100.0%)")
        );
    }

    #[test]
    fn test_completion_is_reported_once() {
        let mut reporter =
            ProgressReporter::new("rows", ReportInterval::Records(1_000)).with_total(Some(10));
        assert!(reporter.observe(10, 1).is_some());
        assert!(reporter.observe(10, 2).is_none());
    }

    #[test]
    fn test_batch_interval() {
        let mut reporter = ProgressReporter::new("rows", ReportInterval::Batches(3));
        let emitted: Vec<bool> = (1..=7)
            .map(|b| reporter.observe(b * 10, b).is_some())
            .collect();
        assert_eq!(emitted, vec![false, false, true, false, false, true, false]);
    }
}
