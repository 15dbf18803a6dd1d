//! Sequential bulk operation runner.
//!
//! Bulk install and update run one package at a time, in order, awaiting
//! each operation before starting the next. A failure is recorded and the
//! run continues; nothing is retried. The report at the end distinguishes
//! how many succeeded out of how many were attempted.

use std::future::Future;

use tracing::{debug, warn};

/// Result of one item in a bulk run.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    pub slug: String,
    pub success: bool,
    /// Success detail or error text, for the summary listing.
    pub message: String,
}

/// Summary of an entire bulk run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub results: Vec<BulkItemResult>,
}

impl BulkReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.total() - self.success_count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Run `operation` over each slug strictly in sequence.
///
/// `on_item` is called before each operation starts, for progress display.
pub async fn run<F, Fut, P>(slugs: &[String], mut operation: F, mut on_item: P) -> BulkReport
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<String>>,
    P: FnMut(usize, &str),
{
    let mut report = BulkReport::default();

    for (index, slug) in slugs.iter().enumerate() {
        on_item(index, slug);
        debug!("bulk item {}/{}: {slug}", index + 1, slugs.len());

        match operation(slug.clone()).await {
            Ok(message) => report.results.push(BulkItemResult {
                slug: slug.clone(),
                success: true,
                message,
            }),
            Err(e) => {
                warn!("bulk item '{slug}' failed: {e:#}");
                report.results.push(BulkItemResult {
                    slug: slug.clone(),
                    success: false,
                    message: format!("{e:#}"),
                });
            }
        }
    }

    report
}
