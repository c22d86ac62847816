use crate::checkpoint::CheckpointStore;
use crate::data::Dataset;
use crate::error::CrawlerError;
use crate::extract::PageExtract;
use crate::fetch::Fetch;
use crate::review::CourseReviewer;
use futures::stream::{self, StreamExt};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Courses between checkpoint snapshots.
    pub checkpoint_interval: usize,
    /// Courses in flight at once. Results are merged in course order either
    /// way, so the resume cursor stays exact.
    pub workers: usize,
}

impl Default for CrawlConfig {
    fn default() -> CrawlConfig {
        CrawlConfig {
            checkpoint_interval: 1000,
            workers: 1,
        }
    }
}

/// Drives the course reviewer over a fixed, ordered course list, merging
/// results into the dataset and checkpointing so an interrupted run resumes
/// where it left off. Per-course failures never reach this level - every
/// course call returns whatever it collected.
pub struct Orchestrator<F, E, S> {
    reviewer: CourseReviewer<F, E>,
    store: S,
    config: CrawlConfig,
}

impl<F, E, S> Orchestrator<F, E, S>
where
    F: Fetch,
    E: PageExtract,
    S: CheckpointStore,
{
    pub fn new(reviewer: CourseReviewer<F, E>, store: S, config: CrawlConfig) -> Self {
        Orchestrator {
            reviewer,
            store,
            config,
        }
    }

    /// `courses` must be in the same order on every run against the same
    /// checkpoint; the cursor is positional.
    pub async fn run(&self, courses: &[String]) -> Result<Dataset, CrawlerError> {
        let (mut dataset, start) = match self.store.load().await? {
            Some(checkpoint) => {
                let start = checkpoint.cursor.min(courses.len());
                info!(
                    "Resuming from checkpoint: {} records, {} of {} courses done",
                    checkpoint.records.len(),
                    start,
                    courses.len()
                );
                (Dataset::from_records(checkpoint.records), start)
            }
            None => (Dataset::default(), 0),
        };

        let interval = self.config.checkpoint_interval.max(1);
        let workers = self.config.workers.max(1);

        let results = stream::iter(&courses[start..])
            .map(|course| async move {
                let records = self.reviewer.review_course(course).await;
                (course, records)
            })
            .buffered(workers);
        futures::pin_mut!(results);

        let mut processed = 0;
        while let Some((course, records)) = results.next().await {
            let inserted = dataset.merge(records);
            processed += 1;
            info!(
                "[{}/{}] {}: {} new records ({} total)",
                start + processed,
                courses.len(),
                course,
                inserted,
                dataset.len()
            );
            if processed % interval == 0 {
                self.store
                    .save(start + processed, dataset.records())
                    .await?;
                info!("Checkpoint written at course {}", start + processed);
            }
        }

        // The merge path already drops full-row duplicates, so the final
        // dataset is dedup-complete; persist it once more and hand it back.
        self.store.save(start + processed, dataset.records()).await?;
        Ok(dataset)
    }
}
