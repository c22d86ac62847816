use crate::data::{self, ReviewRecord};
use crate::error::CrawlerError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable snapshot of crawl progress. `cursor` is the number of courses
/// fully processed from the front of the fixed course order; unlike deriving
/// it from distinct course codes, it stays correct when a course legitimately
/// produced zero reviews.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    pub cursor: usize,
    pub records: Vec<ReviewRecord>,
}

#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Reads the last snapshot, if any. Called once at startup.
    async fn load(&self) -> Result<Option<Checkpoint>, CrawlerError>;

    /// Full-overwrite snapshot. Must be atomic with respect to a concurrent
    /// load on restart - a torn read would corrupt resume.
    async fn save(&self, cursor: usize, records: &[ReviewRecord]) -> Result<(), CrawlerError>;
}

#[async_trait::async_trait]
impl<S: CheckpointStore + ?Sized> CheckpointStore for std::sync::Arc<S> {
    async fn load(&self) -> Result<Option<Checkpoint>, CrawlerError> {
        (**self).load().await
    }

    async fn save(&self, cursor: usize, records: &[ReviewRecord]) -> Result<(), CrawlerError> {
        (**self).save(cursor, records).await
    }
}

/// Checkpoint on disk: the records as a CSV file plus a sibling `.cursor`
/// file holding the course index. Both are written to a temp path and
/// renamed into place, so a reader never observes a partial write. The
/// records file goes first; a crash between the two renames leaves a stale
/// smaller cursor, which merely re-processes courses whose rows then fall to
/// merge dedup.
pub struct CsvCheckpointStore {
    records_path: PathBuf,
    cursor_path: PathBuf,
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    os.into()
}

impl CsvCheckpointStore {
    pub fn new(records_path: impl Into<PathBuf>) -> CsvCheckpointStore {
        let records_path = records_path.into();
        let cursor_path = {
            let mut os = records_path.as_os_str().to_os_string();
            os.push(".cursor");
            os.into()
        };
        CsvCheckpointStore {
            records_path,
            cursor_path,
        }
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), CrawlerError> {
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CheckpointStore for CsvCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, CrawlerError> {
        let bytes = match tokio::fs::read(&self.records_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.records_path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let records = data::read_csv(bytes.as_slice())?;

        let cursor = match tokio::fs::read_to_string(&self.cursor_path).await {
            Ok(contents) => contents.trim().parse().map_err(|_| {
                CrawlerError::Field(format!("cursor file {:?}", contents.trim()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Recovery path for a hand-made checkpoint: fall back to the
                // distinct-course heuristic, which cannot tell a zero-review
                // course from an unattempted one.
                let courses: BTreeSet<&str> =
                    records.iter().map(|r| r.course_code.as_str()).collect();
                warn!(
                    "No cursor file beside {}; assuming {} distinct courses processed",
                    self.records_path.display(),
                    courses.len()
                );
                courses.len()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Some(Checkpoint { cursor, records }))
    }

    async fn save(&self, cursor: usize, records: &[ReviewRecord]) -> Result<(), CrawlerError> {
        let mut buf = vec![];
        data::write_csv(&mut buf, records)?;
        self.write_atomic(&self.records_path, &buf).await?;
        self.write_atomic(&self.cursor_path, cursor.to_string().as_bytes())
            .await?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    inner: tokio::sync::Mutex<Option<Checkpoint>>,
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, CrawlerError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, cursor: usize, records: &[ReviewRecord]) -> Result<(), CrawlerError> {
        *self.inner.lock().await = Some(Checkpoint {
            cursor,
            records: records.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::record;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn missing_checkpoint_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvCheckpointStore::new(dir.path().join("progress.csv"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips_records_and_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvCheckpointStore::new(dir.path().join("progress.csv"));
        let records = vec![record("com-sci-35l", "great"), record("stats-100a", "ok")];

        store.save(7, &records).await.unwrap();
        let checkpoint = store.load().await.unwrap().unwrap();
        assert_eq!(checkpoint.cursor, 7);
        assert_eq!(checkpoint.records, records);

        // overwrite snapshot, not append
        store.save(9, &records[..1]).await.unwrap();
        let checkpoint = store.load().await.unwrap().unwrap();
        assert_eq!(checkpoint.cursor, 9);
        assert_eq!(checkpoint.records, records[..1]);
    }

    #[tokio::test]
    async fn missing_cursor_falls_back_to_distinct_course_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.csv");
        let store = CsvCheckpointStore::new(path.clone());
        let records = vec![
            record("com-sci-35l", "great"),
            record("com-sci-35l", "hard"),
            record("stats-100a", "ok"),
        ];
        store.save(3, &records).await.unwrap();
        tokio::fs::remove_file(path.with_extension("csv.cursor"))
            .await
            .unwrap();

        let checkpoint = store.load().await.unwrap().unwrap();
        assert_eq!(checkpoint.cursor, 2);
    }
}
