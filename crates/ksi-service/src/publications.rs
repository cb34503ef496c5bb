//! Cached publications file snapshots.
//!
//! Verifications share an `Arc<PublicationsFile>`. A refresh fetches a new
//! file and swaps the pointer, so a verification already holding a snapshot
//! never sees a partial update.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ksi_core::PublicationsFile;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::traits::PublicationSource;

struct Snapshot {
    file: Arc<PublicationsFile>,
    fetched_at: Instant,
}

/// Serves the current publications file, refetching once it is too old.
pub struct PublicationsHandler {
    source: Arc<dyn PublicationSource>,
    max_age: Duration,
    current: RwLock<Option<Snapshot>>,
}

impl PublicationsHandler {
    pub fn new(source: Arc<dyn PublicationSource>, max_age: Duration) -> Self {
        Self {
            source,
            max_age,
            current: RwLock::new(None),
        }
    }

    /// The cached snapshot if still fresh, otherwise a newly fetched one.
    ///
    /// When the refetch fails, a stale snapshot is still served; the error
    /// is returned only if nothing was ever fetched.
    pub fn get(&self) -> Result<Arc<PublicationsFile>> {
        let stale = match self.current.read().as_ref() {
            Some(snapshot) if snapshot.fetched_at.elapsed() < self.max_age => {
                return Ok(Arc::clone(&snapshot.file));
            }
            Some(snapshot) => {
                debug!(age = ?snapshot.fetched_at.elapsed(), "publications file expired");
                Some(Arc::clone(&snapshot.file))
            }
            None => None,
        };

        match (self.refresh(), stale) {
            (Ok(file), _) => Ok(file),
            (Err(e), Some(file)) => {
                warn!(error = %e, "serving stale publications file");
                Ok(file)
            }
            (Err(e), None) => Err(e),
        }
    }

    /// Fetch unconditionally and replace the cached snapshot.
    ///
    /// On failure the previous snapshot stays cached.
    pub fn refresh(&self) -> Result<Arc<PublicationsFile>> {
        let file = match self.source.fetch() {
            Ok(file) => Arc::new(file),
            Err(e) => {
                warn!(error = %e, "publications file fetch failed");
                return Err(e);
            }
        };

        info!(
            records = file.records().len(),
            latest = file.latest().map(|r| r.publication_time()),
            "publications file refreshed"
        );

        *self.current.write() = Some(Snapshot {
            file: Arc::clone(&file),
            fetched_at: Instant::now(),
        });
        Ok(file)
    }

    /// The cached snapshot regardless of age, without fetching.
    pub fn cached(&self) -> Option<Arc<PublicationsFile>> {
        self.current.read().as_ref().map(|s| Arc::clone(&s.file))
    }
}

impl std::fmt::Debug for PublicationsHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicationsHandler")
            .field("max_age", &self.max_age)
            .field("cached", &self.current.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailingService, MemoryPublicationSource};
    use ksi_core::{HashAlgorithm, PublicationData, PublicationRecord};

    fn file(times: &[u64]) -> PublicationsFile {
        let records = times
            .iter()
            .map(|&t| {
                let hash = HashAlgorithm::Sha2_256.digest(&t.to_be_bytes()).unwrap();
                PublicationRecord::new(PublicationData::new(t, hash))
            })
            .collect();
        PublicationsFile::new(records, vec![], 0)
    }

    #[test]
    fn test_snapshot_is_reused_while_fresh() {
        let source = Arc::new(MemoryPublicationSource::new(file(&[100])));
        let handler = PublicationsHandler::new(source.clone(), Duration::from_secs(3600));

        let first = handler.get().unwrap();
        let second = handler.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetch_count(), 1);
    }

    #[test]
    fn test_refresh_swaps_without_touching_old_snapshot() {
        let source = Arc::new(MemoryPublicationSource::new(file(&[100])));
        let handler = PublicationsHandler::new(source.clone(), Duration::ZERO);

        let old = handler.get().unwrap();
        source.set(file(&[100, 200]));
        let new = handler.get().unwrap();

        assert_eq!(old.records().len(), 1);
        assert_eq!(new.records().len(), 2);
        assert_eq!(source.fetch_count(), 2);
    }

    #[test]
    fn test_failed_refresh_keeps_cache() {
        let source = Arc::new(MemoryPublicationSource::new(file(&[100])));
        let handler = PublicationsHandler::new(source.clone(), Duration::ZERO);
        let before = handler.get().unwrap();

        source.set_unavailable(true);
        assert!(handler.refresh().is_err());
        let cached = handler.cached().unwrap();
        assert!(Arc::ptr_eq(&before, &cached));
    }

    #[test]
    fn test_stale_snapshot_served_when_refetch_fails() {
        let source = Arc::new(MemoryPublicationSource::new(file(&[100])));
        let handler = PublicationsHandler::new(source.clone(), Duration::ZERO);
        let before = handler.get().unwrap();

        source.set_unavailable(true);
        let served = handler.get().unwrap();
        assert!(Arc::ptr_eq(&before, &served));
        assert_eq!(source.fetch_count(), 2);

        source.set_unavailable(false);
        source.set(file(&[100, 200]));
        assert_eq!(handler.get().unwrap().records().len(), 2);
    }

    #[test]
    fn test_unreachable_source() {
        let handler = PublicationsHandler::new(
            Arc::new(FailingService::transport("connection refused")),
            Duration::from_secs(60),
        );
        assert!(handler.get().is_err());
        assert!(handler.cached().is_none());
    }
}
