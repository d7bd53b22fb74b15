pub mod download;
pub mod importer;
pub mod parser;

use crate::app_state::models::AppState;
use crate::db::postgres::models::instrument::Instrument;
use crate::db::postgres::repository::{
    candle_repository::TraitCandleRepository, instrument_repository::TraitInstrumentRepository,
    partition_repository::TraitPartitionRepository,
};
use crate::services::ServiceError;
use crate::services::candles::gate::RateGate;
use download::ArchiveSource;
use importer::{ImportSummary, import_archive};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download of {figi} {year} failed after {attempts} attempts: {reason}")]
    Download {
        figi: String,
        year: i32,
        attempts: u32,
        reason: String,
    },

    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("download cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveRunSummary {
    pub instruments: usize,
    pub years: usize,
    pub failed_years: usize,
    pub candles: usize,
}

/// Bulk history import from the yearly minute-candle archives.
pub struct ArchiveLoader {
    source: Arc<dyn ArchiveSource + Send + Sync>,
    candles: Arc<dyn TraitCandleRepository + Send + Sync>,
    partitions: Arc<dyn TraitPartitionRepository + Send + Sync>,
    instruments: Arc<dyn TraitInstrumentRepository + Send + Sync>,
    gate: Arc<dyn RateGate + Send + Sync>,
    cancel: CancellationToken,
}

impl ArchiveLoader {
    pub fn new(
        source: Arc<dyn ArchiveSource + Send + Sync>,
        candles: Arc<dyn TraitCandleRepository + Send + Sync>,
        partitions: Arc<dyn TraitPartitionRepository + Send + Sync>,
        instruments: Arc<dyn TraitInstrumentRepository + Send + Sync>,
        gate: Arc<dyn RateGate + Send + Sync>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            candles,
            partitions,
            instruments,
            gate,
            cancel,
        }
    }

    pub fn from_app_state(
        app_state: &AppState,
        source: Arc<dyn ArchiveSource + Send + Sync>,
    ) -> Self {
        let postgres = &app_state.postgres_service;
        Self::new(
            source,
            postgres.repository_candle.clone(),
            postgres.repository_partition.clone(),
            postgres.repository_instrument.clone(),
            app_state.rate_gate.clone(),
            app_state.cancel.clone(),
        )
    }

    /// Импортирует архивы за годы `start_year..=end_year` для всех включённых инструментов
    pub async fn run_all(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> Result<ArchiveRunSummary, ServiceError> {
        let instruments = self.instruments.list_instruments(true).await?;
        info!(
            "Importing archives {}..={} for {} instruments",
            start_year,
            end_year,
            instruments.len()
        );

        let mut summary = ArchiveRunSummary::default();
        for instrument in &instruments {
            match self
                .load_instrument(instrument, start_year, end_year, &mut summary)
                .await
            {
                Ok(()) => summary.instruments += 1,
                Err(ServiceError::Cancelled) => {
                    warn!("Archive import cancelled at {}", instrument.figi);
                    break;
                }
                Err(e) => error!("Archive import failed for {}: {}", instrument.figi, e),
            }
        }

        info!(
            "Archive import finished: {} instruments, {} years, {} failed years, {} candles",
            summary.instruments, summary.years, summary.failed_years, summary.candles
        );
        Ok(summary)
    }

    async fn load_instrument(
        &self,
        instrument: &Instrument,
        start_year: i32,
        end_year: i32,
        summary: &mut ArchiveRunSummary,
    ) -> Result<(), ServiceError> {
        for year in start_year..=end_year {
            if self.cancel.is_cancelled() {
                return Err(ServiceError::Cancelled);
            }

            match self.load_year(&instrument.figi, year).await {
                Ok(written) => {
                    summary.years += 1;
                    summary.candles += written;
                }
                Err(ServiceError::Cancelled) => return Err(ServiceError::Cancelled),
                Err(e) => {
                    // Ошибка за один год не останавливает загрузку следующих
                    error!("Archive {} {} failed: {}", instrument.figi, year, e);
                    summary.failed_years += 1;
                }
            }
        }
        Ok(())
    }

    async fn load_year(&self, figi: &str, year: i32) -> Result<usize, ServiceError> {
        self.partitions.create_partitions_for_year(year).await?;

        self.gate.wait().await;
        let path = match self.source.fetch_year(figi, year).await {
            Ok(Some(path)) => path,
            Ok(None) => return Ok(0),
            Err(ArchiveError::Cancelled) => return Err(ServiceError::Cancelled),
            Err(e) => return Err(e.into()),
        };

        let imported = self.import_file(&path, figi).await;
        // Архив удаляется и после неудачного импорта
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
        Ok(imported?.written)
    }

    async fn import_file(&self, path: &Path, figi: &str) -> Result<ImportSummary, ServiceError> {
        let file = File::open(path).map_err(ArchiveError::from)?;
        let summary = import_archive(BufReader::new(file), figi, self.candles.as_ref()).await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::candles::gate::IntervalGate;
    use crate::testing::{MemoryStore, share};
    use async_trait::async_trait;
    use importer::tests::build_zip;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves archives by writing them into a per-test directory.
    struct FakeSource {
        dir: PathBuf,
        archives: HashMap<(String, i32), Vec<u8>>,
        failing_years: Vec<i32>,
        requests: Mutex<Vec<(String, i32)>>,
        written: Mutex<Vec<PathBuf>>,
    }

    impl FakeSource {
        fn new(test_name: &str) -> Self {
            let dir = std::env::temp_dir()
                .join(format!("market-loader-test-{}-{}", std::process::id(), test_name));
            std::fs::create_dir_all(&dir).unwrap();
            Self {
                dir,
                archives: HashMap::new(),
                failing_years: Vec::new(),
                requests: Mutex::new(Vec::new()),
                written: Mutex::new(Vec::new()),
            }
        }

        fn written(&self) -> Vec<PathBuf> {
            self.written.lock().unwrap().clone()
        }
    }

    impl Drop for FakeSource {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[async_trait]
    impl ArchiveSource for FakeSource {
        async fn fetch_year(&self, figi: &str, year: i32) -> Result<Option<PathBuf>, ArchiveError> {
            self.requests.lock().unwrap().push((figi.to_string(), year));
            if self.failing_years.contains(&year) {
                return Err(ArchiveError::Download {
                    figi: figi.to_string(),
                    year,
                    attempts: 3,
                    reason: "HTTP 500".to_string(),
                });
            }
            let Some(bytes) = self.archives.get(&(figi.to_string(), year)) else {
                return Ok(None);
            };
            let path = self.dir.join(format!("{}_{}.zip", figi, year));
            std::fs::write(&path, bytes)?;
            self.written.lock().unwrap().push(path.clone());
            Ok(Some(path))
        }
    }

    fn archive_loader(
        source: Arc<FakeSource>,
        store: &Arc<MemoryStore>,
        cancel: CancellationToken,
    ) -> ArchiveLoader {
        ArchiveLoader::new(
            source,
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(IntervalGate::new(Duration::ZERO)),
            cancel,
        )
    }

    #[tokio::test]
    async fn test_years_are_imported_and_failures_isolated() {
        let mut source = FakeSource::new("years");
        source.archives.insert(
            ("FIGI1".to_string(), 2022),
            build_zip(&[("a.csv", "uid;2022-03-01T10:00:00Z;5;5;5;5;1\n")]),
        );
        source.archives.insert(
            ("FIGI1".to_string(), 2024),
            build_zip(&[("b.csv", "uid;2024-05-01T10:00:00Z;6;6;6;6;1\n")]),
        );
        source.failing_years.push(2023);
        let source = Arc::new(source);

        let store = Arc::new(MemoryStore::new());
        store.add_instrument(share("FIGI1", true));

        let loader = archive_loader(source.clone(), &store, CancellationToken::new());
        let summary = loader.run_all(2021, 2024).await.unwrap();

        assert_eq!(source.requests.lock().unwrap().len(), 4);
        assert_eq!(summary.years, 3);
        assert_eq!(summary.failed_years, 1);
        assert_eq!(summary.candles, 2);
        assert_eq!(store.prepared_years(), vec![2021, 2022, 2023, 2024]);
        assert_eq!(store.partition_creations(), 48);
        assert_eq!(source.written().len(), 2);
        assert!(source.written().iter().all(|path| !path.exists()));
    }

    #[tokio::test]
    async fn test_unreadable_archive_is_still_removed() {
        let mut source = FakeSource::new("broken");
        source
            .archives
            .insert(("FIGI1".to_string(), 2023), b"not a zip".to_vec());
        let source = Arc::new(source);
        let store = Arc::new(MemoryStore::new());
        store.add_instrument(share("FIGI1", true));

        let loader = archive_loader(source.clone(), &store, CancellationToken::new());
        let summary = loader.run_all(2023, 2023).await.unwrap();

        assert_eq!(summary.failed_years, 1);
        assert_eq!(source.written().len(), 1);
        assert!(!source.written()[0].exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_requests_nothing() {
        let source = Arc::new(FakeSource::new("cancelled"));
        let store = Arc::new(MemoryStore::new());
        store.add_instrument(share("FIGI1", true));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let loader = archive_loader(source.clone(), &store, cancel);
        let summary = loader.run_all(2020, 2024).await.unwrap();

        assert_eq!(summary, ArchiveRunSummary::default());
        assert!(source.requests.lock().unwrap().is_empty());
    }
}
