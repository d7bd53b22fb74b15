use super::ArchiveError;
use super::parser::parse_csv;
use crate::db::postgres::repository::candle_repository::TraitCandleRepository;
use crate::services::candles::resolution::Resolution;
use std::io::{Read, Seek};
use tracing::{debug, info, warn};
use zip::ZipArchive;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub files: usize,
    pub parsed: usize,
    pub written: usize,
    pub skipped_rows: usize,
    pub failed_files: usize,
}

/// Stores every CSV file of a yearly archive as minute candles.
///
/// Each file is written as soon as it is parsed; a file that fails to store is
/// logged and the remaining files are still imported.
pub async fn import_archive<R, S>(
    archive: R,
    figi: &str,
    store: &S,
) -> Result<ImportSummary, ArchiveError>
where
    R: Read + Seek,
    S: TraitCandleRepository + ?Sized,
{
    let mut archive = ZipArchive::new(archive)?;
    let mut summary = ImportSummary::default();

    for index in 0..archive.len() {
        let (name, parsed) = {
            let file = archive.by_index(index)?;
            let name = file.name().to_string();
            if !file.is_file() || !name.ends_with(".csv") {
                debug!("Skipping archive entry {}", name);
                continue;
            }
            (name, parse_csv(file))
        };

        summary.files += 1;
        summary.parsed += parsed.candles.len();
        summary.skipped_rows += parsed.skipped;
        debug!(
            "{}: {} rows, {} candles",
            name,
            parsed.rows,
            parsed.candles.len()
        );

        if parsed.candles.is_empty() {
            continue;
        }

        match store
            .upsert_candles(figi, Resolution::Min1, &parsed.candles)
            .await
        {
            Ok(written) => summary.written += written,
            Err(e) => {
                warn!("Failed to store candles from {}: {}", name, e);
                summary.failed_files += 1;
            }
        }
    }

    info!(
        "Imported {} candles for {} from {} files ({} failed)",
        summary.written, figi, summary.files, summary.failed_files
    );
    Ok(summary)
}
