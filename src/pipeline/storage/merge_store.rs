use crate::common::constants::venue_file_name;
use crate::common::error::Result;
use crate::common::types::Occurrence;
use crate::config::CrawlSettings;
use crate::pipeline::dedup::SeenKeys;
use metrics::counter;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub venue_id: String,
    pub added: usize,
    pub duplicates: usize,
    pub venue_file: Option<PathBuf>,
}

/// Master CSV of every known occurrence plus one CSV per venue for the latest run.
///
/// Merges are serialized through an internal lock, so concurrent venue tasks can
/// share one store.
#[derive(Debug)]
pub struct MergeStore {
    output_dir: PathBuf,
    master_path: PathBuf,
    lock: Mutex<()>,
}

impl MergeStore {
    pub fn new(output_dir: impl Into<PathBuf>, master_file: &str) -> Self {
        let output_dir = output_dir.into();
        let master_path = output_dir.join(master_file);
        Self {
            output_dir,
            master_path,
            lock: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &CrawlSettings) -> Self {
        Self::new(settings.output_dir.clone(), &settings.master_file)
    }

    pub fn master_path(&self) -> &Path {
        &self.master_path
    }

    pub fn venue_path(&self, venue_id: &str) -> PathBuf {
        self.output_dir.join(venue_file_name(venue_id))
    }

    pub fn load_master(&self) -> Result<Vec<Occurrence>> {
        read_csv(&self.master_path)
    }

    /// Write this run's venue file, then fold the occurrences into the master.
    #[instrument(skip(self, occurrences), fields(incoming = occurrences.len()))]
    pub async fn merge(&self, venue_id: &str, occurrences: &[Occurrence]) -> Result<MergeReport> {
        let _guard = self.lock.lock().await;
        let venue_file = self.venue_path(venue_id);
        write_csv(&venue_file, occurrences)?;
        debug!("Wrote {} rows to {}", occurrences.len(), venue_file.display());

        let mut report = self.merge_master_locked(venue_id, occurrences)?;
        report.venue_file = Some(venue_file);
        Ok(report)
    }

    /// Fold occurrences into the master only, leaving venue files alone.
    pub async fn merge_master(&self, venue_id: &str, occurrences: &[Occurrence]) -> Result<MergeReport> {
        let _guard = self.lock.lock().await;
        self.merge_master_locked(venue_id, occurrences)
    }

    fn merge_master_locked(&self, venue_id: &str, occurrences: &[Occurrence]) -> Result<MergeReport> {
        let mut master = self.load_master()?;
        let mut seen = SeenKeys::from_occurrences(&master);

        let mut added = 0;
        let mut duplicates = 0;
        for occurrence in occurrences {
            if seen.admit(occurrence) {
                master.push(occurrence.clone());
                added += 1;
            } else {
                duplicates += 1;
            }
        }

        if added > 0 || !self.master_path.exists() {
            write_csv(&self.master_path, &master)?;
        }
        counter!("venue_crawler_merge_added_total", "venue" => venue_id.to_string())
            .increment(added as u64);
        counter!("venue_crawler_merge_duplicates_total", "venue" => venue_id.to_string())
            .increment(duplicates as u64);
        info!(
            "Merged {} into {}: {} added, {} already present ({} total)",
            venue_id,
            self.master_path.display(),
            added,
            duplicates,
            master.len()
        );

        Ok(MergeReport {
            venue_id: venue_id.to_string(),
            added,
            duplicates,
            venue_file: None,
        })
    }
}

/// Read occurrences from a CSV with `Venue,Title,Date,Time,Link` headers. A missing
/// file reads as empty.
pub fn read_csv(path: &Path) -> Result<Vec<Occurrence>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Write rows to a sibling temp file and rename it over `path`.
pub fn write_csv(path: &Path, rows: &[Occurrence]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "events.csv".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)?;
        writer.write_record(["Venue", "Title", "Date", "Time", "Link"])?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::ShowTime;
    use chrono::{NaiveDate, NaiveTime};
    use tempfile::tempdir;

    fn occ(title: &str, day: u32, time: ShowTime) -> Occurrence {
        Occurrence {
            venue: "Toyota Center".to_string(),
            title: title.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, day).unwrap(),
            time,
            link: None,
        }
    }

    #[test]
    fn test_empty_write_keeps_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv(&path, &[]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), "Venue,Title,Date,Time,Link");
        assert!(read_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn test_csv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let mut row = occ("Concert", 2, ShowTime::At(NaiveTime::from_hms_opt(19, 0, 0).unwrap()));
        row.link = Some("https://example.com/c".to_string());
        write_csv(&path, &[row.clone(), occ("Other", 3, ShowTime::Tbd)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[1], "Toyota Center,Concert,2025-05-02,07:00 PM,https://example.com/c");
        assert_eq!(lines[2], "Toyota Center,Other,2025-05-03,TBD,");

        let back = read_csv(&path).unwrap();
        assert_eq!(back[0], row);
        assert_eq!(back[1].link, None);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = MergeStore::new(dir.path(), "all_venue_events.csv");
        let rows = vec![occ("A", 1, ShowTime::Tbd), occ("B", 2, ShowTime::Tbd)];

        let first = store.merge("toyota_center", &rows).await.unwrap();
        assert_eq!(first.added, 2);
        let before = fs::read_to_string(store.master_path()).unwrap();

        let second = store.merge("toyota_center", &rows).await.unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(fs::read_to_string(store.master_path()).unwrap(), before);
        assert!(dir.path().join("toyota_center_events.csv").exists());
    }

    #[tokio::test]
    async fn test_merge_never_duplicates_identity() {
        let dir = tempdir().unwrap();
        let store = MergeStore::new(dir.path(), "all.csv");
        store.merge("v", &[occ("Gala", 1, ShowTime::Tbd)]).await.unwrap();
        let report = store
            .merge("v", &[occ("  GALA ", 1, ShowTime::Tbd), occ("Gala", 4, ShowTime::Tbd)])
            .await
            .unwrap();
        assert_eq!(report.added, 1);

        let master = store.load_master().unwrap();
        assert_eq!(master.len(), 2);
        let keys = SeenKeys::from_occurrences(&master);
        assert_eq!(keys.len(), master.len());
    }

    #[tokio::test]
    async fn test_venue_file_holds_only_this_run() {
        let dir = tempdir().unwrap();
        let store = MergeStore::new(dir.path(), "all.csv");
        store.merge("v", &[occ("Old", 1, ShowTime::Tbd)]).await.unwrap();
        store.merge("v", &[occ("New", 2, ShowTime::Tbd)]).await.unwrap();

        let venue_rows = read_csv(&store.venue_path("v")).unwrap();
        assert_eq!(venue_rows.len(), 1);
        assert_eq!(venue_rows[0].title, "New");
        assert_eq!(store.load_master().unwrap().len(), 2);
    }
}
