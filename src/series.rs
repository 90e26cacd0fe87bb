use chrono::{DateTime, SecondsFormat};
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};

use crate::error::{Error, Result};
use crate::rate::BandwidthSample;

/// Default series file, relative to the working directory.
pub const DEFAULT_SERIES_PATH: &str = "report.txt";

impl BandwidthSample {
    /// Serializes as `<rfc3339> <download> <upload>` without the newline.
    pub fn to_series_line(&self) -> String {
        format!(
            "{} {} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.download_mbps,
            self.upload_mbps
        )
    }

    /// Parses one series row. The error is a bare reason; callers add the location.
    pub fn from_series_line(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(format!("expected 3 fields, got {}", fields.len()));
        }
        let timestamp = DateTime::parse_from_rfc3339(fields[0])
            .map_err(|err| format!("invalid timestamp '{}': {err}", fields[0]))?;
        let download_mbps = parse_rate(fields[1], "download")?;
        let upload_mbps = parse_rate(fields[2], "upload")?;
        Ok(Self {
            timestamp,
            download_mbps,
            upload_mbps,
        })
    }
}

fn parse_rate(raw: &str, label: &str) -> std::result::Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|err| format!("invalid {label} rate '{raw}': {err}"))?;
    if !value.is_finite() {
        return Err(format!("{label} rate '{raw}' is not finite"));
    }
    Ok(value)
}

/// Append-only, line-per-sample store backing the bandwidth series.
pub struct SeriesStore {
    path: PathBuf,
    file: Option<File>,
}

impl SeriesStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of non-blank rows currently on disk; zero when the file does not exist.
    pub async fn existing_rows(&self) -> Result<usize> {
        match fs::read_to_string(&self.path).await {
            Ok(existing) => Ok(existing.lines().filter(|l| !l.trim().is_empty()).count()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(Error::io("failed to inspect series", &self.path, err)),
        }
    }

    /// Truncates the series and keeps it open for appending. Returns the number of
    /// rows that were discarded.
    pub async fn start_fresh(&mut self) -> Result<usize> {
        let discarded = self.existing_rows().await?;
        self.file = None;
        File::create(&self.path)
            .await
            .map_err(|err| Error::io("failed to truncate series", &self.path, err))?;
        self.file = Some(self.open_append().await?);
        Ok(discarded)
    }

    /// Writes one complete row and syncs it before returning.
    pub async fn append(&mut self, sample: &BandwidthSample) -> Result<()> {
        if self.file.is_none() {
            self.file = Some(self.open_append().await?);
        }
        let mut line = sample.to_series_line();
        line.push('\n');
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.as_bytes())
                .await
                .map_err(|err| Error::io("failed to write sample", &self.path, err))?;
            file.flush()
                .await
                .map_err(|err| Error::io("failed to flush sample", &self.path, err))?;
            file.sync_data()
                .await
                .map_err(|err| Error::io("failed to sync series", &self.path, err))?;
        }
        Ok(())
    }

    /// Reads every row in file order. Any malformed row fails the whole read.
    pub async fn read_all(&self) -> Result<Vec<BandwidthSample>> {
        let raw = fs::read_to_string(&self.path)
            .await
            .map_err(|err| Error::io("failed to read series", &self.path, err))?;
        parse_series(&raw, &self.path)
    }

    async fn open_append(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| Error::io("failed to open series", &self.path, err))
    }
}

fn parse_series(raw: &str, path: &Path) -> Result<Vec<BandwidthSample>> {
    // every complete row ends with '\n'; anything after the last one is a torn write
    if !raw.is_empty() && !raw.ends_with('\n') {
        return Err(Error::Format {
            path: path.to_path_buf(),
            line: raw.lines().count(),
            reason: "incomplete final row (missing newline)".to_string(),
        });
    }
    raw.lines()
        .enumerate()
        .map(|(idx, line)| {
            BandwidthSample::from_series_line(line).map_err(|reason| Error::Format {
                path: path.to_path_buf(),
                line: idx + 1,
                reason,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use tempfile::tempdir;

    fn sample(sec: u32, down: f64, up: f64) -> BandwidthSample {
        BandwidthSample {
            timestamp: FixedOffset::east_opt(2 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 5, 1, 12, 0, sec)
                .unwrap(),
            download_mbps: down,
            upload_mbps: up,
        }
    }

    #[test]
    fn line_format_is_stable() {
        let line = sample(7, 7.996096, 0.0).to_series_line();
        assert_eq!(line, "2024-05-01T12:00:07+02:00 7.996096 0");
        let utc = BandwidthSample {
            timestamp: sample(7, 0.0, 0.0).timestamp.with_timezone(&FixedOffset::east_opt(0).unwrap()),
            ..sample(7, 1.5, 0.25)
        };
        assert_eq!(utc.to_series_line(), "2024-05-01T10:00:07Z 1.5 0.25");
    }

    #[test]
    fn parses_what_it_writes() {
        let original = sample(59, 0.1 + 0.2, 123456.789012345);
        let parsed = BandwidthSample::from_series_line(&original.to_series_line()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn reads_lines_written_by_older_recorders() {
        let parsed =
            BandwidthSample::from_series_line("2023-11-02T08:15:00-03:00 12.25 3").unwrap();
        assert_eq!(parsed.download_mbps, 12.25);
        assert_eq!(parsed.upload_mbps, 3.0);
        assert_eq!(parsed.timestamp.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn rejects_wrong_field_count_and_bad_values() {
        assert!(BandwidthSample::from_series_line("2024-05-01T12:00:00Z 1").is_err());
        assert!(BandwidthSample::from_series_line("2024-05-01T12:00:00Z 1 2 3").is_err());
        assert!(BandwidthSample::from_series_line("yesterday 1 2").is_err());
        assert!(BandwidthSample::from_series_line("2024-05-01T12:00:00Z fast 2").is_err());
        assert!(BandwidthSample::from_series_line("2024-05-01T12:00:00Z NaN 2").is_err());
        assert!(BandwidthSample::from_series_line("").is_err());
    }

    #[tokio::test]
    async fn appends_are_read_back_in_order() {
        let tmp = tempdir().expect("temp dir");
        let mut store = SeriesStore::new(tmp.path().join("report.txt"));
        let samples: Vec<_> = (0..5).map(|i| sample(i, i as f64 * 1.25, 0.5)).collect();
        for s in &samples {
            store.append(s).await.expect("append");
        }
        let read = store.read_all().await.expect("read all");
        assert_eq!(read, samples);

        // restartable
        assert_eq!(store.read_all().await.expect("read again").len(), 5);

        let raw = std::fs::read_to_string(store.path()).expect("raw");
        assert!(raw.ends_with('\n'));
        assert_eq!(raw.lines().count(), 5);
    }

    #[tokio::test]
    async fn empty_file_has_no_samples() {
        let tmp = tempdir().expect("temp dir");
        let path = tmp.path().join("report.txt");
        std::fs::write(&path, "").expect("create");
        let store = SeriesStore::new(&path);
        assert!(store.read_all().await.expect("read").is_empty());
    }

    #[tokio::test]
    async fn malformed_line_is_reported_with_its_number() {
        let tmp = tempdir().expect("temp dir");
        let path = tmp.path().join("report.txt");
        std::fs::write(
            &path,
            "2024-05-01T12:00:00Z 1 2\n2024-05-01T12:00:01Z 1\n2024-05-01T12:00:02Z 1 2\n",
        )
        .expect("seed");
        let err = SeriesStore::new(&path).read_all().await.unwrap_err();
        match err {
            Error::Format { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("expected 3 fields"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn torn_final_row_is_rejected() {
        let tmp = tempdir().expect("temp dir");
        let path = tmp.path().join("report.txt");
        // "...12.5 33\n" cut short after the first '3' still looks like three fields
        std::fs::write(&path, "2024-05-01T12:00:00Z 1 2\n2024-05-01T12:00:01Z 12.5 3")
            .expect("seed");
        let err = SeriesStore::new(&path).read_all().await.unwrap_err();
        match err {
            Error::Format { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("missing newline"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let tmp = tempdir().expect("temp dir");
        let err = SeriesStore::new(tmp.path().join("nope.txt"))
            .read_all()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn start_fresh_truncates_and_counts_discarded_rows() {
        let tmp = tempdir().expect("temp dir");
        let path = tmp.path().join("report.txt");
        std::fs::write(&path, "2024-05-01T12:00:00Z 1 2\n2024-05-01T12:00:01Z 3 4\n")
            .expect("seed");
        let mut store = SeriesStore::new(&path);
        // counting leaves the file alone
        assert_eq!(store.existing_rows().await.expect("count"), 2);
        assert_eq!(store.read_all().await.expect("untouched").len(), 2);
        assert_eq!(store.start_fresh().await.expect("fresh"), 2);
        assert_eq!(store.existing_rows().await.expect("count after"), 0);
        store.append(&sample(3, 9.0, 1.0)).await.expect("append");
        let read = store.read_all().await.expect("read");
        assert_eq!(read, vec![sample(3, 9.0, 1.0)]);

        let mut other = SeriesStore::new(tmp.path().join("new.txt"));
        assert_eq!(other.start_fresh().await.expect("fresh new"), 0);
        assert!(other.read_all().await.expect("read new").is_empty());
    }
}
