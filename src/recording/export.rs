//! Serialized archive handed to the download boundary

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::har::{Har, FILE_EXTENSION};
use crate::Result;

/// MIME type of an exported archive
pub const EXPORT_MIME_TYPE: &str = "application/json";

/// A serialized archive ready for download
#[derive(Debug, Clone)]
pub struct HarExport {
    file_name: String,
    exported_at: DateTime<Utc>,
    body: Bytes,
}

impl HarExport {
    /// Serialize an archive, naming it after the export time
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn from_har(har: &Har, exported_at: DateTime<Utc>) -> Result<Self> {
        let body = serde_json::to_vec(har)?;

        Ok(Self {
            file_name: suggested_file_name(exported_at),
            exported_at,
            body: Bytes::from(body),
        })
    }

    /// Suggested download file name
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// When the archive was serialized
    #[must_use]
    pub fn exported_at(&self) -> DateTime<Utc> {
        self.exported_at
    }

    /// MIME type of the payload
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        EXPORT_MIME_TYPE
    }

    /// Serialized JSON document
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Write the archive into `dir` under its suggested file name
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);

        let mut file = File::create(&path)?;
        file.write_all(&self.body)?;
        file.sync_all()?;

        info!("Wrote archive: {} ({} bytes)", path.display(), self.body.len());
        Ok(path)
    }
}

/// `<ISO-8601 timestamp>.har`
fn suggested_file_name(exported_at: DateTime<Utc>) -> String {
    format!(
        "{}.{FILE_EXTENSION}",
        exported_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::{Creator, Log};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn empty_har() -> Har {
        Har {
            log: Log::new(Creator {
                name: "test".to_string(),
                version: "1".to_string(),
            }),
        }
    }

    #[test]
    fn test_suggested_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(suggested_file_name(at), "2024-05-01T12:30:00.000Z.har");
    }

    #[test]
    fn test_export_body_is_har_json() {
        let export = HarExport::from_har(&empty_har(), Utc::now()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(export.body()).unwrap();

        assert_eq!(value["log"]["version"], "1.2");
        assert_eq!(value["log"]["creator"]["name"], "test");
        assert_eq!(export.mime_type(), "application/json");
        assert!(export.file_name().ends_with(".har"));
    }

    #[test]
    fn test_write_to() {
        let temp_dir = TempDir::new().unwrap();
        let export = HarExport::from_har(&empty_har(), Utc::now()).unwrap();

        let path = export.write_to(temp_dir.path()).unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), export.body().to_vec());
    }
}
