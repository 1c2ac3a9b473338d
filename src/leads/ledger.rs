//! Append-only CSV ledger of confirmed leads.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::model::Lead;
use crate::error::LedgerError;

/// Header line, written once when the file is created.
pub const LEDGER_HEADER: &str = "Subject,Name,Email,WhatsApp,Origem,Quando";

/// Destination for confirmed leads.
#[async_trait]
pub trait LeadLedger: Send + Sync {
    /// Append one lead. Records are never rewritten or removed.
    async fn append(&self, lead: &Lead) -> Result<(), LedgerError>;
}

/// Flat-file ledger: one double-quoted CSV row per lead.
pub struct CsvLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Write {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl LeadLedger for CsvLedger {
    async fn append(&self, lead: &Lead) -> Result<(), LedgerError> {
        // Serializes header creation and row appends across all senders.
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_err(e))?;
        }

        let needs_header = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(self.write_err(e)),
        };

        let mut buf = String::new();
        if needs_header {
            buf.push_str(LEDGER_HEADER);
            buf.push('\n');
        }
        buf.push_str(&format_row(lead));
        buf.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_err(e))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| self.write_err(e))?;
        file.flush().await.map_err(|e| self.write_err(e))?;

        tracing::info!(path = %self.path.display(), subject = %lead.subject, "Lead saved");
        Ok(())
    }
}

/// Render a lead as one CSV line (without the trailing newline).
pub fn format_row(lead: &Lead) -> String {
    lead.columns()
        .iter()
        .map(|field| quote(field))
        .collect::<Vec<_>>()
        .join(",")
}

/// Wrap a field in double quotes, doubling embedded quotes and flattening
/// line breaks so a record never spans lines.
fn quote(field: &str) -> String {
    let escaped: String = field
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect::<String>()
        .replace('"', "\"\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn lead(name: &str) -> Lead {
        Lead {
            subject: "Abertura de empresa".into(),
            name: name.into(),
            email: "maria@ex.com".into(),
            phone: "83996438245".into(),
            source: "WhatsApp".into(),
            submitted_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn row_is_quoted_in_column_order() {
        assert_eq!(
            format_row(&lead("Maria Silva")),
            r#""Abertura de empresa","Maria Silva","maria@ex.com","83996438245","WhatsApp","2024-01-02T03:04:05.000Z""#
        );
    }

    #[test]
    fn embedded_quotes_and_newlines_are_escaped() {
        let row = format_row(&lead("Maria \"Mari\"\nSilva"));
        assert!(row.contains(r#""Maria ""Mari"" Silva""#));
        assert!(!row.contains('\n'));
    }

    #[tokio::test]
    async fn header_written_once_and_rows_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("leads.csv");
        let ledger = CsvLedger::new(&path);

        ledger.append(&lead("Maria Silva")).await.unwrap();
        ledger.append(&lead("Ana Lima")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], LEDGER_HEADER);
        assert!(lines[1].contains("\"Maria Silva\""));
        assert!(lines[2].contains("\"Ana Lima\""));
    }

    #[tokio::test]
    async fn existing_file_keeps_its_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        std::fs::write(&path, format!("{LEDGER_HEADER}\n\"old\",\"row\",\"\",\"\",\"\",\"\"\n")).unwrap();

        CsvLedger::new(&path).append(&lead("Maria Silva")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(LEDGER_HEADER).count(), 1);
        assert_eq!(content.lines().count(), 3);
        assert!(content.lines().nth(1).unwrap().starts_with("\"old\""));
    }

    #[tokio::test]
    async fn concurrent_appends_keep_rows_intact() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(CsvLedger::new(dir.path().join("leads.csv")));

        let mut handles = Vec::new();
        for i in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.append(&lead(&format!("Pessoa {i}"))).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 21);
        assert_eq!(lines[0], LEDGER_HEADER);
        for line in &lines[1..] {
            assert_eq!(line.matches("\",\"").count(), 5, "malformed row: {line}");
        }
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let err = CsvLedger::new(blocker.join("leads.csv"))
            .append(&lead("Maria Silva"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("leads.csv"));
    }
}
