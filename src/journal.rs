//! Append-only trade journal
//!
//! Every decision and trade outcome is recorded as one line:
//! `[ISO-timestamp] [KIND] mint tx:txidOrDash {jsonExtra}`
//!
//! Appends are synchronous per call so nothing is lost on an ungraceful
//! shutdown. A failed append is logged and swallowed - the journal must
//! never abort the decision pipeline.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::warn;

/// Journal event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Buy,
    Sell,
    BuyFail,
    SellFail,
    MintDetected,
    BuyAttempt,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Buy => "BUY",
            EventKind::Sell => "SELL",
            EventKind::BuyFail => "BUY_FAIL",
            EventKind::SellFail => "SELL_FAIL",
            EventKind::MintDetected => "MINT_DETECTED",
            EventKind::BuyAttempt => "BUY_ATTEMPT",
            EventKind::Error => "ERROR",
        }
    }
}

/// File-backed append-only journal
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one entry. Infallible by design: an I/O failure is logged
    /// via tracing and otherwise ignored.
    pub fn record(&self, kind: EventKind, mint: &str, txid: Option<&str>, extra: Value) {
        let line = Self::format_line(kind, mint, txid, &extra);
        if let Err(e) = self.append(&line) {
            warn!("Failed to append journal entry: {}", e);
        }
    }

    fn format_line(kind: EventKind, mint: &str, txid: Option<&str>, extra: &Value) -> String {
        format!(
            "[{}] [{}] {} tx:{} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            kind.as_str(),
            mint,
            txid.unwrap_or("-"),
            extra
        )
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    /// Read the last `limit` entries, oldest first. Used by the status
    /// command; an absent journal yields an empty list.
    pub fn tail(&self, limit: usize) -> Vec<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let lines: Vec<&str> = content.lines().collect();
                let start = lines.len().saturating_sub(limit);
                lines[start..].iter().map(|s| s.to_string()).collect()
            }
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.log");
        let journal = Journal::new(&path);

        journal.record(
            EventKind::Buy,
            "MintAddr111",
            Some("txid123"),
            json!({ "pricePerToken": 0.5 }),
        );
        journal.record(EventKind::BuyFail, "MintAddr222", None, json!({ "error": "no route" }));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[BUY] MintAddr111 tx:txid123"));
        assert!(lines[0].contains("\"pricePerToken\":0.5"));
        assert!(lines[1].contains("[BUY_FAIL] MintAddr222 tx:- "));
    }

    #[test]
    fn test_append_failure_does_not_panic() {
        // Directory path cannot be opened for append; record must swallow it
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        journal.record(EventKind::Error, "mint", None, json!({}));
    }

    #[test]
    fn test_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.log");
        let journal = Journal::new(&path);

        for i in 0..10 {
            journal.record(EventKind::MintDetected, &format!("mint{}", i), None, json!({}));
        }

        let tail = journal.tail(3);
        assert_eq!(tail.len(), 3);
        assert!(tail[2].contains("mint9"));
        assert!(tail[0].contains("mint7"));

        let missing = Journal::new(dir.path().join("nope.log"));
        assert!(missing.tail(5).is_empty());
    }
}
