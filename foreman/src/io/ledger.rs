//! Append-only progress ledger (`PROGRESS.md`) and its parser.
//!
//! The ledger is a log: one markdown block per completed session, written
//! once and never rewritten. The parser is the single authority for derived
//! aggregates (session history, token totals); one corrupt block is skipped
//! with a warning rather than erasing visibility into prior sessions.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, warn};

use crate::core::session::{OutcomeKind, SessionRecord};
use crate::core::telemetry::TokenTotals;

const LEDGER_PREAMBLE: &str = "# Progress\n\n\
Session history for this project. Blocks are appended by `foreman run`;\n\
do not edit previous entries.\n";

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^## Session (\d+) - (\S+)").unwrap());

/// Aggregated view over the whole ledger.
#[derive(Debug, Clone, Default)]
pub struct ParsedLedger {
    /// Successfully parsed records in file order.
    pub sessions: Vec<SessionRecord>,
    /// Sum of token usage across parsed sessions.
    pub totals: TokenTotals,
    /// One entry per skipped malformed block.
    pub warnings: Vec<String>,
}

impl ParsedLedger {
    pub fn last_session(&self) -> Option<&SessionRecord> {
        self.sessions.last()
    }

    /// Next monotonic session id.
    pub fn next_session_id(&self) -> u64 {
        self.sessions
            .iter()
            .map(|s| s.session_id)
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

/// Append-only session history with a fingerprint-keyed parse cache.
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    cache: Option<(Fingerprint, ParsedLedger)>,
}

impl ProgressLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one session block. Creates the ledger with its preamble on
    /// first use; never rewrites prior content.
    pub fn append(&mut self, record: &SessionRecord, narrative: &str) -> Result<()> {
        let fresh = !self.path.exists();
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }

        let mut buf = String::new();
        if fresh {
            buf.push_str(LEDGER_PREAMBLE);
        }
        buf.push_str(&render_block(record, narrative));

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open ledger {}", self.path.display()))?;
        file.write_all(buf.as_bytes())
            .with_context(|| format!("append to ledger {}", self.path.display()))?;

        self.cache = None;
        debug!(session_id = record.session_id, feature_id = %record.feature_id, "ledger block appended");
        Ok(())
    }

    /// Single forward pass over the ledger, cached by content fingerprint.
    ///
    /// A missing ledger parses as empty history.
    pub fn parse(&mut self) -> Result<ParsedLedger> {
        if !self.path.exists() {
            return Ok(ParsedLedger::default());
        }

        let meta = fs::metadata(&self.path)
            .with_context(|| format!("stat ledger {}", self.path.display()))?;
        let fingerprint = Fingerprint {
            len: meta.len(),
            modified: meta.modified().ok(),
        };
        if let Some((cached_fp, parsed)) = &self.cache
            && *cached_fp == fingerprint
        {
            debug!(path = %self.path.display(), "ledger served from parse cache");
            return Ok(parsed.clone());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read ledger {}", self.path.display()))?;
        let parsed = parse_content(&contents);
        for warning in &parsed.warnings {
            warn!(path = %self.path.display(), "{warning}");
        }

        self.cache = Some((fingerprint, parsed.clone()));
        Ok(parsed)
    }
}

fn render_block(record: &SessionRecord, narrative: &str) -> String {
    let mut buf = String::new();
    buf.push_str(&format!(
        "\n## Session {} - {}\n\n",
        record.session_id, record.started_at
    ));
    buf.push_str(&format!("Feature: {}\n", record.feature_id));
    buf.push_str(&format!("Result: {}\n", record.outcome.as_str()));
    buf.push_str(&format!("Duration: {} ms\n", record.duration_ms));
    if let Some(turns) = record.turns {
        buf.push_str(&format!("Turns: {turns}\n"));
    }
    buf.push('\n');
    let narrative = narrative.trim();
    if !narrative.is_empty() {
        buf.push_str(narrative);
        buf.push_str("\n\n");
    }
    buf.push_str("Token usage:\n");
    buf.push_str(&format!("- input tokens: {}\n", record.tokens.input));
    buf.push_str(&format!("- output tokens: {}\n", record.tokens.output));
    if record.tokens.reasoning > 0 {
        buf.push_str(&format!(
            "- reasoning tokens: {}\n",
            record.tokens.reasoning
        ));
    }
    buf.push_str(&format!("- total tokens: {}\n", record.tokens.total()));
    buf
}

fn parse_content(contents: &str) -> ParsedLedger {
    let mut parsed = ParsedLedger::default();

    // Split into blocks at session headers; everything before the first
    // header is preamble or narrative-only content and carries no records.
    let mut block_starts: Vec<usize> = Vec::new();
    let mut offset = 0;
    for line in contents.split_inclusive('\n') {
        if line.starts_with("## Session ") {
            block_starts.push(offset);
        }
        offset += line.len();
    }

    for (i, start) in block_starts.iter().enumerate() {
        let end = block_starts.get(i + 1).copied().unwrap_or(contents.len());
        let block = &contents[*start..end];
        match parse_block(block) {
            Ok(record) => {
                parsed.totals.add(record.tokens);
                parsed.sessions.push(record);
            }
            Err(reason) => {
                let header = block.lines().next().unwrap_or("").trim();
                parsed
                    .warnings
                    .push(format!("skipped malformed block '{header}': {reason}"));
            }
        }
    }

    parsed
}

fn parse_block(block: &str) -> Result<SessionRecord, String> {
    let header = block.lines().next().unwrap_or("");
    let captures = HEADER_RE
        .captures(header)
        .ok_or_else(|| "unparseable session header".to_string())?;
    let session_id: u64 = captures[1]
        .parse()
        .map_err(|_| "session id out of range".to_string())?;
    let started_at = captures[2].to_string();

    let mut feature_id = None;
    let mut outcome = None;
    let mut duration_ms = None;
    let mut turns = None;
    let mut tokens = TokenTotals::default();
    let mut saw_input = false;
    let mut saw_output = false;

    for line in block.lines().skip(1) {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("Feature: ") {
            feature_id = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Result: ") {
            outcome = Some(
                OutcomeKind::parse(rest.trim())
                    .ok_or_else(|| format!("unknown result '{}'", rest.trim()))?,
            );
        } else if let Some(rest) = line.strip_prefix("Duration: ") {
            let value = rest.trim().trim_end_matches(" ms").trim();
            duration_ms = Some(value.parse().map_err(|_| "bad duration".to_string())?);
        } else if let Some(rest) = line.strip_prefix("Turns: ") {
            turns = Some(rest.trim().parse().map_err(|_| "bad turn count")?);
        } else if let Some(rest) = line.strip_prefix("- input tokens: ") {
            tokens.input = rest.trim().parse().map_err(|_| "bad input tokens")?;
            saw_input = true;
        } else if let Some(rest) = line.strip_prefix("- output tokens: ") {
            tokens.output = rest.trim().parse().map_err(|_| "bad output tokens")?;
            saw_output = true;
        } else if let Some(rest) = line.strip_prefix("- reasoning tokens: ") {
            tokens.reasoning = rest.trim().parse().map_err(|_| "bad reasoning tokens")?;
        }
    }

    let feature_id = feature_id.ok_or_else(|| "missing Feature field".to_string())?;
    let outcome = outcome.ok_or_else(|| "missing Result field".to_string())?;
    let duration_ms = duration_ms.ok_or_else(|| "missing Duration field".to_string())?;
    if !saw_input || !saw_output {
        return Err("missing token usage sub-block".to_string());
    }

    Ok(SessionRecord {
        session_id,
        feature_id,
        started_at,
        duration_ms,
        success: outcome == OutcomeKind::Success,
        tokens,
        turns,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::session_record;

    #[test]
    fn append_then_parse_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut ledger = ProgressLedger::new(temp.path().join("PROGRESS.md"));

        let first = session_record(1, "core-1", OutcomeKind::Success, 120, 450);
        let second = session_record(2, "core-2", OutcomeKind::Timeout, 10, 0);
        ledger.append(&first, "Implemented core-1.").expect("append");
        ledger
            .append(&second, "Session hit the deadline.")
            .expect("append");

        let parsed = ledger.parse().expect("parse");
        assert_eq!(parsed.sessions.len(), 2);
        assert_eq!(parsed.sessions[0], first);
        assert_eq!(parsed.sessions[1], second);
        assert_eq!(parsed.totals.input, 130);
        assert_eq!(parsed.totals.output, 450);
        assert_eq!(parsed.last_session().expect("last").session_id, 2);
        assert_eq!(parsed.next_session_id(), 3);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn malformed_block_is_skipped_with_warning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("PROGRESS.md");
        let mut ledger = ProgressLedger::new(&path);

        let first = session_record(1, "core-1", OutcomeKind::Success, 5, 10);
        ledger.append(&first, "ok").expect("append");

        // A crash mid-append leaves a header without its fields.
        let mut contents = fs::read_to_string(&path).expect("read");
        contents.push_str("\n## Session 2 - 2026-01-01T00:00:00Z\n\nFeature: core-2\n");
        fs::write(&path, contents).expect("write");

        let second = session_record(3, "core-3", OutcomeKind::Failed, 1, 2);
        ledger.append(&second, "failed").expect("append");

        let parsed = ledger.parse().expect("parse");
        assert_eq!(parsed.sessions.len(), 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("Session 2"));
        assert_eq!(parsed.totals.input, 6);
        assert_eq!(parsed.next_session_id(), 4);
    }

    #[test]
    fn missing_ledger_parses_as_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut ledger = ProgressLedger::new(temp.path().join("PROGRESS.md"));

        let parsed = ledger.parse().expect("parse");
        assert!(parsed.sessions.is_empty());
        assert_eq!(parsed.next_session_id(), 1);
    }

    #[test]
    fn parse_reflects_out_of_band_appends() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("PROGRESS.md");
        let mut ledger = ProgressLedger::new(&path);
        ledger
            .append(
                &session_record(1, "core-1", OutcomeKind::Success, 5, 10),
                "ok",
            )
            .expect("append");
        assert_eq!(ledger.parse().expect("parse").sessions.len(), 1);

        // Another writer appends; the fingerprint changes, forcing a re-parse.
        let mut other = ProgressLedger::new(&path);
        other
            .append(
                &session_record(2, "core-2", OutcomeKind::Success, 5, 10),
                "ok",
            )
            .expect("append");

        assert_eq!(ledger.parse().expect("parse").sessions.len(), 2);
    }

    #[test]
    fn preamble_written_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("PROGRESS.md");
        let mut ledger = ProgressLedger::new(&path);

        ledger
            .append(
                &session_record(1, "core-1", OutcomeKind::Success, 5, 10),
                "ok",
            )
            .expect("append");
        ledger
            .append(
                &session_record(2, "core-2", OutcomeKind::Success, 5, 10),
                "ok",
            )
            .expect("append");

        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents.matches("# Progress").count(), 1);
    }
}
