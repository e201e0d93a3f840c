use std::sync::OnceLock;

use regex::Regex;
use tallyscan_core::TransactionRecord;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// `$`, one or more digits, `.`, exactly two digits. ASCII digits only, no
// thousands separators.
re!(re_amount, r"\$[0-9]+\.[0-9]{2}");

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct Extractor;

impl Extractor {
    /// Extract line-item transactions from raw OCR text, in line order.
    ///
    /// Blank lines and lines without an amount token are skipped. A line
    /// yields at most one record, built from its first amount.
    pub fn extract(ocr_text: &str) -> Vec<TransactionRecord> {
        ocr_text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(Self::extract_line)
            .collect()
    }

    /// Parse a single line. `details` is everything before the first amount,
    /// trimmed; the rest of the line is ignored.
    pub fn extract_line(line: &str) -> Option<TransactionRecord> {
        let m = re_amount().find(line)?;
        Some(TransactionRecord {
            amount: m.as_str().to_string(),
            details: line[..m.start()].trim().to_string(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
