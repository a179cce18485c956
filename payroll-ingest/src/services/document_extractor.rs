//! Document Extractor
//!
//! Pulls candidate identifiers and a pay period out of one receipt.
//!
//! # Strategies
//! 1. **Filename fast path**: `{IDENT}_{DATE}_al_{DATE}.pdf`. The document is
//!    never opened.
//! 2. **Text fallback**: text of the first `max_pages` pages is searched for
//!    `Periodo del: D al D` and for every identifier-shaped token. Tokens from
//!    the filename stem are appended after the text tokens.
//!
//! # Identifier grammar
//! 3–4 letters from `A–Z`, `Ñ`, `&`; 6 digits; 2–3 trailing alphanumerics.
//!
//! # Period normalization
//! `01-ene.-2025` and `01/ENE/2025` both become `01-ene-2025`.

use crate::error::UnparsableReason;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const IDENT: &str = r"[A-ZÑ&]{3,4}[0-9]{6}[A-Z0-9]{2,3}";
const DATE: &str = r"[0-9]{1,2}\s*[/-]\s*[\p{L}.]+\s*[/-]\s*[0-9]{4}";

static IDENT_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b({})\b", IDENT)).expect("valid identifier regex"));

static IDENT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)^{}$", IDENT)).expect("valid identifier token regex"));

static PERIOD_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)Per[ií]odo\s*del\s*:?\s*({date})\s*al\s*({date})",
        date = DATE
    ))
    .expect("valid period regex")
});

static FAST_PATH_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^({ident})[_ ]+({date})[_ ]+al[_ ]+({date})\.pdf$",
        ident = IDENT,
        date = r"[0-9]{1,2}[-/][\p{L}.]+[-/][0-9]{4}"
    ))
    .expect("valid filename regex")
});

static DATE_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{1,2})[/-]([\p{L}.]+)[/-]([0-9]{4})$").expect("valid date regex")
});

/// Where the fields came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Filename,
    Text,
}

/// Normalized pay period
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayPeriod {
    pub start: String,
    pub end: String,
}

impl PayPeriod {
    /// Build from raw date tokens, normalizing separators and month punctuation
    pub fn from_raw(start: &str, end: &str) -> Self {
        Self {
            start: normalize_date(start),
            end: normalize_date(end),
        }
    }

    /// `start_al_end`, used in file names
    pub fn canonical(&self) -> String {
        format!("{}_al_{}", self.start, self.end)
    }

    /// `start al end`, stored in the ledger
    pub fn ledger_string(&self) -> String {
        format!("{} al {}", self.start, self.end)
    }

    /// Deterministic artifact name for `identifier` in this period
    pub fn file_name(&self, identifier: &str) -> String {
        format!("{}_{}.pdf", identifier.to_uppercase(), self.canonical())
    }
}

/// Fields extracted from one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Uppercased candidates, extraction order, no duplicates
    pub candidates: Vec<String>,
    pub period: PayPeriod,
    pub source: ExtractionSource,
}

/// Receipt field extractor
#[derive(Debug, Clone, Copy)]
pub struct DocumentExtractor {
    max_pages: usize,
}

impl DocumentExtractor {
    /// Create an extractor that reads at most `max_pages` pages of text
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
        }
    }

    /// Extract from filename, falling back to document text
    ///
    /// CPU-bound when the fallback runs; call from a blocking context.
    pub fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<ExtractedDocument, UnparsableReason> {
        if let Some(doc) = Self::from_filename(file_name) {
            return Ok(doc);
        }
        let text = self.read_text(bytes)?;
        Self::from_text(file_name, &text)
    }

    /// Filename fast path
    pub fn from_filename(file_name: &str) -> Option<ExtractedDocument> {
        let caps = FAST_PATH_NAME.captures(base_name(file_name))?;
        Some(ExtractedDocument {
            candidates: vec![caps[1].to_uppercase()],
            period: PayPeriod::from_raw(&caps[2], &caps[3]),
            source: ExtractionSource::Filename,
        })
    }

    /// Text strategy over already-extracted text
    pub fn from_text(file_name: &str, text: &str) -> Result<ExtractedDocument, UnparsableReason> {
        if text.trim().is_empty() {
            return Err(UnparsableReason::NoText);
        }

        let caps = PERIOD_PHRASE
            .captures(text)
            .ok_or(UnparsableReason::NoPeriod)?;
        let period = PayPeriod::from_raw(&caps[1], &caps[2]);

        let mut seen = HashSet::new();
        let candidates: Vec<String> = IDENT_IN_TEXT
            .captures_iter(text)
            .map(|c| c[1].to_uppercase())
            .chain(filename_candidates(file_name))
            .filter(|c| seen.insert(c.clone()))
            .collect();

        if candidates.is_empty() {
            return Err(UnparsableReason::NoIdentifier);
        }

        Ok(ExtractedDocument {
            candidates,
            period,
            source: ExtractionSource::Text,
        })
    }

    /// Text of the first `max_pages` pages
    fn read_text(&self, bytes: &[u8]) -> Result<String, UnparsableReason> {
        let document = lopdf::Document::load_mem(bytes)
            .map_err(|e| UnparsableReason::Unreadable(e.to_string()))?;

        let pages: Vec<u32> = document
            .get_pages()
            .keys()
            .copied()
            .take(self.max_pages)
            .collect();
        if pages.is_empty() {
            return Err(UnparsableReason::NoText);
        }

        match document.extract_text(&pages) {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Err(UnparsableReason::NoText),
            Err(e) => {
                tracing::debug!(error = %e, "Text extraction failed");
                Err(UnparsableReason::NoText)
            }
        }
    }
}

/// Identifier-shaped tokens in the filename stem
fn filename_candidates(file_name: &str) -> Vec<String> {
    let name = base_name(file_name);
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    stem.split(|c: char| !(c.is_alphanumeric() || c == '&'))
        .filter(|token| IDENT_TOKEN.is_match(token))
        .map(str::to_uppercase)
        .collect()
}

fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

/// `01-ene.-2025` → `01-ene-2025`
fn normalize_date(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match DATE_PARTS.captures(&compact) {
        Some(caps) => {
            let month: String = caps[2].chars().filter(|c| *c != '.').collect();
            format!("{}-{}-{}", &caps[1], month.to_lowercase(), &caps[3])
        }
        None => compact.replace('/', "-").replace('.', ""),
    }
}
