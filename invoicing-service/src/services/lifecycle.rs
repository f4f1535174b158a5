//! Document state machine: quotation, invoice draft and published invoice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version tag and convert target, derived from the draft flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Quotation,
    Invoice,
}

impl DocumentKind {
    pub fn from_draft(draft: bool) -> Self {
        if draft {
            DocumentKind::Quotation
        } else {
            DocumentKind::Invoice
        }
    }

    pub fn is_draft(self) -> bool {
        matches!(self, DocumentKind::Quotation)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation",
            DocumentKind::Invoice => "invoice",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Quotation,
    InvoiceDraft,
    Published,
}

impl DocumentState {
    pub fn from_flags(draft: bool, published: bool) -> Self {
        if published {
            DocumentState::Published
        } else if draft {
            DocumentState::Quotation
        } else {
            DocumentState::InvoiceDraft
        }
    }

    /// Listing filter accepted by `GET /invoices?type=`.
    pub fn parse_filter(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quotation" => Some(DocumentState::Quotation),
            "invoice" => Some(DocumentState::InvoiceDraft),
            "published" => Some(DocumentState::Published),
            _ => None,
        }
    }
}

/// Header changes produced by a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub invoice_number: String,
    pub published_at: DateTime<Utc>,
    /// Always false: publishing yields an invoice, never a quotation.
    pub draft: bool,
}

/// Decide the number and timestamp for a publish.
///
/// A caller-supplied number wins, then the number already on the invoice, then
/// a timestamp-derived one. Uniqueness is left to the storage constraint.
pub fn publish(
    existing_number: Option<&str>,
    requested_number: Option<&str>,
    now: DateTime<Utc>,
) -> Publication {
    let requested = requested_number.map(str::trim).filter(|s| !s.is_empty());
    let existing = existing_number.map(str::trim).filter(|s| !s.is_empty());

    let invoice_number = match (requested, existing) {
        (Some(number), _) => number.to_string(),
        (None, Some(number)) => number.to_string(),
        (None, None) => generate_invoice_number(now),
    };

    Publication {
        invoice_number,
        published_at: now,
        draft: false,
    }
}

/// `YYYYMMDD-HHMMSS.mmm` in UTC.
pub fn generate_invoice_number(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d-%H%M%S%.3f").to_string()
}
