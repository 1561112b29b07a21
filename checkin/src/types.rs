//! Domain types for ticket check-in.
//!
//! Value objects shared by the validator, the reducer and the feedback layer.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Ticket code
// ============================================================================

/// A canonical ticket code
///
/// Always trimmed and never empty. Comparison and storage only ever see the
/// canonical form, so `"  ABC123 "` and `"ABC123"` are the same code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TicketCode(String);

impl TicketCode {
    /// Canonicalize raw input into a code
    ///
    /// Returns `None` when nothing is left after trimming.
    ///
    /// ```
    /// use turnstile_checkin::types::TicketCode;
    ///
    /// assert_eq!(TicketCode::parse("  A1 ").map(|c| c.to_string()), Some("A1".to_string()));
    /// assert!(TicketCode::parse(" \t").is_none());
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The code as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TicketCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| serde::de::Error::custom("ticket code is blank"))
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of checking one piece of input
///
/// Every input, including garbage, maps to exactly one outcome. None of them
/// is an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckOutcome {
    /// Nothing but whitespace was entered
    EmptyInput,
    /// The code is not on the ticket list
    Invalid(TicketCode),
    /// The code was redeemed earlier on this device
    AlreadyUsed(TicketCode),
    /// The code was redeemed just now
    Valid(TicketCode),
}

impl CheckOutcome {
    /// The code this outcome is about, if any
    #[must_use]
    pub const fn code(&self) -> Option<&TicketCode> {
        match self {
            Self::EmptyInput => None,
            Self::Invalid(code) | Self::AlreadyUsed(code) | Self::Valid(code) => Some(code),
        }
    }

    /// Whether the holder should be let in
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Stable label used for metrics and logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty",
            Self::Invalid(_) => "invalid",
            Self::AlreadyUsed(_) => "already_used",
            Self::Valid(_) => "valid",
        }
    }
}

/// Where a piece of input came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    /// Typed by the operator
    #[default]
    Manual,
    /// Decoded from a QR code
    Scan,
}

impl InputSource {
    /// Stable label used for metrics and logs
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scan => "scan",
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
