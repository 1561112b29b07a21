//! Where valid ticket codes come from.

use crate::error::SourceError;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Boxed future returned by [`TicketSource::load`]
pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>, SourceError>> + Send + 'a>>;

/// Supplies the list of valid ticket codes
///
/// Codes are returned raw; the validator canonicalizes them.
pub trait TicketSource: Send + Sync {
    /// Load every valid code
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the list cannot be read or parsed.
    fn load(&self) -> SourceFuture<'_>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Accepted shapes of a ticket file
#[derive(Deserialize)]
#[serde(untagged)]
enum TicketFile {
    Wrapped { tickets: Vec<String> },
    Bare(Vec<String>),
}

impl TicketFile {
    fn into_codes(self) -> Vec<String> {
        match self {
            Self::Wrapped { tickets } | Self::Bare(tickets) => tickets,
        }
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse a ticket file body
///
/// Accepts `{"tickets": ["A1", ...]}` or a bare `["A1", ...]`. A leading
/// UTF-8 byte order mark is skipped.
///
/// # Errors
///
/// Returns [`SourceError::Malformed`] for anything else.
pub fn parse_ticket_list(bytes: &[u8]) -> Result<Vec<String>, SourceError> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let file: TicketFile = serde_json::from_slice(body)?;
    Ok(file.into_codes())
}

/// Reads codes from a JSON file
#[derive(Clone, Debug)]
pub struct JsonFileTicketSource {
    path: PathBuf,
}

impl JsonFileTicketSource {
    /// Source reading `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this source reads
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TicketSource for JsonFileTicketSource {
    fn load(&self) -> SourceFuture<'_> {
        Box::pin(async move {
            let bytes = tokio::fs::read(&self.path)
                .await
                .map_err(|source| SourceError::Io {
                    path: self.path.display().to_string(),
                    source,
                })?;
            let codes = parse_ticket_list(&bytes)?;
            tracing::debug!(path = %self.path.display(), entries = codes.len(), "Read ticket file");
            Ok(codes)
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fixed in-memory list
#[derive(Clone, Debug, Default)]
pub struct StaticTicketSource {
    codes: Vec<String>,
}

impl StaticTicketSource {
    /// Source returning `codes`
    #[must_use]
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }
}

impl TicketSource for StaticTicketSource {
    fn load(&self) -> SourceFuture<'_> {
        Box::pin(async move { Ok(self.codes.clone()) })
    }

    fn describe(&self) -> String {
        format!("static list of {}", self.codes.len())
    }
}
