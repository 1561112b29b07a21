//! Operator console commands.
//!
//! In manual mode each input line is either a ticket code or a `:`-prefixed
//! command. In scan mode every line is decoded scanner text and goes to the
//! validator untouched, so a QR code can never act as a command.

use crate::reducer::CheckinAction;
use crate::types::InputSource;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// One parsed console line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Check a code
    Check {
        /// Line as typed, untrimmed
        raw: String,
        /// Manual or scan
        source: InputSource,
    },
    /// Forget every redemption
    Reset,
    /// Print status and health
    Status,
    /// Leave
    Quit,
    /// A `:` command that does not exist
    Unknown(String),
}

impl Command {
    /// Parse a console line
    ///
    /// In scan mode the line is always a scanned code. In manual mode plain
    /// lines are typed codes and `:scan <text>` forces scan input. A blank
    /// line is a check of empty input.
    #[must_use]
    pub fn parse(line: &str, mode: InputSource) -> Self {
        if mode == InputSource::Scan {
            return Self::Check {
                raw: line.to_string(),
                source: InputSource::Scan,
            };
        }

        let Some(command) = line.trim_start().strip_prefix(':') else {
            return Self::Check {
                raw: line.to_string(),
                source: mode,
            };
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .unwrap_or((command, ""));
        match name.trim_end() {
            "scan" => Self::Check {
                raw: rest.to_string(),
                source: InputSource::Scan,
            },
            "reset" => Self::Reset,
            "status" => Self::Status,
            "quit" | "q" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The reducer action for this command, if it maps to one
    #[must_use]
    pub fn into_action(self) -> Option<CheckinAction> {
        match self {
            Self::Check { raw, source } => Some(CheckinAction::CheckTicket { raw, source }),
            Self::Reset => Some(CheckinAction::ResetUsed),
            Self::Status | Self::Quit | Self::Unknown(_) => None,
        }
    }
}

/// Help text for manual mode
pub const HELP: &str = "Enter a ticket code, or :scan <text>, :reset, :status, :quit";

/// Help text for scan mode, where commands are not available
pub const SCAN_HELP: &str = "Scan mode: every line is checked as a ticket code. End input to quit.";

/// Help text for `mode`
#[must_use]
pub const fn help(mode: InputSource) -> &'static str {
    match mode {
        InputSource::Manual => HELP,
        InputSource::Scan => SCAN_HELP,
    }
}

/// Read one line, without its line ending
///
/// Bytes that are not UTF-8 are replaced rather than rejected: scanners and
/// pipes deliver arbitrary bytes and a bad line is still a (failing) check.
/// `buf` is scratch space reused across calls. Returns `None` at end of input.
///
/// # Errors
///
/// Returns the underlying I/O error if the input cannot be read at all.
pub async fn read_line<R>(input: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if input.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    let mut line = buf.as_slice();
    line = line.strip_suffix(b"\n").unwrap_or(line);
    line = line.strip_suffix(b"\r").unwrap_or(line);
    Ok(Some(String::from_utf8_lossy(line).into_owned()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;

    #[test]
    fn plain_lines_follow_mode() {
        assert_eq!(
            Command::parse(" A1 ", InputSource::Manual),
            Command::Check {
                raw: " A1 ".into(),
                source: InputSource::Manual
            }
        );
        assert_eq!(
            Command::parse("A1", InputSource::Scan),
            Command::Check {
                raw: "A1".into(),
                source: InputSource::Scan
            }
        );
    }

    #[test]
    fn scan_command_forces_scan_source() {
        assert_eq!(
            Command::parse(":scan  QR-77", InputSource::Manual),
            Command::Check {
                raw: " QR-77".into(),
                source: InputSource::Scan
            }
        );
        assert_eq!(
            Command::parse(":scan", InputSource::Manual),
            Command::Check {
                raw: String::new(),
                source: InputSource::Scan
            }
        );
    }

    #[test]
    fn scan_mode_never_parses_commands() {
        for line in [":reset", ":quit", ":status", ":scan A1", " :reset "] {
            assert_eq!(
                Command::parse(line, InputSource::Scan).into_action(),
                Some(CheckinAction::scan(line)),
                "{line:?} must reach the validator as scanned text"
            );
        }
    }

    #[test]
    fn help_depends_on_mode() {
        assert_eq!(help(InputSource::Manual), HELP);
        assert_eq!(help(InputSource::Scan), SCAN_HELP);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_replaced_not_fatal() {
        let mut input = tokio::io::BufReader::new(&b"A1\n\xff\xfeQR\r\nB2"[..]);
        let mut buf = Vec::new();

        let mut lines = Vec::new();
        while let Some(line) = read_line(&mut input, &mut buf).await.unwrap() {
            lines.push(line);
        }

        assert_eq!(lines, vec!["A1".to_string(), "\u{FFFD}\u{FFFD}QR".to_string(), "B2".to_string()]);
    }

    #[tokio::test]
    async fn empty_line_is_kept_and_end_of_input_is_none() {
        let mut input = tokio::io::BufReader::new(&b"\n"[..]);
        let mut buf = Vec::new();

        assert_eq!(read_line(&mut input, &mut buf).await.unwrap(), Some(String::new()));
        assert_eq!(read_line(&mut input, &mut buf).await.unwrap(), None);
    }

    #[test]
    fn control_commands() {
        assert_eq!(Command::parse(":reset", InputSource::Manual), Command::Reset);
        assert_eq!(Command::parse(" :status ", InputSource::Manual), Command::Status);
        assert_eq!(Command::parse(":quit", InputSource::Manual), Command::Quit);
        assert_eq!(
            Command::parse(":open", InputSource::Manual),
            Command::Unknown("open".into())
        );
    }

    #[test]
    fn blank_line_is_empty_check() {
        assert_eq!(
            Command::parse("", InputSource::Manual).into_action(),
            Some(CheckinAction::manual(""))
        );
        assert_eq!(Command::Status.into_action(), None);
        assert_eq!(Command::Reset.into_action(), Some(CheckinAction::ResetUsed));
    }
}
