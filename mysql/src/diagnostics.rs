//! Classification of the text MySQL client tools write to stderr.
//!
//! The clients print advisories even on success. Those advisories are always
//! the last thing written, so they are matched as suffixes of the trimmed
//! output rather than anywhere in it.

use log::debug;

use crate::{MySqlError, Result};

pub const PASSWORD_WARNING: &str =
    "Using a password on the command line interface can be insecure.";

pub const GTID_PURGED_ADVISORY: &str = "pass --set-gtid-purged=OFF. To make a complete dump, pass --all-databases --triggers --routines --events.";

/// Harmless trailers of `mysqldump`
pub const DUMP_BENIGN: &[&str] = &[PASSWORD_WARNING, GTID_PURGED_ADVISORY];

/// Harmless trailers of `mysql`
pub const CLIENT_BENIGN: &[&str] = &[PASSWORD_WARNING];

/// Returns `Ok` when `text` is empty or ends with one of `benign`, otherwise
/// a [`MySqlError::Diagnostic`] holding the trimmed text.
pub fn classify(text: &str, benign: &[&str]) -> Result<()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    if benign.iter().any(|suffix| trimmed.ends_with(suffix)) {
        debug!("Ignoring tool warning: {trimmed}");
        return Ok(());
    }

    Err(MySqlError::Diagnostic(trimmed.to_string()))
}

/// Same as [`classify`] for raw captured bytes.
pub fn classify_bytes(raw: &[u8], benign: &[&str]) -> Result<()> {
    classify(&String::from_utf8_lossy(raw), benign)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_are_clean() {
        assert!(classify("", DUMP_BENIGN).is_ok());
        assert!(classify(" \n\t ", DUMP_BENIGN).is_ok());
    }

    #[test]
    fn password_warning_is_benign() {
        let text = "mysqldump: [Warning] Using a password on the command line interface can be insecure.\n";
        assert!(classify(text, DUMP_BENIGN).is_ok());
        assert!(classify(text, CLIENT_BENIGN).is_ok());
    }

    #[test]
    fn gtid_advisory_is_only_benign_for_dumps() {
        let text = "Warning: A partial dump from a server that has GTIDs will by default include the GTIDs of all transactions, even those that changed suppressed parts of the database. If you don't want to restore GTIDs, pass --set-gtid-purged=OFF. To make a complete dump, pass --all-databases --triggers --routines --events.";
        assert!(classify(text, DUMP_BENIGN).is_ok());
        assert!(classify(text, CLIENT_BENIGN).is_err());
    }

    #[test]
    fn errors_are_returned_trimmed_and_verbatim() {
        let err = classify("  ERROR 1045: Access denied\n", DUMP_BENIGN).unwrap_err();
        assert_eq!(err.to_string(), "ERROR 1045: Access denied");
        assert!(matches!(err, MySqlError::Diagnostic(ref msg) if msg == "ERROR 1045: Access denied"));
    }

    #[test]
    fn benign_text_followed_by_an_error_fails() {
        let text = format!("mysqldump: [Warning] {PASSWORD_WARNING}\nmysqldump: Got error: 1049: Unknown database 'nope'");
        let err = classify(&text, DUMP_BENIGN).unwrap_err();
        assert_eq!(err.to_string(), text);
    }

    #[test]
    fn benign_text_must_be_a_suffix() {
        let text = format!("{PASSWORD_WARNING} and then something broke");
        assert!(classify(&text, DUMP_BENIGN).is_err());
    }

    #[test]
    fn lossy_bytes_are_classified() {
        let raw = b"mysql: [Warning] Using a password on the command line interface can be insecure.\n";
        assert!(classify_bytes(raw, CLIENT_BENIGN).is_ok());
        assert!(classify_bytes(b"\xffboom", CLIENT_BENIGN).is_err());
    }
}
