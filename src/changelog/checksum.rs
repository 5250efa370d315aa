//! Checksum calculation for changesets

use crate::changelog::{Change, ChangelogError};
use sha2::{Digest, Sha256};

/// Prefix distinguishing these checksums from other tools' formats
pub const CHECKSUM_PREFIX: &str = "sha256:";

/// Calculate the checksum of a changeset's changes
///
/// The changes are serialized to canonical JSON (field order is fixed by the
/// type definitions) and hashed with SHA-256. SQL text is normalized by the
/// parser before it gets here, so line-ending differences do not matter.
pub fn calculate_checksum(changes: &[Change]) -> Result<String, ChangelogError> {
    let canonical = serde_json::to_vec(changes)?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    let hash = hasher.finalize();

    Ok(format!("{}{:x}", CHECKSUM_PREFIX, hash))
}

/// Normalize SQL text before it is stored in a [`Change`]
pub fn normalize_sql(sql: &str) -> String {
    sql.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(text: &str) -> Change {
        Change::Sql {
            sql: normalize_sql(text),
            split_statements: true,
            strip_comments: false,
        }
    }

    #[test]
    fn test_checksum_is_stable_and_prefixed() {
        let a = calculate_checksum(&[sql("CREATE TABLE users (id INT)")]).unwrap();
        let b = calculate_checksum(&[sql("CREATE TABLE users (id INT)")]).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(CHECKSUM_PREFIX));
        assert_eq!(a.len(), CHECKSUM_PREFIX.len() + 64);
    }

    #[test]
    fn test_checksum_ignores_line_endings() {
        let unix = calculate_checksum(&[sql("SELECT 1;\nSELECT 2;\n")]).unwrap();
        let windows = calculate_checksum(&[sql("SELECT 1;\r\nSELECT 2;\r\n")]).unwrap();
        assert_eq!(unix, windows);
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let a = calculate_checksum(&[sql("SELECT 1")]).unwrap();
        let b = calculate_checksum(&[sql("SELECT 2")]).unwrap();
        assert_ne!(a, b);
    }
}
