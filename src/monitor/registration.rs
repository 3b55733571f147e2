//! Registration number parsing and registration-file loading

use crate::utils::AppError;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Opaque registration number, trimmed and non-empty
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationNumber(String);

/// Why a registration line was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRegistration {
    Empty,
    ContainsWhitespace,
    /// Only ASCII letters, digits, `-`, `_` and `.` are allowed
    UnsafeCharacter(char),
    /// Expected exactly `expected` ASCII digits
    WrongFormat { expected: usize },
}

impl fmt::Display for InvalidRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidRegistration::Empty => write!(f, "empty registration number"),
            InvalidRegistration::ContainsWhitespace => {
                write!(f, "registration number contains whitespace")
            }
            InvalidRegistration::UnsafeCharacter(c) => {
                write!(f, "registration number contains unsupported character {:?}", c)
            }
            InvalidRegistration::WrongFormat { expected } => {
                write!(f, "registration number must be exactly {} digits", expected)
            }
        }
    }
}

impl RegistrationNumber {
    /// Parse a raw line into a registration number
    ///
    /// The number is substituted into the result URL as is, so it is limited
    /// to characters that need no URL encoding.
    ///
    /// With `expected_len` set, the number must consist of exactly that many
    /// ASCII digits.
    pub fn parse(raw: &str, expected_len: Option<usize>) -> Result<Self, InvalidRegistration> {
        let cleaned = raw.trim();
        if cleaned.is_empty() {
            return Err(InvalidRegistration::Empty);
        }
        if cleaned.chars().any(char::is_whitespace) {
            return Err(InvalidRegistration::ContainsWhitespace);
        }
        if let Some(c) = cleaned.chars().find(|c| !is_url_safe(*c)) {
            return Err(InvalidRegistration::UnsafeCharacter(c));
        }
        if let Some(expected) = expected_len {
            if cleaned.len() != expected || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
                return Err(InvalidRegistration::WrongFormat { expected });
            }
        }
        Ok(Self(cleaned.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_url_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

impl fmt::Display for RegistrationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of parsing a registration list
#[derive(Debug, Default)]
pub struct RegistrationList {
    /// Valid, de-duplicated numbers in file order
    pub numbers: Vec<RegistrationNumber>,
    /// Rejected lines as (line number, raw text, reason)
    pub rejected: Vec<(usize, String, InvalidRegistration)>,
    pub duplicates: usize,
}

/// Parse newline-delimited registration numbers
///
/// Blank lines are ignored. Malformed lines are logged and skipped.
/// Duplicates keep their first occurrence.
pub fn parse_registration_list(contents: &str, expected_len: Option<usize>) -> RegistrationList {
    let mut list = RegistrationList::default();
    let mut seen = HashSet::new();

    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match RegistrationNumber::parse(line, expected_len) {
            Ok(reg_no) => {
                if seen.insert(reg_no.clone()) {
                    list.numbers.push(reg_no);
                } else {
                    list.duplicates += 1;
                }
            }
            Err(reason) => {
                warn!(
                    line = index + 1,
                    raw = %line.trim(),
                    reason = %reason,
                    "Skipping malformed registration number"
                );
                list.rejected.push((index + 1, line.trim().to_string(), reason));
            }
        }
    }

    list
}

/// Load the registration file from disk
pub async fn load_registration_file(
    path: &Path,
    expected_len: Option<usize>,
) -> Result<RegistrationList, AppError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AppError::RegistrationFile {
            path: path.to_path_buf(),
            source,
        })?;

    let list = parse_registration_list(&contents, expected_len);
    if list.numbers.is_empty() {
        return Err(AppError::NoRegistrationNumbers);
    }

    info!(
        path = %path.display(),
        valid = list.numbers.len(),
        rejected = list.rejected.len(),
        duplicates = list.duplicates,
        "Loaded registration numbers"
    );

    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use uuid::Uuid;

    #[test]
    fn parse_should_trim_surrounding_whitespace() {
        let reg_no = RegistrationNumber::parse("  22105110001\r", None).expect("valid");
        assert_eq!(reg_no.as_str(), "22105110001");
    }

    #[test]
    fn parse_should_reject_empty_and_inner_whitespace() {
        assert_eq!(
            RegistrationNumber::parse("   ", None),
            Err(InvalidRegistration::Empty)
        );
        assert_eq!(
            RegistrationNumber::parse("221 051", None),
            Err(InvalidRegistration::ContainsWhitespace)
        );
    }

    #[test]
    fn parse_should_accept_any_token_without_length_rule() {
        assert!(RegistrationNumber::parse("111", None).is_ok());
        assert!(RegistrationNumber::parse("CS-2024-7", None).is_ok());
    }

    #[test]
    fn parse_should_reject_characters_that_would_alter_the_url() {
        assert_eq!(
            RegistrationNumber::parse("1&x=2", None),
            Err(InvalidRegistration::UnsafeCharacter('&'))
        );
        assert_eq!(
            RegistrationNumber::parse("1#a", None),
            Err(InvalidRegistration::UnsafeCharacter('#'))
        );
        assert_eq!(
            RegistrationNumber::parse("../111", None),
            Err(InvalidRegistration::UnsafeCharacter('/'))
        );
        assert!(RegistrationNumber::parse("cs_2024.7", None).is_ok());
    }

    #[test]
    fn parse_should_enforce_digit_length_when_configured() {
        assert!(RegistrationNumber::parse("22105110001", Some(11)).is_ok());
        assert_eq!(
            RegistrationNumber::parse("2210511000", Some(11)),
            Err(InvalidRegistration::WrongFormat { expected: 11 })
        );
        assert_eq!(
            RegistrationNumber::parse("2210511000A", Some(11)),
            Err(InvalidRegistration::WrongFormat { expected: 11 })
        );
    }

    #[test]
    fn parse_registration_list_should_skip_blank_malformed_and_duplicate_lines() {
        // Arrange
        let contents = "111\n\n222\nbad entry\n111\n  333  \n";

        // Act
        let list = parse_registration_list(contents, None);

        // Assert
        let numbers: Vec<&str> = list.numbers.iter().map(|r| r.as_str()).collect();
        assert_eq!(numbers, vec!["111", "222", "333"]);
        assert_eq!(list.duplicates, 1);
        assert_eq!(list.rejected.len(), 1);
        assert_eq!(list.rejected[0].0, 4);
        assert_eq!(list.rejected[0].2, InvalidRegistration::ContainsWhitespace);
    }

    #[tokio::test]
    async fn load_registration_file_should_fail_when_missing() {
        let path = temp_dir().join(format!("missing_{}.txt", Uuid::new_v4()));

        let result = load_registration_file(&path, None).await;

        assert!(matches!(result, Err(AppError::RegistrationFile { .. })));
    }

    #[tokio::test]
    async fn load_registration_file_should_fail_when_no_valid_numbers() {
        // Arrange
        let path = temp_dir().join(format!("regs_{}.txt", Uuid::new_v4()));
        tokio::fs::write(&path, "\n  \nnot valid\n")
            .await
            .expect("write temp file");

        // Act
        let result = load_registration_file(&path, None).await;

        // Assert
        assert!(matches!(result, Err(AppError::NoRegistrationNumbers)));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn load_registration_file_should_read_numbers_in_order() {
        // Arrange
        let path = temp_dir().join(format!("regs_{}.txt", Uuid::new_v4()));
        tokio::fs::write(&path, "22105110001\n22105110002\n")
            .await
            .expect("write temp file");

        // Act
        let list = load_registration_file(&path, Some(11))
            .await
            .expect("file should load");

        // Assert
        assert_eq!(list.numbers.len(), 2);
        assert_eq!(list.numbers[1].as_str(), "22105110002");
        let _ = tokio::fs::remove_file(&path).await;
    }
}
