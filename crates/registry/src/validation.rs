//! Name validation rules

use thiserror::Error;

/// Shortest accepted name, in bytes.
pub const MIN_NAME_LEN: usize = 3;
/// Longest accepted name, in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Reason a candidate name was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name is {len} bytes, minimum is {MIN_NAME_LEN}")]
    TooShort { len: usize },

    #[error("name is {len} bytes, maximum is {MAX_NAME_LEN}")]
    TooLong { len: usize },

    #[error("character {ch:?} at position {index} is not a letter, digit, or '-'")]
    InvalidCharacter { ch: char, index: usize },
}

/// Validate a candidate name.
///
/// Length is checked first, then the charset `[A-Za-z0-9-]`. Names are taken
/// as case-sensitive ASCII with no normalization, so `"MySite"` and
/// `"mysite"` are distinct names.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    let len = name.len();
    if len < MIN_NAME_LEN {
        return Err(NameError::TooShort { len });
    }
    if len > MAX_NAME_LEN {
        return Err(NameError::TooLong { len });
    }

    if let Some((index, ch)) = name
        .char_indices()
        .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || *ch == '-'))
    {
        return Err(NameError::InvalidCharacter { ch, index });
    }

    Ok(())
}
