//! Guards for text that ends up verbatim in the typesetting markup. Both the
//! rejecting validator and the input hint are built from
//! [`FORBIDDEN_MARKUP_CHARS`], so they cannot drift apart.

use crate::error::SongbookError;

/// Characters reserved by the downstream markup language.
pub const FORBIDDEN_MARKUP_CHARS: [char; 8] = ['\\', '{', '}', '&', '[', ']', '^', '~'];

/// Pattern and tooltip that let a form reject forbidden characters before
/// anything reaches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputHint {
    pub pattern: String,
    pub title: String,
}

/// Human-readable list of the forbidden characters.
pub fn forbidden_chars_message() -> String {
    let chars = FORBIDDEN_MARKUP_CHARS
        .iter()
        .map(|ch| format!("\"{ch}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!("The following characters are forbidden and must be removed: {chars}.")
}

pub fn is_markup_free(value: &str) -> bool {
    !value.contains(&FORBIDDEN_MARKUP_CHARS[..])
}

/// Reject `value` if it contains any forbidden character. `field` names the
/// input in the resulting error.
pub fn validate_markup_free(field: &'static str, value: &str) -> Result<(), SongbookError> {
    if is_markup_free(value) {
        Ok(())
    } else {
        Err(SongbookError::Validation {
            field,
            message: forbidden_chars_message(),
        })
    }
}

/// Pattern matching any string free of forbidden characters, e.g.
/// `[^\\\{\}\&\[\]\^\~]*`, plus the message as a tooltip.
pub fn markup_free_attributes() -> InputHint {
    let escaped: String = FORBIDDEN_MARKUP_CHARS
        .iter()
        .map(|ch| format!("\\{ch}"))
        .collect();

    InputHint {
        pattern: format!("[^{escaped}]*"),
        title: forbidden_chars_message().replace('\'', "\\'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_braces_and_backslashes() {
        assert!(validate_markup_free("name", "Verse {1}").is_err());
        assert!(validate_markup_free("name", "C:\\songs").is_err());
        for ch in FORBIDDEN_MARKUP_CHARS {
            assert!(!is_markup_free(&format!("a{ch}b")), "{ch} should be rejected");
        }
    }

    #[test]
    fn accepts_plain_text() {
        assert!(validate_markup_free("name", "Chants de Noël (part 2) - 50%!").is_ok());
    }

    #[test]
    fn error_lists_every_forbidden_character() {
        let err = validate_markup_free("name", "~").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("name: "));
        for ch in FORBIDDEN_MARKUP_CHARS {
            assert!(message.contains(&format!("\"{ch}\"")));
        }
        assert!(err.is_validation());
    }

    #[test]
    fn input_hint_escapes_each_character() {
        let hint = markup_free_attributes();
        assert_eq!(hint.pattern, r"[^\\\{\}\&\[\]\^\~]*");
        assert_eq!(hint.title, forbidden_chars_message());
    }
}
