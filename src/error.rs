//! Typed failures raised by the songbook core. Store-level helpers wrap these
//! into `anyhow::Error` with context, so callers that need to branch on the
//! failure kind can still reach them through `downcast_ref`.

use thiserror::Error;

use crate::registry::ItemKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SongbookError {
    /// User supplied text that cannot be accepted as-is.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Ranks are positive; zero means "append at the end".
    #[error("rank must be a positive integer, got {0}")]
    InvalidRank(i64),

    /// A layout was used before its orientation was chosen.
    #[error("layout #{layout_id} has no orientation in its options")]
    MissingOrientation { layout_id: i64 },

    /// A stored item slot carries a kind tag the registry does not know.
    #[error("unknown item kind \"{0}\"")]
    UnknownItemKind(String),

    /// A slot references an item that no longer exists.
    #[error("{kind} #{item_id} is listed in songbook #{songbook_id} but does not exist")]
    DanglingItem {
        songbook_id: i64,
        kind: ItemKind,
        item_id: i64,
    },

    /// Part of a description could not be turned into JSON.
    #[error("failed to encode {what}: {message}")]
    Encoding { what: &'static str, message: String },
}

impl SongbookError {
    /// Whether the failure came from user input and can be reported next to
    /// the offending field instead of aborting the operation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SongbookError::Validation { .. } | SongbookError::InvalidRank(_)
        )
    }
}
