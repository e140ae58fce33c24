use thiserror::Error;

use crate::UndoToken;

/// How long an archive can be undone, in milliseconds.
pub const UNDO_TTL_MS: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UndoError {
    #[error("no archive is waiting to be undone")]
    NoToken,
    #[error("undo token {presented} does not match the outstanding token")]
    Mismatch { presented: String },
    #[error("undo token expired at {expires_at}")]
    Expired { expires_at: i64 },
}

impl UndoError {
    pub fn code(&self) -> &'static str {
        match self {
            UndoError::NoToken => "NO_UNDO_TOKEN",
            UndoError::Mismatch { .. } => "UNDO_TOKEN_MISMATCH",
            UndoError::Expired { .. } => "UNDO_TOKEN_EXPIRED",
        }
    }
}

/// The one outstanding undo token. Issuing replaces whatever was there.
#[derive(Debug, Default)]
pub struct UndoSlot {
    current: Option<UndoToken>,
}

impl UndoSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(
        &mut self,
        token_id: impl Into<String>,
        archive_id: impl Into<String>,
        now: i64,
        ttl_ms: i64,
    ) -> UndoToken {
        let token = UndoToken {
            token_id: token_id.into(),
            archive_id: archive_id.into(),
            expires_at: now.saturating_add(ttl_ms),
        };
        self.current = Some(token.clone());
        token
    }

    pub fn peek(&self) -> Option<&UndoToken> {
        self.current.as_ref()
    }

    /// Consume the outstanding token.
    ///
    /// `presented` of `None` means "whatever is outstanding". Any attempt
    /// against an occupied slot empties it, successful or not.
    pub fn redeem(&mut self, presented: Option<&str>, now: i64) -> Result<UndoToken, UndoError> {
        let token = self.current.take().ok_or(UndoError::NoToken)?;
        if let Some(presented) = presented {
            if presented != token.token_id {
                return Err(UndoError::Mismatch {
                    presented: presented.to_string(),
                });
            }
        }
        if now > token.expires_at {
            return Err(UndoError::Expired {
                expires_at: token.expires_at,
            });
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeem_within_ttl() {
        let mut slot = UndoSlot::new();
        slot.issue("t1", "a1", 1_000, UNDO_TTL_MS);
        let token = slot.redeem(Some("t1"), 11_000).unwrap();
        assert_eq!(token.archive_id, "a1");
        assert!(slot.peek().is_none());
    }

    #[test]
    fn later_issue_supersedes() {
        let mut slot = UndoSlot::new();
        slot.issue("t1", "a1", 0, UNDO_TTL_MS);
        slot.issue("t2", "a2", 0, UNDO_TTL_MS);
        let err = slot.redeem(Some("t1"), 1).unwrap_err();
        assert_eq!(err.code(), "UNDO_TOKEN_MISMATCH");
        assert_eq!(slot.redeem(None, 1).unwrap_err().code(), "NO_UNDO_TOKEN");
    }

    #[test]
    fn expired_token_clears_slot() {
        let mut slot = UndoSlot::new();
        slot.issue("t1", "a1", 0, UNDO_TTL_MS);
        let err = slot.redeem(None, 11_000).unwrap_err();
        assert_eq!(err, UndoError::Expired { expires_at: 10_000 });
        assert!(slot.peek().is_none());
    }
}
