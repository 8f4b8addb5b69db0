//! Errors - エラー型と分類
//!
//! UI 層にはすべて区別可能なエラーとして返し、panic はしません。
//! - Transient: 一時的なエラー（読み取りのみリトライ対象）
//! - Permanent: リトライしても結果が変わらないエラー
//! - Validation: ネットワークに出る前に弾いた入力エラー

/// ErrorKind は ClientError の運用分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Validation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Connection refused, reset, timed out, ...
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response other than 404.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// Response body could not be parsed.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("task text must not be empty")]
    EmptyText,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) | ClientError::Decode(_) => ErrorKind::Transient,
            ClientError::Api { status, .. } if *status >= 500 => ErrorKind::Transient,
            ClientError::Api { .. } | ClientError::NotFound(_) => ErrorKind::Permanent,
            ClientError::EmptyText | ClientError::Config(_) => ErrorKind::Validation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Deleting an id twice ends here; callers treat it as non-fatal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ClientError::Transport("reset".into()), ErrorKind::Transient)]
    #[case(ClientError::Decode("eof".into()), ErrorKind::Transient)]
    #[case(ClientError::Api { status: 503, message: "down".into() }, ErrorKind::Transient)]
    #[case(ClientError::Api { status: 400, message: "bad".into() }, ErrorKind::Permanent)]
    #[case(ClientError::NotFound("t-1".into()), ErrorKind::Permanent)]
    #[case(ClientError::EmptyText, ErrorKind::Validation)]
    fn errors_are_classified(#[case] error: ClientError, #[case] kind: ErrorKind) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.is_retryable(), kind == ErrorKind::Transient);
    }

    #[test]
    fn not_found_is_recognised() {
        assert!(ClientError::NotFound("t-1".into()).is_not_found());
        assert!(!ClientError::EmptyText.is_not_found());
    }

    #[test]
    fn messages_carry_context() {
        let err = ClientError::Api {
            status: 500,
            message: "Failed to fetch tasks".into(),
        };
        assert_eq!(
            err.to_string(),
            "api error (status 500): Failed to fetch tasks"
        );
    }
}
