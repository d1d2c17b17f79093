use thiserror::Error;

/// Errors raised while resolving metadata or splicing it into a container.
///
/// Use [`InjectError::is_client_error`] to decide whether the failure was
/// caused by the request (bad metadata JSON, unusable key) or by the image
/// itself (malformed container, oversized segment).
#[derive(Debug, Error)]
pub enum InjectError {
    /// The user-supplied metadata string is not a JSON object.
    #[error("invalid user metadata JSON: {reason}")]
    InvalidUserMetadataJson { reason: String },

    /// The source image's existing metadata could not be read.
    #[error("unreadable original metadata: {reason}")]
    UnreadableOriginalMetadata { reason: String },

    /// A signature or structural check failed inside an injector.
    #[error("malformed {container} container: {reason}")]
    MalformedContainer {
        container: &'static str,
        reason: String,
    },

    /// The serialized segment or chunk does not fit its length field.
    #[error("{container} segment overflow: {len} bytes exceeds the {max} byte limit")]
    SegmentOverflow {
        container: &'static str,
        len: usize,
        max: usize,
    },

    /// A metadata key cannot be written as a PNG text-chunk keyword.
    #[error("invalid text chunk keyword {keyword:?}: {reason}")]
    InvalidKeyword { keyword: String, reason: &'static str },

    /// A source file's bytes do not carry the declared format's signature.
    #[error("source is not a {declared} image")]
    FormatMismatch { declared: String },
}

impl InjectError {
    pub(crate) fn malformed(container: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedContainer {
            container,
            reason: reason.into(),
        }
    }

    /// `true` when the request, not the image, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUserMetadataJson { .. }
                | Self::InvalidKeyword { .. }
                | Self::FormatMismatch { .. }
        )
    }
}

pub type Result<T, E = InjectError> = std::result::Result<T, E>;
