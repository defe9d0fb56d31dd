pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no embedded model payload found in page")]
    PayloadNotFound,

    #[error("malformed embedded payload: {message}")]
    MalformedPayload { message: String },

    #[error("unrecognized element type tag: {tag}")]
    UnrecognizedElementType { tag: String },

    #[error("unrecognized relationship type tag: {tag}")]
    UnrecognizedRelationshipType { tag: String },
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }
}
