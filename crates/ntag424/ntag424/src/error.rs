use ntag424_apdu_core::StatusWord;

/// Result type for NTAG 424 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for NTAG 424 operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-related errors
    #[error(transparent)]
    Transport(#[from] ntag424_apdu_core::TransportError),

    /// Response-related errors
    #[error(transparent)]
    Response(#[from] ntag424_apdu_core::ResponseError),

    /// Command framing errors
    #[error(transparent)]
    Command(#[from] ntag424_apdu_core::CommandError),

    /// Input bytes do not have the expected shape
    #[error("Malformed input: {0}")]
    MalformedInput(&'static str),

    /// The card rejected the authentication or failed to prove the shared key
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(&'static str),

    /// The response MAC does not match the expected value
    #[error("Response integrity failure")]
    ResponseIntegrityFailure,

    /// The card answered a command with a non-success status
    #[error("Command rejected with status {status}: {}", status.description())]
    CommandRejected {
        /// Status word returned by the card
        status: StatusWord,
    },

    /// A secured response had neither the status-only nor the MAC shape
    #[error("Unsupported response shape: {len} bytes")]
    UnsupportedResponseShape {
        /// Length of the raw response
        len: usize,
    },

    /// Placeholder regions of the NDEF template overlap
    #[error("Placeholder regions overlap: {0}")]
    PlaceholderOverlap(&'static str),

    /// The file settings cannot be changed with the current access rights
    #[error("File settings change rejected: {0}")]
    SettingsChangeRejected(String),

    /// The URL template cannot be laid out as an NDEF message
    #[error("Invalid URL template: {0}")]
    InvalidTemplate(String),

    /// Offsets and access rights do not describe valid file settings
    #[error("Invalid file settings: {0}")]
    InvalidSettings(&'static str),

    /// Key index outside of the tag's key table
    #[error("Invalid key index: {0}")]
    InvalidKeyIndex(u8),

    /// Master key is not a 16-byte hex value
    #[error("Invalid master key: {0}")]
    InvalidMasterKey(&'static str),

    /// A secure command was issued without an authenticated session
    #[error("No authenticated session")]
    NoSession,

    /// The session was invalidated by an earlier failure
    #[error("Session invalidated")]
    SessionInvalidated,

    /// The command counter cannot be incremented any further
    #[error("Command counter exhausted")]
    CounterExhausted,

    /// Padding errors from the block cipher
    #[error("Pad error")]
    PadError(#[from] cipher::inout::PadError),

    /// Unpadding errors from the block cipher
    #[error("Unpad error")]
    UnpadError(#[from] cipher::block_padding::UnpadError),
}

impl Error {
    /// Create a command rejected error from a status word
    pub const fn rejected(status: StatusWord) -> Self {
        Self::CommandRejected { status }
    }

    /// Check whether the error was raised by the transport
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<ntag424_apdu_core::StatusError> for Error {
    fn from(error: ntag424_apdu_core::StatusError) -> Self {
        Self::rejected(error.status)
    }
}
