//! Error types for the protocol layer.

/// A numeric code received from a client did not map to a known value.
///
/// These surface as deserialization failures (the enums use
/// `#[serde(try_from = "u8")]`), or directly from `TryFrom<u8>` when a
/// request carries a raw code that is validated later, like the desk mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid camp code: {0}")]
    InvalidCamp(u8),

    #[error("invalid desk state code: {0}")]
    InvalidDeskState(u8),

    #[error("invalid desk mode: {0}")]
    InvalidMode(u8),
}
