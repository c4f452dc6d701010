use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    InvalidKeyLength { expected: usize, actual: usize },
    CiphertextTooShort { min: usize, actual: usize },
    AuthenticationFailed,
    EncryptionFailed,
}

impl CryptoError {
    /// Whether this error means the input failed AEAD authentication,
    /// either because it was truncated below the tag overhead or because
    /// the tag did not verify.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::AuthenticationFailed | CryptoError::CiphertextTooShort { .. }
        )
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKeyLength { expected, actual } => {
                write!(f, "invalid key length: expected {expected}, got {actual}")
            }
            CryptoError::CiphertextTooShort { min, actual } => {
                write!(
                    f,
                    "ciphertext too short: need at least {min} bytes, got {actual}"
                )
            }
            CryptoError::AuthenticationFailed => write!(f, "AEAD tag verification failed"),
            CryptoError::EncryptionFailed => write!(f, "AEAD encryption failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CryptoError {}
