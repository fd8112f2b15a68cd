//! # Voucher Tokens
//!
//! The public, unguessable handle of a voucher instance.
//!
//! A token is 24 bytes (192 bits) of OS entropy encoded as base64url without
//! padding, always 32 characters. It carries no counter, timestamp or
//! voucher linkage.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw entropy consumed per token.
pub const TOKEN_ENTROPY_BYTES: usize = 24;

/// Encoded length of a generated token.
pub const TOKEN_ENCODED_LEN: usize = 32;

/// Longest string accepted as a presented token.
///
/// Generated tokens are always 32 characters; anything longer cannot match
/// and is rejected before touching the store.
pub const MAX_PRESENTED_TOKEN_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Encodes raw entropy into a token.
    pub fn from_entropy(bytes: &[u8; TOKEN_ENTROPY_BYTES]) -> Self {
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accepts a token string presented by a caller.
    ///
    /// Surrounding whitespace is trimmed. Returns `None` for empty or
    /// oversized input. The token is not required to exist.
    pub fn parse_presented(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_PRESENTED_TOKEN_LEN {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_length_and_alphabet() {
        let token = Token::from_entropy(&[0xFF; TOKEN_ENTROPY_BYTES]);
        assert_eq!(token.as_str().len(), TOKEN_ENCODED_LEN);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!token.as_str().contains('='));
    }

    #[test]
    fn test_distinct_entropy_distinct_tokens() {
        let a = Token::from_entropy(&[1; TOKEN_ENTROPY_BYTES]);
        let mut bytes = [1; TOKEN_ENTROPY_BYTES];
        bytes[23] = 2;
        let b = Token::from_entropy(&bytes);
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_presented() {
        assert_eq!(
            Token::parse_presented("  abc \n").map(|t| t.to_string()),
            Some("abc".to_string())
        );
        assert!(Token::parse_presented("").is_none());
        assert!(Token::parse_presented("   ").is_none());
        assert!(Token::parse_presented(&"a".repeat(MAX_PRESENTED_TOKEN_LEN + 1)).is_none());
    }

    #[test]
    fn test_serde_transparent() {
        let token = Token::from_entropy(&[0; TOKEN_ENTROPY_BYTES]);
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{}\"", token));
    }
}
