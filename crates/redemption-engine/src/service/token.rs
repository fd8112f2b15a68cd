//! Token generation.

use crate::domain::errors::EntropyError;
use crate::domain::token::{Token, TOKEN_ENTROPY_BYTES};
use crate::ports::outbound::EntropySource;

/// Produces tokens from an entropy source.
///
/// Entropy failures propagate; there is no fallback source.
pub struct TokenGenerator<ES: EntropySource> {
    entropy: ES,
}

impl<ES: EntropySource> TokenGenerator<ES> {
    pub fn new(entropy: ES) -> Self {
        Self { entropy }
    }

    pub fn generate(&self) -> Result<Token, EntropyError> {
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        self.entropy.fill(&mut bytes)?;
        Ok(Token::from_entropy(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::OsEntropySource;
    use crate::domain::token::TOKEN_ENCODED_LEN;
    use crate::test_utils::FailingEntropy;
    use std::collections::HashSet;

    #[test]
    fn test_generated_tokens_are_distinct() {
        let generator = TokenGenerator::new(OsEntropySource);
        let tokens: HashSet<_> = (0..1000).map(|_| generator.generate().unwrap()).collect();
        assert_eq!(tokens.len(), 1000);
        assert!(tokens.iter().all(|t| t.as_str().len() == TOKEN_ENCODED_LEN));
    }

    #[test]
    fn test_entropy_failure_propagates() {
        let generator = TokenGenerator::new(FailingEntropy);
        assert!(matches!(
            generator.generate(),
            Err(EntropyError::Unavailable(_))
        ));
    }
}
