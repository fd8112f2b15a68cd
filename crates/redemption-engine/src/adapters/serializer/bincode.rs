use crate::domain::errors::SerializationError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes persisted records with bincode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl BincodeCodec {
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(value).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }

    pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, SerializationError> {
        bincode::deserialize(data).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<String, _> = BincodeCodec::decode(&[0xFF; 3]);
        assert!(result.is_err());
    }
}
