//! State serialization for checkpointers that persist to bytes.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::memory::checkpointer::CheckpointError;

/// Serializes/deserializes a graph's state type for storage.
pub trait Serializer<S>: Send + Sync {
    fn serialize(&self, value: &S) -> Result<Vec<u8>, CheckpointError>;
    fn deserialize(&self, bytes: &[u8]) -> Result<S, CheckpointError>;
}

/// JSON serializer via `serde_json`. Requires `S: Serialize + DeserializeOwned`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl<S> Serializer<S> for JsonSerializer
where
    S: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &S) -> Result<Vec<u8>, CheckpointError> {
        serde_json::to_vec(value).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<S, CheckpointError> {
        serde_json::from_slice(bytes).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn json_serializer_round_trips() {
        let ser = JsonSerializer;
        let value = Sample { n: 7 };
        let bytes = ser.serialize(&value).unwrap();
        let back: Sample = ser.deserialize(&bytes).unwrap();
        assert_eq!(value, back);
    }
}
