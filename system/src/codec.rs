use serde::de::DeserializeOwned;
use serde::Serialize;

/// How frames of a connection are encoded. Binary frames carry bincode,
/// text frames carry JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Bincode,
    Json,
}

#[derive(Debug)]
pub enum CodecError {
    Bincode(bincode::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Bincode(e) => write!(f, "bincode: {}", e),
            CodecError::Json(e) => write!(f, "json: {}", e),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<bincode::Error> for CodecError {
    fn from(e: bincode::Error) -> Self {
        CodecError::Bincode(e)
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Json(e)
    }
}

pub fn encode<T: Serialize>(encoding: Encoding, value: &T) -> Result<Vec<u8>, CodecError> {
    match encoding {
        Encoding::Bincode => Ok(bincode::serialize(value)?),
        Encoding::Json => Ok(serde_json::to_vec(value)?),
    }
}

pub fn decode<T: DeserializeOwned>(encoding: Encoding, bytes: &[u8]) -> Result<T, CodecError> {
    match encoding {
        Encoding::Bincode => Ok(bincode::deserialize(bytes)?),
        Encoding::Json => Ok(serde_json::from_slice(bytes)?),
    }
}

/// Re-encodes a bincode frame of `T` as JSON text, for debugging tools.
pub fn bincode_to_json<T: Serialize + DeserializeOwned>(bytes: &[u8]) -> Result<String, CodecError> {
    let value = bincode::deserialize::<T>(bytes)?;
    Ok(serde_json::to_string(&value)?)
}

pub fn json_to_bincode<T: Serialize + DeserializeOwned>(json: &str) -> Result<Vec<u8>, CodecError> {
    let value = serde_json::from_str::<T>(json)?;
    Ok(bincode::serialize(&value)?)
}
