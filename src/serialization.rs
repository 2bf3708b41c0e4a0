//! Byte encodings for persisted meshes and other serde types.

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::LevelingError;

///
/// How a mesh is laid out in bytes. The `Lz4` variants wrap the plain
/// encoding in a size-prefixed LZ4 block.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SerializationFormat {
    /// Pretty-printed JSON, undefined points as `null`
    Json,
    JsonLz4,
    /// Compact binary
    Bitcode,
    #[default]
    BitcodeLz4,
}

impl SerializationFormat {
    pub fn is_compressed(&self) -> bool {
        matches!(self, SerializationFormat::JsonLz4 | SerializationFormat::BitcodeLz4)
    }

    /// Conventional file extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            SerializationFormat::Json => "json",
            SerializationFormat::JsonLz4 => "json.lz4",
            SerializationFormat::Bitcode => "mesh",
            SerializationFormat::BitcodeLz4 => "mesh.lz4",
        }
    }

    /// Format implied by a file name, `None` for unknown extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        [SerializationFormat::JsonLz4, SerializationFormat::BitcodeLz4, SerializationFormat::Json, SerializationFormat::Bitcode]
            .into_iter()
            .find(|format| name.ends_with(&format!(".{}", format.extension())))
    }

    pub fn encode<T: Serialize>(&self, data: &T) -> Result<Vec<u8>, LevelingError> {
        let bytes = match self {
            SerializationFormat::Json | SerializationFormat::JsonLz4 => {
                serde_json::to_vec_pretty(data).map_err(|_| LevelingError::SerializationFailed)?
            }
            SerializationFormat::Bitcode | SerializationFormat::BitcodeLz4 => {
                bitcode::serialize(data).map_err(|_| LevelingError::SerializationFailed)?
            }
        };
        Ok(if self.is_compressed() { lz4_flex::compress_prepend_size(&bytes) } else { bytes })
    }

    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, LevelingError> {
        let decompressed;
        let bytes = if self.is_compressed() {
            decompressed = lz4_flex::decompress_size_prepended(data).map_err(|_| LevelingError::LZ4DecompressionFailed)?;
            &decompressed[..]
        } else {
            data
        };
        match self {
            SerializationFormat::Json | SerializationFormat::JsonLz4 => {
                serde_json::from_slice(bytes).map_err(|_| LevelingError::DeserializationFailed)
            }
            SerializationFormat::Bitcode | SerializationFormat::BitcodeLz4 => {
                bitcode::deserialize(bytes).map_err(|_| LevelingError::DeserializationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Heights {
        z: Vec<Option<f32>>,
        slot: u16,
    }

    fn sample() -> Heights
    {
        Heights { z: vec![Some(0.125), None, Some(-0.05)], slot: 3 }
    }

    #[test]
    fn test_json_keeps_undefined_entries() {
        let bytes = SerializationFormat::Json.encode(&sample()).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("null"));
        let result: Heights = SerializationFormat::Json.decode(&bytes).unwrap();
        assert_eq!(sample(), result);
    }

    #[test]
    fn test_compressed_formats() {
        for format in [SerializationFormat::JsonLz4, SerializationFormat::BitcodeLz4] {
            let bytes = format.encode(&sample()).unwrap();
            let result: Heights = format.decode(&bytes).unwrap();
            assert_eq!(sample(), result);
        }
        let garbage: Result<Heights, _> = SerializationFormat::BitcodeLz4.decode(&[7, 0]);
        assert_eq!(garbage, Err(LevelingError::LZ4DecompressionFailed));
    }

    #[test]
    fn test_wrong_format_is_rejected() {
        let bytes = SerializationFormat::Bitcode.encode(&sample()).unwrap();
        let result: Result<Heights, _> = SerializationFormat::Json.decode(&bytes);
        assert_eq!(result, Err(LevelingError::DeserializationFailed));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SerializationFormat::from_path(Path::new("slot0.json")), Some(SerializationFormat::Json));
        assert_eq!(SerializationFormat::from_path(Path::new("/tmp/bed.json.lz4")), Some(SerializationFormat::JsonLz4));
        assert_eq!(SerializationFormat::from_path(Path::new("bed.mesh.lz4")), Some(SerializationFormat::BitcodeLz4));
        assert_eq!(SerializationFormat::from_path(Path::new("bed.mesh")), Some(SerializationFormat::Bitcode));
        assert_eq!(SerializationFormat::from_path(Path::new("bed.txt")), None);
    }
}
