// Copyright 2024-2026 Monoinfer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Graph serialization: JSON graph documents, the binary container and,
//! with the `onnx` feature, ONNX protobuf models.
//!
//! A JSON document carries weights inline. The binary container is
//!
//! ```text
//! "MNFR" | u32 LE version | u64 LE header length | JSON header | weight payload
//! ```
//!
//! where initializers reference the payload by byte offset. The format is
//! detected from the content, never from the file extension.

use std::collections::BTreeMap;

use half::f16;
use serde::{Deserialize, Serialize};

use crate::engine::InferenceError;

/// Value of the `format` field every graph document must carry.
pub const FORMAT_TAG: &str = "monoinfer-graph";

/// Highest graph document version understood by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Magic prefix of the binary container.
pub const CONTAINER_MAGIC: &[u8; 4] = b"MNFR";

/// Binary container layout version.
pub const CONTAINER_VERSION: u32 = 1;

const CONTAINER_PREAMBLE: usize = 16;

/// Protobuf key of `ModelProto.ir_version` (field 1, varint), which ONNX
/// writers emit first.
const ONNX_LEADING_KEY: u8 = 0x08;

/// Parsed graph document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub format: String,
    pub version: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_input")]
    pub input: String,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default)]
    pub input_shape: Option<[usize; 4]>,
    #[serde(default)]
    pub output_shape: Option<[usize; 4]>,
    #[serde(default)]
    pub initializers: BTreeMap<String, InitializerDef>,
    pub nodes: Vec<NodeDef>,
}

fn default_input() -> String {
    "input".to_string()
}

fn default_output() -> String {
    "output".to_string()
}

/// Weight tensor stored in the document or the container payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializerDef {
    pub dims: Vec<usize>,
    #[serde(default)]
    pub dtype: WeightDType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Storage type of payload-backed weights. Always widened to f32 on load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightDType {
    #[default]
    F32,
    F16,
}

impl WeightDType {
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F16 => 2,
        }
    }
}

/// One operator application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    #[serde(default)]
    pub name: String,
    pub op: String,
    pub inputs: Vec<String>,
    pub output: String,
    /// Role (`weight`, `bias`, ...) to initializer name.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub attrs: NodeAttrs,
}

/// Optional operator attributes. Unused ones are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<[usize; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stride: Option<[usize; 2]>,
    /// `[top, left, bottom, right]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pads: Option<[usize; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dilation: Option<[usize; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
}

/// A decoded model file: the document plus the container payload, if any.
#[derive(Debug)]
pub struct DecodedModel<'a> {
    pub document: GraphDocument,
    pub payload: Option<&'a [u8]>,
}

impl GraphDocument {
    /// Parse a JSON graph document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, InferenceError> {
        let doc: Self = serde_json::from_slice(bytes)
            .map_err(|e| InferenceError::Parse(format!("invalid graph JSON: {}", e)))?;
        doc.check_header()?;
        Ok(doc)
    }

    pub(crate) fn check_header(&self) -> Result<(), InferenceError> {
        if self.format != FORMAT_TAG {
            return Err(InferenceError::Parse(format!(
                "unrecognized graph format '{}'",
                self.format
            )));
        }
        if self.version == 0 || self.version > FORMAT_VERSION {
            return Err(InferenceError::Parse(format!(
                "unsupported graph version {} (max {})",
                self.version, FORMAT_VERSION
            )));
        }
        if self.nodes.is_empty() {
            return Err(InferenceError::Parse("graph has no nodes".into()));
        }
        Ok(())
    }

    /// Serialize into a binary container with the given weight payload.
    pub fn to_container(&self, payload: &[u8]) -> Result<Vec<u8>, InferenceError> {
        let header = serde_json::to_vec(self)
            .map_err(|e| InferenceError::Parse(format!("cannot encode header: {}", e)))?;
        let mut out = Vec::with_capacity(CONTAINER_PREAMBLE + header.len() + payload.len());
        out.extend_from_slice(CONTAINER_MAGIC);
        out.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        out.extend_from_slice(&(header.len() as u64).to_le_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(payload);
        Ok(out)
    }
}

/// Detect the serialization of `bytes` and decode it.
pub fn decode(bytes: &[u8]) -> Result<DecodedModel<'_>, InferenceError> {
    if bytes.starts_with(CONTAINER_MAGIC) {
        return decode_container(bytes);
    }
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Ok(DecodedModel {
            document: GraphDocument::from_json(bytes)?,
            payload: None,
        }),
        Some(_) if looks_like_onnx(bytes) => decode_onnx(bytes),
        Some(_) => Err(InferenceError::Parse(
            "not a recognized graph serialization".into(),
        )),
        None => Err(InferenceError::Parse("model file is empty".into())),
    }
}

/// A protobuf stream opening with a small `ir_version` varint.
pub fn looks_like_onnx(bytes: &[u8]) -> bool {
    matches!(bytes, [ONNX_LEADING_KEY, version, ..] if (1..0x80).contains(version))
}

#[cfg(feature = "onnx")]
fn decode_onnx(bytes: &[u8]) -> Result<DecodedModel<'_>, InferenceError> {
    Ok(DecodedModel {
        document: super::onnx::decode_model(bytes)?,
        payload: None,
    })
}

#[cfg(not(feature = "onnx"))]
fn decode_onnx(_bytes: &[u8]) -> Result<DecodedModel<'_>, InferenceError> {
    Err(InferenceError::Parse(
        "ONNX model found but this build lacks the onnx feature".into(),
    ))
}

fn decode_container(bytes: &[u8]) -> Result<DecodedModel<'_>, InferenceError> {
    if bytes.len() < CONTAINER_PREAMBLE {
        return Err(InferenceError::Parse("truncated container preamble".into()));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != CONTAINER_VERSION {
        return Err(InferenceError::Parse(format!(
            "unsupported container version {}",
            version
        )));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[8..16]);
    let header_len = usize::try_from(u64::from_le_bytes(len_bytes))
        .map_err(|_| InferenceError::Parse("container header too large".into()))?;
    let header_end = CONTAINER_PREAMBLE
        .checked_add(header_len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| InferenceError::Parse("truncated container header".into()))?;

    let document = GraphDocument::from_json(&bytes[CONTAINER_PREAMBLE..header_end])?;
    Ok(DecodedModel {
        document,
        payload: Some(&bytes[header_end..]),
    })
}

/// Materialize an initializer as f32 values.
pub fn resolve_initializer(
    name: &str,
    def: &InitializerDef,
    payload: Option<&[u8]>,
) -> Result<Vec<f32>, InferenceError> {
    let count = def
        .dims
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .filter(|c| *c > 0)
        .ok_or_else(|| {
            InferenceError::Parse(format!("initializer '{}' has invalid dims {:?}", name, def.dims))
        })?;

    match (&def.data, def.offset) {
        (Some(data), _) => {
            if data.len() != count {
                return Err(InferenceError::Parse(format!(
                    "initializer '{}' declares {} values, has {}",
                    name,
                    count,
                    data.len()
                )));
            }
            Ok(data.clone())
        }
        (None, Some(offset)) => {
            let payload = payload.ok_or_else(|| {
                InferenceError::Parse(format!(
                    "initializer '{}' uses an offset outside a container",
                    name
                ))
            })?;
            read_payload(name, def.dtype, count, offset, payload)
        }
        (None, None) => Err(InferenceError::Parse(format!(
            "initializer '{}' has neither data nor offset",
            name
        ))),
    }
}

fn read_payload(
    name: &str,
    dtype: WeightDType,
    count: usize,
    offset: u64,
    payload: &[u8],
) -> Result<Vec<f32>, InferenceError> {
    let out_of_range =
        || InferenceError::Parse(format!("initializer '{}' exceeds the weight payload", name));
    let start = usize::try_from(offset).map_err(|_| out_of_range())?;
    let end = count
        .checked_mul(dtype.size_bytes())
        .and_then(|len| start.checked_add(len))
        .filter(|end| *end <= payload.len())
        .ok_or_else(out_of_range)?;
    let bytes = &payload[start..end];

    let values = match dtype {
        WeightDType::F32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        WeightDType::F16 => bytes
            .chunks_exact(2)
            .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect(),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "format": "monoinfer-graph",
            "version": 1,
            "nodes": [{ "op": "Relu", "inputs": ["input"], "output": "output" }]
        }"#
    }

    #[test]
    fn test_decode_json_defaults() {
        let decoded = decode(minimal_json().as_bytes()).unwrap();
        assert_eq!(decoded.document.input, "input");
        assert_eq!(decoded.document.output, "output");
        assert!(decoded.payload.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode(b"\x00\x01binary junk").unwrap_err();
        assert!(matches!(err, InferenceError::Parse(_)));
    }

    #[test]
    fn test_onnx_detection() {
        assert!(looks_like_onnx(&[0x08, 0x07, 0x12, 0x00]));
        assert!(!looks_like_onnx(&[0x08]));
        assert!(!looks_like_onnx(&[0x08, 0x00]));
        assert!(!looks_like_onnx(b"{\"format\":1}"));
        assert!(!looks_like_onnx(CONTAINER_MAGIC));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_onnx_needs_feature() {
        let err = decode(&[0x08, 0x07, 0x3a, 0x00]).unwrap_err();
        assert!(matches!(err, InferenceError::Parse(ref m) if m.contains("onnx feature")));
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(decode(b"   \n").unwrap_err(), InferenceError::Parse(_)));
    }

    #[test]
    fn test_wrong_format_tag() {
        let json = minimal_json().replace("monoinfer-graph", "onnx");
        assert!(matches!(
            decode(json.as_bytes()).unwrap_err(),
            InferenceError::Parse(_)
        ));
    }

    #[test]
    fn test_future_version_rejected() {
        let json = minimal_json().replace("\"version\": 1", "\"version\": 9");
        assert!(decode(json.as_bytes()).is_err());
    }

    #[test]
    fn test_container_payload_f16() {
        let mut doc = GraphDocument::from_json(minimal_json().as_bytes()).unwrap();
        doc.initializers.insert(
            "w".into(),
            InitializerDef {
                dims: vec![2],
                dtype: WeightDType::F16,
                data: None,
                offset: Some(0),
            },
        );
        let mut payload = Vec::new();
        payload.extend_from_slice(&f16::from_f32(1.5).to_le_bytes());
        payload.extend_from_slice(&f16::from_f32(-2.0).to_le_bytes());

        let bytes = doc.to_container(&payload).unwrap();
        let decoded = decode(&bytes).unwrap();
        let def = &decoded.document.initializers["w"];
        let values = resolve_initializer("w", def, decoded.payload).unwrap();
        assert_eq!(values, vec![1.5, -2.0]);
    }

    #[test]
    fn test_truncated_container() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(CONTAINER_MAGIC);
        bytes.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        bytes.extend_from_slice(&1000u64.to_le_bytes());
        bytes.extend_from_slice(b"{}");
        assert!(matches!(decode(&bytes).unwrap_err(), InferenceError::Parse(_)));
    }

    #[test]
    fn test_inline_length_mismatch() {
        let def = InitializerDef {
            dims: vec![2, 2],
            dtype: WeightDType::F32,
            data: Some(vec![1.0, 2.0, 3.0]),
            offset: None,
        };
        assert!(resolve_initializer("w", &def, None).is_err());
    }

    #[test]
    fn test_offset_out_of_range() {
        let def = InitializerDef {
            dims: vec![4],
            dtype: WeightDType::F32,
            data: None,
            offset: Some(8),
        };
        let payload = [0u8; 16];
        assert!(resolve_initializer("w", &def, Some(&payload)).is_err());
    }
}
