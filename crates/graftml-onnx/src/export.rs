//! ONNX Export
//!
//! Writes interchange documents as JSON or protobuf.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fs::File;
use std::io::Write;
use std::path::Path;

use prost::Message;

use crate::error::{OnnxError, OnnxResult};
use crate::proto::ModelProto;

// =============================================================================
// Encoding
// =============================================================================

/// On-disk encoding of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Pretty-printed JSON.
    Json,
    /// Protobuf wire format.
    Protobuf,
}

/// Encodes a document to bytes.
pub fn encode_model(proto: &ModelProto, encoding: Encoding) -> OnnxResult<Vec<u8>> {
    match encoding {
        Encoding::Json => serde_json::to_vec_pretty(proto)
            .map_err(|e| OnnxError::Export(format!("Serialization error: {e}"))),
        Encoding::Protobuf => Ok(proto.encode_to_vec()),
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Exports a document to `path`.
///
/// # Example
/// ```ignore
/// use graftml_onnx::{export_model, Encoding};
///
/// export_model(&proto, "model.onnx", Encoding::Protobuf)?;
/// ```
pub fn export_model<P: AsRef<Path>>(proto: &ModelProto, path: P, encoding: Encoding) -> OnnxResult<()> {
    let bytes = encode_model(proto, encoding)?;
    let mut file = File::create(path.as_ref())?;
    file.write_all(&bytes)?;
    file.flush()?;
    tracing::debug!(
        path = %path.as_ref().display(),
        bytes = bytes.len(),
        ?encoding,
        "wrote interchange document"
    );
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::import_model;
    use crate::proto::{AttributeProto, GraphProto, NodeProto, TensorProto, ValueInfoProto};

    fn scaled_model() -> ModelProto {
        ModelProto::new(GraphProto {
            name: "scaled".to_string(),
            input: vec![ValueInfoProto::tensor("x"), ValueInfoProto::tensor("w")],
            output: vec![ValueInfoProto::tensor("y")],
            initializer: vec![TensorProto::float("w", &[2], vec![0.5, -1.5])],
            node: vec![NodeProto::new("Scale", &["x".to_string()], "y")
                .with_attribute(AttributeProto::float("alpha", 2.0))],
        })
    }

    #[test]
    fn test_export_then_import_both_encodings() {
        let dir = tempfile::tempdir().unwrap();
        for encoding in [Encoding::Json, Encoding::Protobuf] {
            let path = dir.path().join(format!("{encoding:?}.onnx"));
            export_model(&scaled_model(), &path, encoding).unwrap();
            let loaded = import_model(&path).unwrap();
            assert_eq!(loaded, scaled_model());
        }
    }

    #[test]
    fn test_json_encoding_is_text() {
        let bytes = encode_model(&scaled_model(), Encoding::Json).unwrap();
        assert_eq!(bytes.first(), Some(&b'{'));
        let binary = encode_model(&scaled_model(), Encoding::Protobuf).unwrap();
        assert_ne!(binary.first(), Some(&b'{'));
    }
}
