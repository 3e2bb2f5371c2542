//! ONNX Parser
//!
//! Reads interchange documents from disk or memory. JSON documents start
//! with `{`; anything else is decoded as protobuf.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use prost::Message;

use crate::error::{OnnxError, OnnxResult};
use crate::proto::ModelProto;

// =============================================================================
// Public API
// =============================================================================

/// Imports a document from a file path.
///
/// # Example
/// ```ignore
/// use graftml_onnx::import_model;
///
/// let model = import_model("model.onnx")?;
/// println!("nodes: {}", model.graph.map_or(0, |g| g.node.len()));
/// ```
pub fn import_model<P: AsRef<Path>>(path: P) -> OnnxResult<ModelProto> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "reading interchange document");
    import_model_bytes(&bytes)
}

/// Imports a document from raw bytes.
pub fn import_model_bytes(bytes: &[u8]) -> OnnxResult<ModelProto> {
    let proto = parse_model_proto(bytes)?;
    validate_model(&proto)?;
    Ok(proto)
}

// =============================================================================
// Parsing
// =============================================================================

fn parse_model_proto(bytes: &[u8]) -> OnnxResult<ModelProto> {
    if bytes.starts_with(b"{") {
        Ok(serde_json::from_slice(bytes)?)
    } else {
        Ok(ModelProto::decode(bytes)?)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Checks that a document has a graph and that every node input and graph
/// output names a value that is defined before it is used.
fn validate_model(proto: &ModelProto) -> OnnxResult<()> {
    let graph = proto
        .graph
        .as_ref()
        .ok_or_else(|| OnnxError::GraphValidation("document has no graph".to_string()))?;

    let mut defined: HashSet<&str> = graph.input.iter().map(|v| v.name.as_str()).collect();
    defined.extend(graph.initializer.iter().map(|t| t.name.as_str()));

    for node in &graph.node {
        if node.output.len() != 1 {
            return Err(OnnxError::GraphValidation(format!(
                "{} node must have exactly one output, has {}",
                node.op_type,
                node.output.len()
            )));
        }
        for input in &node.input {
            if !defined.contains(input.as_str()) {
                return Err(OnnxError::GraphValidation(format!(
                    "{} node uses undefined value '{input}'",
                    node.op_type
                )));
            }
        }
        defined.extend(node.output.iter().map(String::as_str));
    }

    for output in &graph.output {
        if !defined.contains(output.name.as_str()) {
            return Err(OnnxError::GraphValidation(format!(
                "graph output '{}' is never defined",
                output.name
            )));
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{GraphProto, NodeProto, ValueInfoProto};

    fn relu_model() -> ModelProto {
        ModelProto::new(GraphProto {
            name: "relu".to_string(),
            input: vec![ValueInfoProto::tensor("x")],
            output: vec![ValueInfoProto::tensor("y")],
            node: vec![NodeProto::new("Relu", &["x".to_string()], "y")],
            ..Default::default()
        })
    }

    #[test]
    fn test_parse_json() {
        let bytes = serde_json::to_vec(&relu_model()).unwrap();
        let parsed = import_model_bytes(&bytes).unwrap();
        assert_eq!(parsed, relu_model());
    }

    #[test]
    fn test_parse_protobuf() {
        let bytes = relu_model().encode_to_vec();
        let parsed = import_model_bytes(&bytes).unwrap();
        assert_eq!(parsed, relu_model());
    }

    #[test]
    fn test_missing_graph_rejected() {
        let bytes = serde_json::to_vec(&ModelProto::default()).unwrap();
        assert!(matches!(
            import_model_bytes(&bytes),
            Err(OnnxError::GraphValidation(_))
        ));
    }

    #[test]
    fn test_undefined_value_rejected() {
        let mut model = relu_model();
        if let Some(graph) = model.graph.as_mut() {
            graph.node[0].input = vec!["nope".to_string()];
        }
        let bytes = model.encode_to_vec();
        let err = import_model_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(import_model_bytes(b"{not json").is_err());
        assert!(import_model_bytes(&[0xff, 0xff, 0xff]).is_err());
    }
}
