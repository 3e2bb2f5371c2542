//! ONNX Protocol Buffer Definitions
//!
//! Message structures for interchange documents. Each message derives both
//! `prost::Message` (protobuf wire format, ONNX field numbers) and serde
//! (JSON form), so the same structure backs both encodings.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use serde::{Deserialize, Serialize};

use crate::{ONNX_IR_VERSION, PRODUCER_NAME, SUPPORTED_OPSET_VERSION};

// =============================================================================
// Constants
// =============================================================================

/// `ValueInfoProto::kind` for a dense tensor.
pub const KIND_TENSOR: i32 = 0;
/// `ValueInfoProto::kind` for a sequence of values.
pub const KIND_SEQUENCE: i32 = 1;
/// `ValueInfoProto::kind` for a value whose kind is only known at run time.
pub const KIND_ANY: i32 = 2;

/// `TensorProto::data_type` for 32-bit floats.
pub const DATA_TYPE_FLOAT: i32 = 1;

/// `AttributeProto::type` for a float attribute.
pub const ATTRIBUTE_FLOAT: i32 = 1;
/// `AttributeProto::type` for an integer attribute.
pub const ATTRIBUTE_INT: i32 = 2;

// =============================================================================
// Tensor
// =============================================================================

/// A serialized tensor (initializer).
#[derive(Clone, PartialEq, Serialize, Deserialize, prost::Message)]
#[serde(default)]
pub struct TensorProto {
    /// Dimensions.
    #[prost(int64, repeated, tag = "1")]
    pub dims: Vec<i64>,
    /// Element type.
    #[prost(int32, tag = "2")]
    pub data_type: i32,
    /// Float payload, row-major.
    #[prost(float, repeated, tag = "4")]
    pub float_data: Vec<f32>,
    /// Tensor name.
    #[prost(string, tag = "8")]
    pub name: String,
}

impl TensorProto {
    /// Creates a float tensor.
    pub fn float(name: &str, dims: &[usize], data: Vec<f32>) -> Self {
        Self {
            dims: dims.iter().map(|&d| d as i64).collect(),
            data_type: DATA_TYPE_FLOAT,
            float_data: data,
            name: name.to_string(),
        }
    }

    /// Dimensions as `usize`, or `None` if any is negative.
    pub fn shape(&self) -> Option<Vec<usize>> {
        self.dims.iter().map(|&d| usize::try_from(d).ok()).collect()
    }

    /// Number of elements implied by the dimensions.
    pub fn numel(&self) -> usize {
        self.shape().map_or(0, |s| s.iter().product())
    }
}

// =============================================================================
// Attribute
// =============================================================================

/// A named operator attribute.
#[derive(Clone, PartialEq, Serialize, Deserialize, prost::Message)]
#[serde(default)]
pub struct AttributeProto {
    /// Attribute name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Float value.
    #[prost(float, tag = "2")]
    pub f: f32,
    /// Integer value.
    #[prost(int64, tag = "3")]
    pub i: i64,
    /// Attribute type.
    #[prost(int32, tag = "20")]
    pub r#type: i32,
}

impl AttributeProto {
    /// Creates an integer attribute.
    pub fn int(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            i: value,
            r#type: ATTRIBUTE_INT,
            ..Default::default()
        }
    }

    /// Creates a float attribute.
    pub fn float(name: &str, value: f32) -> Self {
        Self {
            name: name.to_string(),
            f: value,
            r#type: ATTRIBUTE_FLOAT,
            ..Default::default()
        }
    }
}

// =============================================================================
// Node (Operator)
// =============================================================================

/// A node in the computation graph (operator).
#[derive(Clone, PartialEq, Serialize, Deserialize, prost::Message)]
#[serde(default)]
pub struct NodeProto {
    /// Input value names.
    #[prost(string, repeated, tag = "1")]
    pub input: Vec<String>,
    /// Output value names.
    #[prost(string, repeated, tag = "2")]
    pub output: Vec<String>,
    /// Node name (optional, for debugging).
    #[prost(string, tag = "3")]
    pub name: String,
    /// Operator type (e.g., "Gemm", "Relu").
    #[prost(string, tag = "4")]
    pub op_type: String,
    /// Operator attributes.
    #[prost(message, repeated, tag = "5")]
    pub attribute: Vec<AttributeProto>,
}

impl NodeProto {
    /// Creates a node with one output.
    pub fn new(op_type: &str, inputs: &[String], output: &str) -> Self {
        Self {
            input: inputs.to_vec(),
            output: vec![output.to_string()],
            op_type: op_type.to_string(),
            ..Default::default()
        }
    }

    /// Builder: add an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeProto) -> Self {
        self.attribute.push(attribute);
        self
    }

    /// Gets an attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeProto> {
        self.attribute.iter().find(|a| a.name == name)
    }

    /// Gets an integer attribute by name.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get_attribute(name)
            .filter(|a| a.r#type == ATTRIBUTE_INT)
            .map(|a| a.i)
    }

    /// Gets a float attribute by name.
    pub fn get_float(&self, name: &str) -> Option<f32> {
        self.get_attribute(name)
            .filter(|a| a.r#type == ATTRIBUTE_FLOAT)
            .map(|a| a.f)
    }
}

// =============================================================================
// Value Info
// =============================================================================

/// Declares a graph input or output.
#[derive(Clone, PartialEq, Serialize, Deserialize, prost::Message)]
#[serde(default)]
pub struct ValueInfoProto {
    /// Value name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Value kind (`KIND_TENSOR` or `KIND_SEQUENCE`).
    #[prost(int32, tag = "2")]
    pub kind: i32,
}

impl ValueInfoProto {
    /// Declares a tensor value.
    pub fn tensor(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: KIND_TENSOR,
        }
    }

    /// Declares a sequence value.
    pub fn sequence(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: KIND_SEQUENCE,
        }
    }

    /// Returns true for sequence values.
    pub fn is_sequence(&self) -> bool {
        self.kind == KIND_SEQUENCE
    }
}

// =============================================================================
// Graph
// =============================================================================

/// A computation graph.
#[derive(Clone, PartialEq, Serialize, Deserialize, prost::Message)]
#[serde(default)]
pub struct GraphProto {
    /// Nodes in evaluation order.
    #[prost(message, repeated, tag = "1")]
    pub node: Vec<NodeProto>,
    /// Graph name.
    #[prost(string, tag = "2")]
    pub name: String,
    /// Initializers (weights/constants).
    #[prost(message, repeated, tag = "5")]
    pub initializer: Vec<TensorProto>,
    /// Graph inputs.
    #[prost(message, repeated, tag = "11")]
    pub input: Vec<ValueInfoProto>,
    /// Graph outputs.
    #[prost(message, repeated, tag = "12")]
    pub output: Vec<ValueInfoProto>,
}

impl GraphProto {
    /// Gets an initializer by name.
    pub fn get_initializer(&self, name: &str) -> Option<&TensorProto> {
        self.initializer.iter().find(|t| t.name == name)
    }
}

// =============================================================================
// Model
// =============================================================================

/// Operator set identifier.
#[derive(Clone, PartialEq, Serialize, Deserialize, prost::Message)]
#[serde(default)]
pub struct OperatorSetIdProto {
    /// Operator domain (empty for the default domain).
    #[prost(string, tag = "1")]
    pub domain: String,
    /// Operator set version.
    #[prost(int64, tag = "2")]
    pub version: i64,
}

/// Top-level interchange document.
#[derive(Clone, PartialEq, Serialize, Deserialize, prost::Message)]
#[serde(default)]
pub struct ModelProto {
    /// IR version.
    #[prost(int64, tag = "1")]
    pub ir_version: i64,
    /// Producer name.
    #[prost(string, tag = "2")]
    pub producer_name: String,
    /// Producer version.
    #[prost(string, tag = "3")]
    pub producer_version: String,
    /// The graph.
    #[prost(message, optional, tag = "7")]
    pub graph: Option<GraphProto>,
    /// Operator sets used.
    #[prost(message, repeated, tag = "8")]
    pub opset_import: Vec<OperatorSetIdProto>,
}

impl ModelProto {
    /// Wraps a graph in a document stamped with this producer.
    pub fn new(graph: GraphProto) -> Self {
        Self {
            ir_version: ONNX_IR_VERSION,
            producer_name: PRODUCER_NAME.to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            graph: Some(graph),
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: SUPPORTED_OPSET_VERSION,
            }],
        }
    }

    /// Returns the opset version for the default domain.
    pub fn opset_version(&self) -> i64 {
        self.opset_import
            .iter()
            .find(|o| o.domain.is_empty())
            .map_or(SUPPORTED_OPSET_VERSION, |o| o.version)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_proto() {
        let t = TensorProto::float("w", &[2, 3], vec![0.0; 6]);
        assert_eq!(t.shape(), Some(vec![2, 3]));
        assert_eq!(t.numel(), 6);
        assert_eq!(t.data_type, DATA_TYPE_FLOAT);
    }

    #[test]
    fn test_node_attributes() {
        let node = NodeProto::new("SequenceAt", &["xs".to_string()], "x0")
            .with_attribute(AttributeProto::int("index", 1))
            .with_attribute(AttributeProto::float("alpha", 0.5));
        assert_eq!(node.get_int("index"), Some(1));
        assert_eq!(node.get_float("alpha"), Some(0.5));
        assert_eq!(node.get_int("alpha"), None);
        assert!(node.get_attribute("missing").is_none());
    }

    #[test]
    fn test_model_defaults() {
        let model = ModelProto::new(GraphProto::default());
        assert_eq!(model.ir_version, ONNX_IR_VERSION);
        assert_eq!(model.opset_version(), SUPPORTED_OPSET_VERSION);
        assert!(ValueInfoProto::sequence("xs").is_sequence());
        assert!(!ValueInfoProto::tensor("x").is_sequence());
    }
}
