//! ONNX Error Types
//!
//! Error types for interchange import/export operations.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use thiserror::Error;

/// Result type for ONNX operations.
pub type OnnxResult<T> = Result<T, OnnxError>;

/// Errors that can occur during interchange operations.
#[derive(Error, Debug)]
pub enum OnnxError {
    /// Failed to read or write a document file.
    #[error("Failed to access ONNX file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse a protobuf document.
    #[error("Failed to parse ONNX protobuf: {0}")]
    ProtobufParse(String),

    /// Failed to parse a JSON document.
    #[error("Failed to parse ONNX JSON: {0}")]
    JsonParse(String),

    /// Unsupported ONNX operator.
    #[error("Unsupported ONNX operator: {0}")]
    UnsupportedOperator(String),

    /// Missing required attribute.
    #[error("Missing required attribute {attribute} on {op_type}")]
    MissingAttribute {
        /// Operator carrying the attribute.
        op_type: String,
        /// Attribute name.
        attribute: String,
    },

    /// Graph validation error.
    #[error("Graph validation error: {0}")]
    GraphValidation(String),

    /// Tensor conversion error.
    #[error("Tensor conversion error: {0}")]
    TensorConversion(String),

    /// Model export error.
    #[error("Model export error: {0}")]
    Export(String),
}

impl From<prost::DecodeError> for OnnxError {
    fn from(err: prost::DecodeError) -> Self {
        OnnxError::ProtobufParse(err.to_string())
    }
}

impl From<serde_json::Error> for OnnxError {
    fn from(err: serde_json::Error) -> Self {
        OnnxError::JsonParse(err.to_string())
    }
}
