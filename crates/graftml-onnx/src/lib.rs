//! Graftml ONNX - Graph Interchange Format
//!
//! An ONNX-shaped interchange document describing a dataflow graph:
//! named inputs and outputs, operator nodes wired by value name, and
//! initializers. Documents can be written as JSON (readable, used by the
//! tracing translator) or as protobuf (compact, used by the export
//! translator). The importer detects the encoding from the first byte.
//!
//! # Example
//! ```ignore
//! use graftml_onnx::{export_model, import_model, Encoding};
//!
//! export_model(&proto, "model.onnx", Encoding::Protobuf)?;
//! let loaded = import_model("model.onnx")?;
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod export;
pub mod parser;
pub mod proto;

pub use error::{OnnxError, OnnxResult};
pub use export::{encode_model, export_model, Encoding};
pub use parser::{import_model, import_model_bytes};
pub use proto::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
    ValueInfoProto,
};

/// Operator set version written into exported documents.
pub const SUPPORTED_OPSET_VERSION: i64 = 17;

/// Interchange IR version.
pub const ONNX_IR_VERSION: i64 = 8;

/// Producer name written into exported documents.
pub const PRODUCER_NAME: &str = "graftml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert!(SUPPORTED_OPSET_VERSION > 0);
        assert!(ONNX_IR_VERSION > 0);
        assert_eq!(PRODUCER_NAME, "graftml");
    }
}
