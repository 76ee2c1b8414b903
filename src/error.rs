//! Errors raised while wiring or configuring a runtime circuit.
//!
//! The per-sample path never fails; these only surface from [`crate::circuit`]
//! builders and setters and from [`crate::config`] validation.

use thiserror::Error;

use crate::circuit::NodeId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WdfError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {child} is already connected to parent {parent}")]
    AlreadyConnected { child: NodeId, parent: NodeId },
    #[error("node {0} is a root and cannot be connected below another node")]
    RootAsChild(NodeId),
    #[error("{operation} is not supported by node {node} ({kind})")]
    Unsupported {
        node: NodeId,
        kind: &'static str,
        operation: &'static str,
    },
    #[error("scattering matrix has {got} entries, expected {expected}")]
    MatrixSize { expected: usize, got: usize },
    #[error("adaptor needs at least one child port")]
    NoPorts,
    #[error("up port index {index} out of range for {ports} ports")]
    UpPortOutOfRange { index: usize, ports: usize },
    #[error("invalid {name}: {value}")]
    InvalidValue { name: &'static str, value: f64 },
}

pub type Result<T, E = WdfError> = std::result::Result<T, E>;
