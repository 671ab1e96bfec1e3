//! Error types for graph operations

/// Errors raised when duplicating a graph object
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloneError {
    /// Texture wraps a GPU handle imported from outside the graph
    #[error("texture wraps imported handle {handle:#x} and cannot be duplicated")]
    ImportedHandle { handle: u64 },
}
