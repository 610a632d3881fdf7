//! Error Types
//!
//! This module defines the error types returned at the scene-graph boundary.
//!
//! # Overview
//!
//! Only structural problems surface as [`MapError`]:
//! - Unknown entity classes requested by map data
//! - Stale or foreign node handles
//! - Hierarchy edits that would corrupt the tree
//! - Capability mismatches (asking a light for its curves)
//!
//! Malformed spawnarg values are never errors; they parse to well-defined
//! defaults. Local invariant violations (removing too many curve points,
//! self-targeting) are logged and leave the model untouched.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mapcore::errors::{MapError, Result};
//!
//! fn spawn(map: &mut MapRoot) -> Result<()> {
//!     let light = map.add_entity("light")?;
//!     map.spawn_args(light)?.set_key_value("origin", "0 0 64");
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::scene::NodeHandle;

/// The main error type of the map core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    // ========================================================================
    // Entity Class Errors
    // ========================================================================
    /// The requested entity class is not registered.
    #[error("Entity class not found: {0}")]
    EntityClassNotFound(String),

    // ========================================================================
    // Scene Graph Errors
    // ========================================================================
    /// The handle does not refer to a live node of this map.
    #[error("Invalid node handle: {0:?}")]
    InvalidNode(NodeHandle),

    /// The operation is not permitted on the map root node.
    #[error("Operation not permitted on the map root")]
    RootNode,

    /// Attaching the node would make it its own ancestor.
    #[error("Cannot attach {child:?} below {parent:?}: would create a cycle")]
    CyclicAttach {
        parent: NodeHandle,
        child: NodeHandle,
    },

    /// The node cannot own child nodes.
    #[error("Node {0:?} cannot hold children")]
    NotAContainer(NodeHandle),

    /// The node is not an entity.
    #[error("Node {0:?} is not an entity")]
    NotAnEntity(NodeHandle),

    /// The node does not implement the requested capability.
    #[error("Node {node:?} does not support {capability}")]
    MissingCapability {
        node: NodeHandle,
        capability: &'static str,
    },
}

/// Alias for `Result<T, MapError>`.
pub type Result<T> = std::result::Result<T, MapError>;
