#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Scene-graph entity, transform and selection core for id Tech 4 level editing.
//!
//! The crate models a map as an arena of nodes owned by a [`MapRoot`]. Entities
//! carry ordered spawnargs with class fallbacks and change observers; helper
//! objects (origin, rotation, curves, names, targets) subscribe to the keys they
//! care about and keep derived state current under editing, undo and redo.

pub mod curve;
pub mod entity;
pub mod errors;
pub mod math;
pub mod namespace;
pub mod render;
pub mod scene;
pub mod selection;
pub mod settings;
pub mod sound;
pub mod target;
pub mod transform;
pub mod undo;

pub use curve::{Curve, CurveEditInstance, CurveKind};
pub use entity::{
    EntityClass, EntityClassRegistry, EntityKind, EntityNode, KeySubscription, KeyValue, SpawnArgs,
};
pub use errors::{MapError, Result};
pub use math::Aabb;
pub use namespace::Namespace;
pub use scene::{MapRoot, Node, NodeHandle, NodeKind, SceneEntity};
pub use selection::{DragPlanes, ObservedSelectable, SelectionPool, Selector};
pub use settings::EntitySettings;
pub use target::TargetManager;
pub use transform::{TransformDelta, TransformKind, Transformable};
pub use undo::UndoSystem;
