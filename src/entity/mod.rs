//! Entities
//!
//! An entity is a [`SpawnArgs`] list plus helper objects that observe the
//! keys they care about. Helpers never poll: they subscribe through the
//! entity's [`KeyObserverMap`] and receive the current value immediately and
//! every change after that, including changes made by undo and redo.
//!
//! [`EntityNode`] bundles the helpers every entity has (name tracking,
//! target keys, colour, selection) with one [`EntityKind`] that implements
//! the class-specific behaviour:
//!
//! | kind                 | picked for                          |
//! |----------------------|-------------------------------------|
//! | [`Light`]            | classes deriving from `light`       |
//! | [`StaticGeometry`]   | classes without fixed bounds        |
//! | [`Speaker`]          | `speaker`                           |
//! | [`EclassModel`]      | fixed-size classes with a `model`   |
//! | [`Generic`]          | all other fixed-size classes        |

pub mod angle_key;
pub mod eclass;
pub mod eclass_model;
pub mod factory;
pub mod generic;
pub mod key_observer;
pub mod key_value;
pub mod light;
pub mod name_tracker;
pub mod node;
pub mod origin_key;
pub mod rotation_key;
pub mod spawn_args;
pub mod speaker;
pub mod static_geometry;

pub use angle_key::AngleKey;
pub use eclass::{EntityClass, EntityClassBuilder, EntityClassRegistry};
pub use eclass_model::EclassModel;
pub use factory::EntityContext;
pub use generic::Generic;
pub use key_observer::{KeyObserverMap, KeySubscription};
pub use key_value::{KeyCallback, KeyValue};
pub use light::{Light, LightProjection};
pub use name_tracker::NameTracker;
pub use node::{EntityGeometry, EntityKind, EntityNode};
pub use origin_key::OriginKey;
pub use rotation_key::{RotationKey, RotationMatrix};
pub use spawn_args::{SpawnArgs, SpawnArgsObserver};
pub use speaker::Speaker;
pub use static_geometry::StaticGeometry;

pub(crate) use spawn_args::starts_with_ignore_case;
