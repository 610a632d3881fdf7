//! Editor geometry primitives.
//!
//! All editing math runs in double precision: spawnargs are persisted as
//! decimal text and must survive many read/write cycles unchanged.

pub mod aabb;
pub mod convert;
pub mod line;

pub use aabb::Aabb;
pub use convert::{
    clean_float, format_float, format_vec3, parse_float, parse_floats, parse_vec3, snap_float, snap_vec3,
};
pub use line::{Line, Plane3, Ray};
