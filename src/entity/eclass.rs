//! Entity classes
//!
//! An [`EntityClass`] is the immutable template an entity is created from:
//! default spawnarg values, editor colour and, for point entities, the fixed
//! bounding box. Classes inherit attributes from an optional parent.
//!
//! The [`EntityClassRegistry`] belongs to one map root and is shared by `Rc`
//! with every entity created in it.

use std::rc::Rc;

use glam::DVec3;
use rustc_hash::FxHashMap;

use crate::math::{Aabb, parse_vec3};

/// Fallback wireframe colour of entities without `editor_color`.
pub const DEFAULT_ENTITY_COLOUR: DVec3 = DVec3::new(0.3, 0.3, 1.0);

#[derive(Debug, Clone)]
pub struct EntityClass {
    name: String,
    parent: Option<Rc<EntityClass>>,
    /// (lowercased key, key, value) in declaration order.
    attributes: Vec<(String, String, String)>,
    colour: Option<DVec3>,
    bounds: Option<Aabb>,
}

impl EntityClass {
    #[must_use]
    pub fn builder(name: &str) -> EntityClassBuilder {
        EntityClassBuilder {
            class: EntityClass {
                name: name.to_owned(),
                parent: None,
                attributes: Vec::new(),
                colour: None,
                bounds: None,
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Rc<EntityClass>> {
        self.parent.as_ref()
    }

    /// Default value of `key`, searching the parent chain. Empty if no
    /// class declares it.
    #[must_use]
    pub fn attribute_value(&self, key: &str) -> &str {
        self.find_attribute(key).unwrap_or("")
    }

    fn find_attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(lower, _, _)| lower.eq_ignore_ascii_case(key))
            .map(|(_, _, value)| value.as_str())
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.find_attribute(key)))
    }

    /// Visits the effective attributes, own declarations first. Overridden
    /// parent attributes are skipped.
    pub fn for_each_attribute(&self, mut visit: impl FnMut(&str, &str)) {
        let mut seen: Vec<&str> = Vec::new();
        let mut class = Some(self);
        while let Some(current) = class {
            for (lower, key, value) in &current.attributes {
                if !seen.contains(&lower.as_str()) {
                    seen.push(lower);
                    visit(key, value);
                }
            }
            class = current.parent.as_deref();
        }
    }

    /// True if this class or any ancestor is called `name`.
    #[must_use]
    pub fn is_of_type(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.parent.as_ref().is_some_and(|parent| parent.is_of_type(name))
    }

    #[must_use]
    pub fn is_light(&self) -> bool {
        self.is_of_type("light")
    }

    /// Point entities have a fixed size; everything else owns brushes.
    #[must_use]
    pub fn is_fixed_size(&self) -> bool {
        self.bounds().is_some()
    }

    /// Local bounds of fixed-size classes.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.bounds()))
    }

    #[must_use]
    pub fn colour(&self) -> DVec3 {
        self.colour
            .or_else(|| self.parent.as_ref().map(|parent| parent.colour()))
            .unwrap_or(DEFAULT_ENTITY_COLOUR)
    }
}

pub struct EntityClassBuilder {
    class: EntityClass,
}

impl EntityClassBuilder {
    #[must_use]
    pub fn parent(mut self, parent: &Rc<EntityClass>) -> Self {
        self.class.parent = Some(parent.clone());
        self
    }

    /// Declares a default spawnarg. `editor_color`, `editor_mins` and
    /// `editor_maxs` additionally drive colour and bounds.
    #[must_use]
    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        let lower = key.to_ascii_lowercase();
        if lower == "editor_color" {
            self.class.colour = parse_vec3(value);
        }
        if let Some(existing) = self.class.attributes.iter_mut().find(|(l, _, _)| *l == lower) {
            existing.2 = value.to_owned();
        } else {
            self.class.attributes.push((lower, key.to_owned(), value.to_owned()));
        }
        self
    }

    #[must_use]
    pub fn colour(mut self, colour: DVec3) -> Self {
        self.class.colour = Some(colour);
        self
    }

    /// Makes the class fixed-size.
    #[must_use]
    pub fn bounds(mut self, mins: DVec3, maxs: DVec3) -> Self {
        self.class.bounds = Some(Aabb::from_min_max(mins, maxs));
        self
    }

    #[must_use]
    pub fn build(mut self) -> Rc<EntityClass> {
        if self.class.bounds.is_none() {
            let mins = self.class.find_attribute("editor_mins").and_then(parse_vec3);
            let maxs = self.class.find_attribute("editor_maxs").and_then(parse_vec3);
            if let (Some(mins), Some(maxs)) = (mins, maxs) {
                self.class.bounds = Some(Aabb::from_min_max(mins, maxs));
            }
        }
        Rc::new(self.class)
    }
}

/// Class lookup of one map, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct EntityClassRegistry {
    classes: FxHashMap<String, Rc<EntityClass>>,
}

impl EntityClassRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the stock classes of a Doom 3 map.
    #[must_use]
    pub fn with_builtin_classes() -> Self {
        let mut registry = Self::new();

        registry.insert(
            EntityClass::builder("worldspawn")
                .colour(DVec3::new(0.0, 0.0, 0.0))
                .build(),
        );
        registry.insert(
            EntityClass::builder("func_static")
                .attribute("editor_usage", "A brush model that just sits there.")
                .build(),
        );
        registry.insert(
            EntityClass::builder("light")
                .colour(DVec3::new(0.0, 1.0, 0.0))
                .bounds(DVec3::splat(-8.0), DVec3::splat(8.0))
                .attribute("light_radius", "320 320 320")
                .build(),
        );
        registry.insert(
            EntityClass::builder("speaker")
                .colour(DVec3::new(0.0, 1.0, 0.0))
                .bounds(DVec3::splat(-8.0), DVec3::splat(8.0))
                .build(),
        );
        registry.insert(
            EntityClass::builder("info_player_start")
                .colour(DVec3::new(1.0, 0.0, 0.0))
                .bounds(DVec3::new(-16.0, -16.0, 0.0), DVec3::new(16.0, 16.0, 74.0))
                .build(),
        );
        registry.insert(
            EntityClass::builder("item_medkit")
                .colour(DVec3::new(0.3, 0.3, 1.0))
                .bounds(DVec3::new(-16.0, -16.0, 0.0), DVec3::new(16.0, 16.0, 16.0))
                .attribute("model", "models/items/medkit/medkit.lwo")
                .build(),
        );
        registry.insert(
            EntityClass::builder("path_corner")
                .colour(DVec3::new(0.5, 0.3, 0.0))
                .bounds(DVec3::splat(-4.0), DVec3::splat(4.0))
                .attribute("editor_rotatable", "1")
                .build(),
        );

        registry
    }

    pub fn insert(&mut self, class: Rc<EntityClass>) {
        self.classes.insert(class.name().to_ascii_lowercase(), class);
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<Rc<EntityClass>> {
        self.classes.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Looks up `name`, registering an empty brush-entity class for names
    /// the map data uses but no definition provides.
    pub fn find_or_create_default(&mut self, name: &str) -> Rc<EntityClass> {
        if let Some(class) = self.find(name) {
            return class;
        }
        log::warn!("Entity class '{name}' not found, creating a default class");
        let class = EntityClass::builder(name).build();
        self.insert(class.clone());
        class
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
