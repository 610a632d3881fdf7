use std::fmt;
use std::rc::Rc;

use super::eclass::EntityClass;
use super::node::EntityNode;
use super::spawn_args::SpawnArgs;
use crate::settings::{DEFAULT_CURVE_SUBDIVISIONS, EntitySettings};
use crate::sound::SoundManager;

/// Services entities are wired to when they are created.
#[derive(Clone)]
pub struct EntityContext {
    pub curve_subdivisions: usize,
    pub sound_manager: Option<Rc<dyn SoundManager>>,
}

impl Default for EntityContext {
    fn default() -> Self {
        Self {
            curve_subdivisions: DEFAULT_CURVE_SUBDIVISIONS,
            sound_manager: None,
        }
    }
}

impl EntityContext {
    #[must_use]
    pub fn from_settings(settings: &EntitySettings) -> Self {
        Self {
            curve_subdivisions: settings.curve_subdivisions,
            sound_manager: None,
        }
    }

    #[must_use]
    pub fn with_sound_manager(mut self, sound_manager: Rc<dyn SoundManager>) -> Self {
        self.sound_manager = Some(sound_manager);
        self
    }

    /// A new entity of class `eclass` with the `classname` key set.
    #[must_use]
    pub fn create_entity(&self, eclass: Rc<EntityClass>) -> EntityNode {
        let classname = eclass.name().to_owned();
        let spawn_args = SpawnArgs::new(eclass);
        spawn_args.set_key_value("classname", &classname);
        EntityNode::new(spawn_args, self)
    }
}

impl fmt::Debug for EntityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityContext")
            .field("curve_subdivisions", &self.curve_subdivisions)
            .field("sound_manager", &self.sound_manager.is_some())
            .finish()
    }
}
