use crate::definition::{Parameter, SwitchState};
use crate::ids::{ObjectId, ParameterId, SwitchStateId};
use crate::object::AudioObject;
use crate::system::{DescriptionHandle, StudioSystem};
use std::collections::HashMap;

/// Objects that receive broadcasts addressed to [`ObjectId::GLOBAL`].
///
/// Holds ids only. The objects themselves belong to the adapter's object table and are
/// unregistered before they are deleted.
#[derive(Debug, Default)]
pub struct AudioObjectRegistry {
    registered: Vec<ObjectId>,
}

impl AudioObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ObjectId) -> bool {
        if self.registered.contains(&id) {
            log::warn!("Trying to register an already registered audio object ({})", id);
            return false;
        }
        self.registered.push(id);
        true
    }

    pub fn unregister(&mut self, id: ObjectId) -> bool {
        match self.registered.iter().position(|registered| *registered == id) {
            Some(index) => {
                self.registered.remove(index);
                true
            }
            None => {
                log::warn!("Trying to unregister a non-existing audio object ({})", id);
                false
            }
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.registered.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    pub fn ids(&self) -> &[ObjectId] {
        &self.registered
    }

    /// Applies `f` to every registered object and returns how many were visited.
    pub fn for_each_registered(
        &self,
        objects: &mut HashMap<ObjectId, AudioObject>,
        mut f: impl FnMut(&mut AudioObject),
    ) -> usize {
        let mut visited = 0;
        for id in &self.registered {
            match objects.get_mut(id) {
                Some(object) => {
                    f(object);
                    visited += 1;
                }
                None => log::error!("Registered audio object {} no longer exists", id),
            }
        }
        visited
    }
}

/// Position of a parameter inside its event definition, resolved by name on first use.
///
/// Keyed by the control's id. Every control belongs to exactly one event path, so one
/// slot per control is enough.
#[derive(Debug, Default)]
pub struct ControlIndex {
    parameters: HashMap<ParameterId, usize>,
    switches: HashMap<SwitchStateId, usize>,
}

impl ControlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn parameter_slot(
        &mut self,
        parameter: &Parameter,
        description: DescriptionHandle,
        system: &dyn StudioSystem,
    ) -> Option<usize> {
        if let Some(slot) = self.parameters.get(&parameter.id()) {
            return Some(*slot);
        }
        let slot = resolve_slot(system, description, parameter.name())?;
        self.parameters.insert(parameter.id(), slot);
        Some(slot)
    }

    pub(crate) fn switch_slot(
        &mut self,
        state: &SwitchState,
        description: DescriptionHandle,
        system: &dyn StudioSystem,
    ) -> Option<usize> {
        if let Some(slot) = self.switches.get(&state.id()) {
            return Some(*slot);
        }
        let slot = resolve_slot(system, description, state.name())?;
        self.switches.insert(state.id(), slot);
        Some(slot)
    }

    pub fn forget_parameter(&mut self, id: ParameterId) -> bool {
        self.parameters.remove(&id).is_some()
    }

    pub fn forget_switch(&mut self, id: SwitchStateId) -> bool {
        self.switches.remove(&id).is_some()
    }

    pub fn cached_parameters(&self) -> usize {
        self.parameters.len()
    }

    pub fn cached_switches(&self) -> usize {
        self.switches.len()
    }
}

fn resolve_slot(
    system: &dyn StudioSystem,
    description: DescriptionHandle,
    name: &str,
) -> Option<usize> {
    match system.parameter_index(description, name) {
        Ok(slot) => Some(slot),
        Err(e) => {
            log::warn!("Unknown event parameter '{}': {}", name, e);
            None
        }
    }
}
