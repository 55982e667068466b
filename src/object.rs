//! Spatial audio objects and listeners.

use crate::definition::{Environment, EnvironmentKind, Parameter, SwitchState};
use crate::ids::{EnvironmentId, ListenerId, ObjectId, ParameterId, PathId};
use crate::math::Attributes3d;
use crate::registry::ControlIndex;
use crate::system::{InstanceHandle, StopMode, StudioSystem};
use crate::tracker::EventKey;
use std::collections::HashMap;

/// Snapshot parameter driven by snapshot environments, in percent.
pub const SNAPSHOT_INTENSITY: &str = "Intensity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttachedEvent {
    pub key: EventKey,
    pub instance: InstanceHandle,
    pub path_id: PathId,
}

/// An emitter in the world.
///
/// Remembers every control applied to it so events attached later start with the same
/// state as the ones already playing.
#[derive(Debug)]
pub struct AudioObject {
    id: ObjectId,
    name: Option<String>,
    attributes: Attributes3d,
    events: Vec<AttachedEvent>,
    parameters: HashMap<ParameterId, (Parameter, f32)>,
    switches: HashMap<(PathId, String), SwitchState>,
    environments: HashMap<EnvironmentId, (Environment, f32)>,
    snapshots: HashMap<EnvironmentId, InstanceHandle>,
    obstruction: f32,
    occlusion: f32,
}

impl AudioObject {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            name: None,
            attributes: Attributes3d::default(),
            events: Vec::new(),
            parameters: HashMap::new(),
            switches: HashMap::new(),
            environments: HashMap::new(),
            snapshots: HashMap::new(),
            obstruction: 0.0,
            occlusion: 0.0,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: Option<&str>) {
        self.name = name.map(str::to_string);
    }

    pub fn attributes(&self) -> &Attributes3d {
        &self.attributes
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn has_event(&self, key: EventKey) -> bool {
        self.events.iter().any(|event| event.key == key)
    }

    pub fn parameter_value(&self, id: ParameterId) -> Option<f32> {
        self.parameters.get(&id).map(|(_, value)| *value)
    }

    /// Value of the active state of switch `name` on events of `path_id`.
    pub fn switch_value(&self, path_id: PathId, name: &str) -> Option<f32> {
        self.switches
            .get(&(path_id, name.to_string()))
            .map(SwitchState::value)
    }

    pub fn environment_amount(&self, id: EnvironmentId) -> Option<f32> {
        self.environments.get(&id).map(|(_, amount)| *amount)
    }

    pub fn snapshot_instance(&self, id: EnvironmentId) -> Option<InstanceHandle> {
        self.snapshots.get(&id).copied()
    }

    pub fn obstruction_occlusion(&self) -> (f32, f32) {
        (self.obstruction, self.occlusion)
    }

    pub(crate) fn set_3d_attributes(&mut self, attributes: Attributes3d, system: &dyn StudioSystem) {
        self.attributes = attributes;
        for event in &self.events {
            if let Err(e) = system.set_3d_attributes(event.instance, &attributes) {
                log::warn!("Failed to move event on {}: {}", self.id, e);
            }
        }
    }

    pub(crate) fn set_parameter(
        &mut self,
        parameter: &Parameter,
        value: f32,
        system: &dyn StudioSystem,
        index: &mut ControlIndex,
    ) {
        self.parameters
            .insert(parameter.id(), (parameter.clone(), value));
        for event in self.events_on(parameter.path_id()) {
            apply_parameter(system, index, event.instance, parameter, value);
        }
    }

    pub(crate) fn set_switch(
        &mut self,
        state: &SwitchState,
        system: &dyn StudioSystem,
        index: &mut ControlIndex,
    ) {
        self.switches
            .insert((state.path_id(), state.name().to_string()), state.clone());
        for event in self.events_on(state.path_id()) {
            apply_switch(system, index, event.instance, state);
        }
    }

    pub(crate) fn set_environment(
        &mut self,
        environment: &Environment,
        amount: f32,
        system: &dyn StudioSystem,
    ) {
        match environment.kind() {
            EnvironmentKind::Bus(bus) => {
                for event in &self.events {
                    if let Err(e) = system.set_bus_send(event.instance, bus, amount) {
                        log::warn!("Failed to set reverb send on {}: {}", self.id, e);
                    }
                }
            }
            EnvironmentKind::Snapshot(description) => {
                let instance = match self.snapshots.get(&environment.id()).copied() {
                    Some(instance) => instance,
                    None => match system
                        .create_instance(description)
                        .and_then(|instance| system.start(instance).map(|_| instance))
                    {
                        Ok(instance) => {
                            self.snapshots.insert(environment.id(), instance);
                            instance
                        }
                        Err(e) => {
                            log::warn!("Failed to start environment snapshot on {}: {}", self.id, e);
                            return;
                        }
                    },
                };
                if let Err(e) =
                    system.set_parameter_by_name(instance, SNAPSHOT_INTENSITY, amount * 100.0)
                {
                    log::warn!("Failed to set snapshot intensity on {}: {}", self.id, e);
                }
            }
        }
        self.environments
            .insert(environment.id(), (environment.clone(), amount));
    }

    pub(crate) fn set_obstruction_occlusion(
        &mut self,
        obstruction: f32,
        occlusion: f32,
        system: &dyn StudioSystem,
    ) {
        self.obstruction = obstruction;
        self.occlusion = occlusion;
        for event in &self.events {
            if let Err(e) = system.set_obstruction_occlusion(event.instance, obstruction, occlusion)
            {
                log::warn!("Failed to set occlusion on {}: {}", self.id, e);
            }
        }
    }

    pub(crate) fn remove_parameter(&mut self, id: ParameterId) -> bool {
        self.parameters.remove(&id).is_some()
    }

    pub(crate) fn remove_switch(&mut self, state: &SwitchState) -> bool {
        let before = self.switches.len();
        self.switches.retain(|_, applied| applied.id() != state.id());
        before != self.switches.len()
    }

    pub(crate) fn remove_environment(&mut self, id: EnvironmentId, system: &dyn StudioSystem) -> bool {
        if let Some(instance) = self.snapshots.remove(&id) {
            release_instance(system, instance, StopMode::Immediate);
        }
        self.environments.remove(&id).is_some()
    }

    /// Attaches an instance once the engine made it ready, applies the object's state
    /// and starts it. Returns false while the instance is still being built.
    pub(crate) fn attach_event(
        &mut self,
        key: EventKey,
        instance: InstanceHandle,
        path_id: PathId,
        system: &dyn StudioSystem,
        index: &mut ControlIndex,
    ) -> bool {
        if !system.is_instance_ready(instance) {
            return false;
        }

        if let Err(e) = system.set_3d_attributes(instance, &self.attributes) {
            log::warn!("Failed to position event on {}: {}", self.id, e);
        }
        for (parameter, value) in self.parameters.values() {
            if parameter.path_id() == path_id {
                apply_parameter(system, index, instance, parameter, *value);
            }
        }
        for state in self.switches.values() {
            if state.path_id() == path_id {
                apply_switch(system, index, instance, state);
            }
        }
        for (environment, amount) in self.environments.values() {
            if let EnvironmentKind::Bus(bus) = environment.kind() {
                if let Err(e) = system.set_bus_send(instance, bus, *amount) {
                    log::warn!("Failed to set reverb send on {}: {}", self.id, e);
                }
            }
        }
        if self.obstruction != 0.0 || self.occlusion != 0.0 {
            if let Err(e) = system.set_obstruction_occlusion(instance, self.obstruction, self.occlusion)
            {
                log::warn!("Failed to set occlusion on {}: {}", self.id, e);
            }
        }

        if let Err(e) = system.start(instance) {
            log::error!("Failed to start event on {}: {}", self.id, e);
        }
        log::debug!("Attached {:?} to {}", key, self.id);
        self.events.push(AttachedEvent {
            key,
            instance,
            path_id,
        });
        true
    }

    pub(crate) fn detach_event(&mut self, key: EventKey) -> bool {
        let before = self.events.len();
        self.events.retain(|event| event.key != key);
        before != self.events.len()
    }

    /// Fades out every playing event of `path_id`. Returns whether any was found.
    pub(crate) fn stop_event(&self, path_id: PathId, system: &dyn StudioSystem) -> bool {
        let mut stopped = false;
        for event in self.events_on(path_id) {
            if let Err(e) = system.stop(event.instance, StopMode::AllowFadeout) {
                log::warn!("Failed to stop event on {}: {}", self.id, e);
            }
            stopped = true;
        }
        stopped
    }

    pub(crate) fn stop_all_events(&self, system: &dyn StudioSystem) {
        for event in &self.events {
            if let Err(e) = system.stop(event.instance, StopMode::Immediate) {
                log::warn!("Failed to stop event on {}: {}", self.id, e);
            }
        }
    }

    /// Forgets every applied control. Attached events keep playing.
    pub(crate) fn reset(&mut self, system: &dyn StudioSystem) {
        for (_, instance) in self.snapshots.drain() {
            release_instance(system, instance, StopMode::Immediate);
        }
        self.parameters.clear();
        self.switches.clear();
        self.environments.clear();
        self.obstruction = 0.0;
        self.occlusion = 0.0;
        self.name = None;
    }

    fn events_on(&self, path_id: PathId) -> impl Iterator<Item = &AttachedEvent> + '_ {
        self.events
            .iter()
            .filter(move |event| event.path_id == path_id)
    }
}

fn apply_parameter(
    system: &dyn StudioSystem,
    index: &mut ControlIndex,
    instance: InstanceHandle,
    parameter: &Parameter,
    value: f32,
) {
    let Ok(description) = system.description_of(instance) else {
        return;
    };
    if let Some(slot) = index.parameter_slot(parameter, description, system) {
        if let Err(e) = system.set_parameter_by_index(instance, slot, parameter.scaled(value)) {
            log::warn!("Failed to set parameter {}: {}", parameter.name(), e);
        }
    }
}

fn apply_switch(
    system: &dyn StudioSystem,
    index: &mut ControlIndex,
    instance: InstanceHandle,
    state: &SwitchState,
) {
    let Ok(description) = system.description_of(instance) else {
        return;
    };
    if let Some(slot) = index.switch_slot(state, description, system) {
        if let Err(e) = system.set_parameter_by_index(instance, slot, state.value()) {
            log::warn!("Failed to set switch {}: {}", state.name(), e);
        }
    }
}

pub(crate) fn release_instance(system: &dyn StudioSystem, instance: InstanceHandle, mode: StopMode) {
    if let Err(e) = system
        .stop(instance, mode)
        .and_then(|_| system.release_instance(instance))
    {
        log::warn!("Failed to release instance {:?}: {}", instance, e);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioListener {
    id: ListenerId,
    attributes: Attributes3d,
}

impl AudioListener {
    pub fn new(id: ListenerId) -> Self {
        Self {
            id,
            attributes: Attributes3d::default(),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn attributes(&self) -> &Attributes3d {
        &self.attributes
    }

    pub(crate) fn set_attributes(&mut self, attributes: Attributes3d) {
        self.attributes = attributes;
    }
}
