//! Scripted in-process engine used by the unit tests.
//!
//! Instances become ready on the first `update()` after their creation, the way a real
//! engine builds signal chains during its tick. Callbacks are only fired when a test asks
//! for it, optionally from a separate thread.

use super::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct MockInstance {
    pub description: DescriptionHandle,
    pub callback: Option<(Arc<InstanceCallback>, CallbackMask)>,
    pub ready: bool,
    pub started: bool,
    pub stopped: Option<StopMode>,
    pub released: bool,
    pub attributes: Option<Attributes3d>,
    pub parameters: HashMap<usize, f32>,
    pub named_parameters: HashMap<String, f32>,
    pub sends: HashMap<BusHandle, f32>,
    pub obstruction_occlusion: Option<(f32, f32)>,
    pub programmer_sound: Option<SoundHandle>,
}

pub(crate) struct MockBank {
    pub size: usize,
    pub state: LoadingState,
    pub unload_polls: usize,
    pub buses: Vec<BusHandle>,
    pub memory: Option<Arc<[u8]>>,
}

#[derive(Default)]
pub(crate) struct MockState {
    next_handle: u64,
    pub initialized: Option<InitSettings>,
    pub released: bool,
    pub updates: usize,
    guids: HashMap<String, Guid>,
    descriptions: HashMap<Guid, DescriptionHandle>,
    buses: HashMap<Guid, BusHandle>,
    streamed: HashSet<DescriptionHandle>,
    parameter_slots: HashMap<(DescriptionHandle, String), usize>,
    pub parameter_lookups: usize,
    pub instances: HashMap<InstanceHandle, MockInstance>,
    pub instance_order: Vec<InstanceHandle>,
    pub listeners: HashMap<u32, Attributes3d>,
    pub muted: HashMap<BusHandle, bool>,
    pub bus_stops: Vec<(BusHandle, StopMode)>,
    pub banks: HashMap<BankHandle, MockBank>,
    pub locked_buses: Vec<BusHandle>,
    pub master_bus_count: usize,
    pub unload_polls: usize,
    pub stuck_unloading: bool,
}

impl MockState {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

#[derive(Default)]
pub(crate) struct MockLowLevelState {
    next_handle: u64,
    pub sounds: HashMap<SoundHandle, (String, SoundMode, OpenState)>,
    pub created: usize,
    pub released: usize,
    pub fail_create: bool,
    pub initial_state: Option<OpenState>,
}

#[derive(Default)]
pub(crate) struct MockLowLevel {
    state: Mutex<MockLowLevelState>,
}

impl MockLowLevel {
    pub fn state(&self) -> MutexGuard<'_, MockLowLevelState> {
        self.state.lock().unwrap()
    }
}

impl LowLevelSystem for MockLowLevel {
    fn version(&self) -> SystemResult<u32> {
        Ok(0x0002_0108)
    }

    fn create_sound(&self, path: &str, mode: SoundMode) -> SystemResult<SoundHandle> {
        let mut state = self.state();
        if state.fail_create {
            return Err(SystemError::File(format!("cannot open {}", path)));
        }
        state.next_handle += 1;
        let sound = SoundHandle::from_raw(1000 + state.next_handle);
        let open_state = state.initial_state.unwrap_or(OpenState::Loading);
        state
            .sounds
            .insert(sound, (path.to_string(), mode, open_state));
        state.created += 1;
        Ok(sound)
    }

    fn open_state(&self, sound: SoundHandle) -> SystemResult<OpenState> {
        self.state()
            .sounds
            .get(&sound)
            .map(|(_, _, state)| *state)
            .ok_or(SystemError::InvalidHandle)
    }

    fn release_sound(&self, sound: SoundHandle) -> SystemResult<()> {
        let mut state = self.state();
        state
            .sounds
            .remove(&sound)
            .ok_or(SystemError::InvalidHandle)?;
        state.released += 1;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockSystem {
    state: Arc<Mutex<MockState>>,
    low_level: Arc<MockLowLevel>,
}

impl MockSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn low_level(&self) -> &MockLowLevel {
        &self.low_level
    }

    /// Registers an event or snapshot definition under `path`.
    pub fn add_event(&self, path: &str) -> DescriptionHandle {
        let mut state = self.state();
        let guid = Guid::from_raw(state.next());
        let description = DescriptionHandle::from_raw(state.next());
        state.guids.insert(path.to_string(), guid);
        state.descriptions.insert(guid, description);
        description
    }

    pub fn add_streamed_event(&self, path: &str) -> DescriptionHandle {
        let description = self.add_event(path);
        self.state().streamed.insert(description);
        description
    }

    pub fn add_bus(&self, path: &str) -> BusHandle {
        let mut state = self.state();
        let guid = Guid::from_raw(state.next());
        let bus = BusHandle::from_raw(state.next());
        state.guids.insert(path.to_string(), guid);
        state.buses.insert(guid, bus);
        bus
    }

    pub fn add_parameter(&self, description: DescriptionHandle, name: &str, slot: usize) {
        self.state()
            .parameter_slots
            .insert((description, name.to_string()), slot);
    }

    pub fn instance(&self, instance: InstanceHandle) -> MockInstance {
        self.state().instances[&instance].clone()
    }

    pub fn last_instance(&self) -> InstanceHandle {
        *self.state().instance_order.last().unwrap()
    }

    pub fn instance_count(&self) -> usize {
        self.state().instances.len()
    }

    pub fn set_open_state(&self, sound: SoundHandle, open_state: OpenState) {
        self.low_level.state().sounds.get_mut(&sound).unwrap().2 = open_state;
    }

    /// Invokes the instance callback the way the engine would, if the mask allows it.
    pub fn fire(&self, instance: InstanceHandle, kind: CallbackType) -> ProgrammerSoundProperties {
        let (callback, mut properties) = {
            let state = self.state();
            let mock = &state.instances[&instance];
            let properties = ProgrammerSoundProperties {
                sound: match kind {
                    CallbackType::DestroyProgrammerSound => mock.programmer_sound,
                    _ => None,
                },
            };
            (mock.callback.clone(), properties)
        };

        if let Some((callback, mask)) = callback {
            if mask.contains(kind) {
                callback(kind, &mut properties);
            }
        }

        let mut state = self.state();
        let mock = state.instances.get_mut(&instance).unwrap();
        match kind {
            CallbackType::CreateProgrammerSound => mock.programmer_sound = properties.sound,
            CallbackType::DestroyProgrammerSound => mock.programmer_sound = None,
            _ => {}
        }
        properties
    }

    /// Same as [`MockSystem::fire`] but from a freshly spawned thread.
    pub fn fire_on_thread(
        &self,
        instance: InstanceHandle,
        kind: CallbackType,
    ) -> ProgrammerSoundProperties {
        let system = self.clone();
        std::thread::spawn(move || system.fire(instance, kind))
            .join()
            .unwrap()
    }

    fn with_instance<T>(
        &self,
        instance: InstanceHandle,
        f: impl FnOnce(&mut MockInstance) -> T,
    ) -> SystemResult<T> {
        let mut state = self.state();
        let mock = state
            .instances
            .get_mut(&instance)
            .filter(|mock| !mock.released)
            .ok_or(SystemError::InvalidHandle)?;
        Ok(f(mock))
    }
}

impl StudioSystem for MockSystem {
    fn initialize(&self, settings: &InitSettings) -> SystemResult<()> {
        self.state().initialized = Some(settings.clone());
        Ok(())
    }

    fn release(&self) -> SystemResult<()> {
        self.state().released = true;
        Ok(())
    }

    fn update(&self) -> SystemResult<()> {
        let mut state = self.state();
        state.updates += 1;
        for mock in state.instances.values_mut() {
            mock.ready = true;
        }
        let stuck = state.stuck_unloading;
        for bank in state.banks.values_mut() {
            if bank.state == LoadingState::Unloading && !stuck {
                if bank.unload_polls == 0 {
                    bank.state = LoadingState::Unloaded;
                    bank.memory = None;
                } else {
                    bank.unload_polls -= 1;
                }
            }
        }
        Ok(())
    }

    fn low_level_system(&self) -> Arc<dyn LowLevelSystem> {
        self.low_level.clone()
    }

    fn lookup_id(&self, path: &str) -> SystemResult<Guid> {
        self.state()
            .guids
            .get(path)
            .copied()
            .ok_or_else(|| SystemError::NotFound(path.to_string()))
    }

    fn event_by_id(&self, guid: Guid) -> SystemResult<DescriptionHandle> {
        self.state()
            .descriptions
            .get(&guid)
            .copied()
            .ok_or(SystemError::InvalidHandle)
    }

    fn bus_by_id(&self, guid: Guid) -> SystemResult<BusHandle> {
        self.state()
            .buses
            .get(&guid)
            .copied()
            .ok_or(SystemError::InvalidHandle)
    }

    fn bus(&self, path: &str) -> SystemResult<BusHandle> {
        let guid = self.lookup_id(path)?;
        self.bus_by_id(guid)
    }

    fn has_user_property(&self, description: DescriptionHandle, name: &str) -> bool {
        name == "Streamed" && self.state().streamed.contains(&description)
    }

    fn parameter_index(&self, description: DescriptionHandle, name: &str) -> SystemResult<usize> {
        let mut state = self.state();
        state.parameter_lookups += 1;
        state
            .parameter_slots
            .get(&(description, name.to_string()))
            .copied()
            .ok_or_else(|| SystemError::NotFound(name.to_string()))
    }

    fn create_instance(&self, description: DescriptionHandle) -> SystemResult<InstanceHandle> {
        let mut state = self.state();
        let instance = InstanceHandle::from_raw(state.next());
        state.instances.insert(
            instance,
            MockInstance {
                description,
                callback: None,
                ready: false,
                started: false,
                stopped: None,
                released: false,
                attributes: None,
                parameters: HashMap::new(),
                named_parameters: HashMap::new(),
                sends: HashMap::new(),
                obstruction_occlusion: None,
                programmer_sound: None,
            },
        );
        state.instance_order.push(instance);
        Ok(instance)
    }

    fn description_of(&self, instance: InstanceHandle) -> SystemResult<DescriptionHandle> {
        self.with_instance(instance, |mock| mock.description)
    }

    fn set_callback(
        &self,
        instance: InstanceHandle,
        callback: Arc<InstanceCallback>,
        mask: CallbackMask,
    ) -> SystemResult<()> {
        self.with_instance(instance, |mock| mock.callback = Some((callback, mask)))
    }

    fn set_3d_attributes(
        &self,
        instance: InstanceHandle,
        attributes: &Attributes3d,
    ) -> SystemResult<()> {
        self.with_instance(instance, |mock| mock.attributes = Some(*attributes))
    }

    fn is_instance_ready(&self, instance: InstanceHandle) -> bool {
        self.with_instance(instance, |mock| mock.ready)
            .unwrap_or(false)
    }

    fn start(&self, instance: InstanceHandle) -> SystemResult<()> {
        self.with_instance(instance, |mock| mock.started = true)
    }

    fn stop(&self, instance: InstanceHandle, mode: StopMode) -> SystemResult<()> {
        self.with_instance(instance, |mock| mock.stopped = Some(mode))
    }

    fn release_instance(&self, instance: InstanceHandle) -> SystemResult<()> {
        self.with_instance(instance, |mock| mock.released = true)
    }

    fn set_parameter_by_index(
        &self,
        instance: InstanceHandle,
        index: usize,
        value: f32,
    ) -> SystemResult<()> {
        self.with_instance(instance, |mock| {
            mock.parameters.insert(index, value);
        })
    }

    fn set_parameter_by_name(
        &self,
        instance: InstanceHandle,
        name: &str,
        value: f32,
    ) -> SystemResult<()> {
        self.with_instance(instance, |mock| {
            mock.named_parameters.insert(name.to_string(), value);
        })
    }

    fn set_bus_send(
        &self,
        instance: InstanceHandle,
        bus: BusHandle,
        amount: f32,
    ) -> SystemResult<()> {
        self.with_instance(instance, |mock| {
            mock.sends.insert(bus, amount);
        })
    }

    fn set_obstruction_occlusion(
        &self,
        instance: InstanceHandle,
        obstruction: f32,
        occlusion: f32,
    ) -> SystemResult<()> {
        self.with_instance(instance, |mock| {
            mock.obstruction_occlusion = Some((obstruction, occlusion))
        })
    }

    fn set_listener_attributes(
        &self,
        listener: u32,
        attributes: &Attributes3d,
    ) -> SystemResult<()> {
        self.state().listeners.insert(listener, *attributes);
        Ok(())
    }

    fn set_bus_mute(&self, bus: BusHandle, mute: bool) -> SystemResult<()> {
        self.state().muted.insert(bus, mute);
        Ok(())
    }

    fn stop_all_bus_events(&self, bus: BusHandle, mode: StopMode) -> SystemResult<()> {
        self.state().bus_stops.push((bus, mode));
        Ok(())
    }

    fn load_bank_memory(&self, data: Arc<[u8]>) -> SystemResult<BankHandle> {
        let mut state = self.state();
        let bank = BankHandle::from_raw(state.next());
        let unload_polls = state.unload_polls;
        state.banks.insert(
            bank,
            MockBank {
                size: data.len(),
                state: LoadingState::Loaded,
                unload_polls,
                buses: Vec::new(),
                memory: Some(data),
            },
        );
        Ok(bank)
    }

    fn load_bank_custom(&self, mut source: Box<dyn ByteSource>) -> SystemResult<BankHandle> {
        let size = source
            .open("bank")
            .map_err(|e| SystemError::File(e.to_string()))?;
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 7];
        loop {
            let read = source
                .read(&mut chunk)
                .map_err(|e| SystemError::File(e.to_string()))?;
            bytes.extend_from_slice(&chunk[..read]);
            if read < chunk.len() {
                break;
            }
        }
        source
            .close()
            .map_err(|e| SystemError::File(e.to_string()))?;
        if bytes.len() as u64 != size {
            return Err(SystemError::File("short bank stream".to_string()));
        }

        let mut state = self.state();
        let bank = BankHandle::from_raw(state.next());
        let buses: Vec<BusHandle> = (0..state.master_bus_count)
            .map(|_| BusHandle::from_raw(state.next()))
            .collect();
        let unload_polls = state.unload_polls;
        state.banks.insert(
            bank,
            MockBank {
                size: bytes.len(),
                state: LoadingState::Loaded,
                unload_polls,
                buses,
                memory: None,
            },
        );
        Ok(bank)
    }

    fn unload_bank(&self, bank: BankHandle) -> SystemResult<()> {
        let mut state = self.state();
        let bank = state
            .banks
            .get_mut(&bank)
            .ok_or(SystemError::InvalidHandle)?;
        bank.state = LoadingState::Unloading;
        Ok(())
    }

    fn bank_loading_state(&self, bank: BankHandle) -> SystemResult<LoadingState> {
        self.state()
            .banks
            .get(&bank)
            .map(|bank| bank.state)
            .ok_or(SystemError::InvalidHandle)
    }

    fn bank_buses(&self, bank: BankHandle) -> SystemResult<Vec<BusHandle>> {
        self.state()
            .banks
            .get(&bank)
            .map(|bank| bank.buses.clone())
            .ok_or(SystemError::InvalidHandle)
    }

    fn lock_channel_group(&self, bus: BusHandle) -> SystemResult<()> {
        self.state().locked_buses.push(bus);
        Ok(())
    }
}
