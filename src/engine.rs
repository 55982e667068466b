//! The adapter facade the host drives.
//!
//! `SonoraImpl` lives on one owning thread. The host hands it lifecycle requests and
//! calls [`SonoraImpl::update`] once per frame. Engine callbacks only ever reach it through
//! the signal channel drained at the start of that update, so no adapter state is shared
//! with the engine's threads.

use crate::audio_data::probe_audio_file;
use crate::bank::{self, MasterBanks};
use crate::config::SonoraImplDesc;
use crate::definition::{
    BUS_PREFIX, DefinitionNode, Environment, FileEntry, Parameter, SwitchState, Trigger,
    TriggerKind,
};
use crate::error::{RequestStatus, Result, SonoraError};
use crate::event::TriggerEvent;
use crate::events::SonoraEvent;
use crate::ids::{
    EnvironmentId, EventHandle, EventId, FileHandle, ListenerId, ObjectId, ParameterId,
    SwitchStateId,
};
use crate::math::Attributes3d;
use crate::notifier::{
    CompletionNotifier, EngineSignal, SignalReceiver, SignalSender, event_callback,
    signal_channel,
};
use crate::object::{AudioListener, AudioObject, release_instance};
use crate::registry::{AudioObjectRegistry, ControlIndex};
use crate::standalone::{
    ProgrammerSoundCallback, StandaloneFileInfo, StandaloneFileRequest,
    StandaloneFileStateMachine,
};
use crate::system::{
    CallbackMask, DescriptionHandle, InitSettings, InstanceCallback, InstanceHandle,
    LowLevelSystem, StopMode, StudioSystem,
};
use crate::tracker::{EventKey, PendingEventTracker};
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Engine API version this adapter was written against.
pub const ENGINE_HEADER_VERSION: u32 = 0x0002_0108;

/// User property that makes a standalone file stream from disk instead of loading fully.
pub const STREAMED_PROPERTY: &str = "Streamed";

const IMPLEMENTATION_NAME: &str = "Sonora";

/// Formats a packed hex version: `0x00020108` reads `2.01.08`.
///
/// Leading zeros of the upper half are dropped and dots split the remaining digits into
/// major, minor and patch. Versions that cannot be split that way give an empty string.
pub fn format_version(version: u32) -> String {
    let hex = format!("{:08x}", version);
    let digits = hex.trim_start_matches('0');
    let stripped = hex.len() - digits.len();
    if stripped >= 4 {
        return String::new();
    }

    let mut formatted = digits.to_string();
    formatted.insert(4 - stripped, '.');
    formatted.insert(7 - stripped, '.');
    formatted
}

pub struct SonoraImpl {
    desc: SonoraImplDesc,
    system: Box<dyn StudioSystem>,
    low_level: Arc<dyn LowLevelSystem>,
    initialized: bool,
    implementation_name: String,
    regular_bank_folder: PathBuf,
    localized_bank_folder: PathBuf,
    master_banks: MasterBanks,

    objects: HashMap<ObjectId, AudioObject>,
    listeners: HashMap<ListenerId, AudioListener>,
    registry: AudioObjectRegistry,
    control_index: ControlIndex,
    events: HashMap<EventHandle, TriggerEvent>,
    files: HashMap<FileHandle, StandaloneFileRequest>,
    pending_events: PendingEventTracker,
    pending_files: StandaloneFileStateMachine,

    signal_sender: SignalSender,
    signal_receiver: SignalReceiver,
    notifier: CompletionNotifier,
    notifications: Receiver<SonoraEvent>,

    next_object: u32,
    next_listener: u32,
    next_event: u64,
    next_file: u64,
    next_control: u32,
}

impl SonoraImpl {
    pub fn new(desc: SonoraImplDesc, system: Box<dyn StudioSystem>) -> Self {
        let low_level = system.low_level_system();
        let (signal_sender, signal_receiver) = signal_channel();
        let (notifier, notifications) = CompletionNotifier::new();
        let regular_bank_folder = desc.regular_bank_folder();

        Self {
            desc,
            system,
            low_level,
            initialized: false,
            implementation_name: String::new(),
            localized_bank_folder: regular_bank_folder.clone(),
            regular_bank_folder,
            master_banks: MasterBanks::new(),
            objects: HashMap::new(),
            listeners: HashMap::new(),
            registry: AudioObjectRegistry::new(),
            control_index: ControlIndex::new(),
            events: HashMap::new(),
            files: HashMap::new(),
            pending_events: PendingEventTracker::new(),
            pending_files: StandaloneFileStateMachine::new(),
            signal_sender,
            signal_receiver,
            notifier,
            notifications,
            next_object: ObjectId::GLOBAL.raw() + 1,
            next_listener: ListenerId::DEFAULT.raw() + 1,
            next_event: 1,
            next_file: 1,
            next_control: 1,
        }
    }

    /// Starts the engine and loads the master banks.
    ///
    /// Fails when the asset directory is missing: nothing can be played without it.
    pub fn init(&mut self) -> Result<()> {
        let assets = &self.desc.asset_directory;
        if assets.as_os_str().is_empty() || !assets.is_dir() {
            return Err(SonoraError::AssetUnavailable(format!(
                "asset directory '{}' does not exist",
                assets.display()
            )));
        }

        let version = self.low_level.version()?;
        self.implementation_name = format!(
            "{} (System: {} Header: {}) ({})",
            IMPLEMENTATION_NAME,
            format_version(version),
            format_version(ENGINE_HEADER_VERSION),
            self.regular_bank_folder.display()
        );

        self.system.initialize(&InitSettings {
            max_channels: self.desc.max_channels,
            live_update: self.desc.enable_live_update,
            synchronous_update: self.desc.enable_synchronous_update,
            doppler_scale: self.desc.doppler_scale,
            distance_factor: self.desc.distance_factor,
            rolloff_scale: self.desc.rolloff_scale,
        })?;
        let loaded = self
            .master_banks
            .load(&self.regular_bank_folder, self.system.as_ref())
            .and_then(|_| {
                self.system
                    .set_listener_attributes(ListenerId::DEFAULT.raw(), &Attributes3d::default())
                    .map_err(Into::into)
            });
        if let Err(e) = loaded {
            self.master_banks.unload(self.system.as_ref());
            if let Err(release) = self.system.release() {
                log::warn!("Failed to release engine after failed init: {}", release);
            }
            return Err(e);
        }

        self.initialized = true;
        log::info!("Initialized {}", self.implementation_name);
        Ok(())
    }

    pub fn shut_down(&mut self) -> RequestStatus {
        if !self.initialized {
            return RequestStatus::Success;
        }
        self.master_banks.unload(self.system.as_ref());
        self.initialized = false;
        RequestStatus::from_result(self.system.release().map_err(Into::into), "shut_down")
    }

    pub fn release(self) -> RequestStatus {
        log::debug!("Releasing {}", self.implementation_name);
        RequestStatus::Success
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn implementation_name(&self) -> &str {
        &self.implementation_name
    }

    /// Per-frame tick: engine update, engine signals, pending events, then standalone files.
    pub fn update(&mut self, _delta_time: f32) {
        if !self.initialized {
            return;
        }
        if let Err(e) = self.system.update() {
            log::error!("Engine update failed: {}", e);
        }
        self.process_signals();
        self.drain_pending_events();
        self.pending_files
            .poll(&mut self.files, self.low_level.as_ref(), &self.notifier);
    }

    /// Notifications produced by the updates so far.
    pub fn poll_events(&self) -> Vec<SonoraEvent> {
        self.notifications.try_iter().collect()
    }

    /// Receiver side of the host request queue, usable from any thread.
    pub fn event_receiver(&self) -> Receiver<SonoraEvent> {
        self.notifications.clone()
    }

    fn process_signals(&mut self) {
        while let Ok(signal) = self.signal_receiver.try_recv() {
            self.apply_signal(signal);
        }
    }

    fn apply_signal(&mut self, signal: EngineSignal) {
        match signal {
            EngineSignal::EventEnded { event, instance } => self.finish_event(event, instance),
            EngineSignal::FileStarted { file, instance } => {
                if let Some(request) = self.file_for_signal(file, instance) {
                    request.on_started();
                }
            }
            EngineSignal::FileEnded { file, instance } => {
                let Some(request) = self.file_for_signal(file, instance) else {
                    return;
                };
                request.on_finished();
                let object = request.event().object();
                request.event_mut().mark_finished();
                self.retire_key(EventKey::ProgrammerSound(file), object);
            }
            EngineSignal::ProgrammerSoundCreated {
                file,
                instance,
                sound,
            } => {
                if let Some(request) = self.file_for_signal(file, instance) {
                    request.on_sound_created(sound);
                }
            }
            EngineSignal::ProgrammerSoundDestroyed { file, instance } => {
                if let Some(request) = self.file_for_signal(file, instance) {
                    request.on_sound_destroyed();
                }
            }
        }
    }

    fn finish_event(&mut self, handle: EventHandle, instance: InstanceHandle) {
        let Some(event) = self
            .events
            .get_mut(&handle)
            .filter(|event| event.instance() == Some(instance))
        else {
            log::debug!("Ignoring stale stop of {}", handle);
            return;
        };
        if !event.mark_finished() {
            return;
        }

        let (id, object) = (event.id(), event.object());
        self.retire_key(EventKey::Trigger(handle), object);
        if let Some(id) = id {
            self.notifier.notify_finished(id);
        }
    }

    fn file_for_signal(
        &mut self,
        file: FileHandle,
        instance: InstanceHandle,
    ) -> Option<&mut StandaloneFileRequest> {
        let request = self
            .files
            .get_mut(&file)
            .filter(|request| request.owns(instance));
        if request.is_none() {
            log::debug!("Ignoring stale signal for {}", file);
        }
        request
    }

    /// Removes an event from the pending list and from its object.
    fn retire_key(&mut self, key: EventKey, object: Option<ObjectId>) {
        self.pending_events.untrack(key);
        if let Some(object) = object.and_then(|id| self.objects.get_mut(&id)) {
            object.detach_event(key);
        }
    }

    fn drain_pending_events(&mut self) {
        let mut orphaned = Vec::new();
        let Self {
            pending_events,
            events,
            files,
            objects,
            system,
            control_index,
            ..
        } = self;

        pending_events.drain(|key| {
            let event = match key {
                EventKey::Trigger(handle) => events.get_mut(&handle),
                EventKey::ProgrammerSound(handle) => {
                    files.get_mut(&handle).map(|request| request.event_mut())
                }
            };
            let Some(event) = event else {
                log::error!("Pending {:?} has no event", key);
                return true;
            };
            let (Some(instance), Some(object_id), Some(path_id)) =
                (event.instance(), event.object(), event.path_id())
            else {
                log::error!("Pending {:?} is not bound to an instance", key);
                return true;
            };
            let Some(object) = objects.get_mut(&object_id) else {
                log::error!("Pending {:?} belongs to deleted {}", key, object_id);
                orphaned.push((key, instance));
                return true;
            };

            if object.attach_event(key, instance, path_id, &**system, control_index) {
                event.mark_active();
                true
            } else {
                false
            }
        });

        for (key, instance) in orphaned {
            if let Err(e) = self.system.stop(instance, StopMode::Immediate) {
                log::warn!("Failed to stop orphaned {:?}: {}", key, e);
            }
            self.end_pending(key);
        }
    }

    /// Ends an event that never reached its object. The host is told the same way as
    /// for an engine stop: `EventFinished` for triggers, started(false) then stopped for
    /// files on the next poll.
    fn end_pending(&mut self, key: EventKey) {
        self.pending_events.untrack(key);
        match key {
            EventKey::Trigger(handle) => {
                let Some(event) = self.events.get_mut(&handle) else {
                    return;
                };
                if event.mark_finished() {
                    if let Some(id) = event.id() {
                        self.notifier.notify_finished(id);
                    }
                }
            }
            EventKey::ProgrammerSound(file) => {
                let Some(request) = self.files.get_mut(&file) else {
                    return;
                };
                request.cancel_open();
                request.on_finished();
                request.event_mut().mark_finished();
            }
        }
    }

    pub fn on_lose_focus(&mut self) -> RequestStatus {
        self.mute_master_bus(true)
    }

    pub fn on_get_focus(&mut self) -> RequestStatus {
        self.mute_master_bus(false)
    }

    pub fn mute_all(&mut self) -> RequestStatus {
        self.mute_master_bus(true)
    }

    pub fn unmute_all(&mut self) -> RequestStatus {
        self.mute_master_bus(false)
    }

    fn mute_master_bus(&self, mute: bool) -> RequestStatus {
        let result = self
            .system
            .bus(BUS_PREFIX)
            .and_then(|bus| self.system.set_bus_mute(bus, mute));
        RequestStatus::from_result(result.map_err(Into::into), "mute master bus")
    }

    pub fn stop_all_sounds(&mut self) -> RequestStatus {
        let result = self
            .system
            .bus(BUS_PREFIX)
            .and_then(|bus| self.system.stop_all_bus_events(bus, StopMode::Immediate));
        RequestStatus::from_result(result.map_err(Into::into), "stop_all_sounds")
    }

    pub fn on_audio_system_refresh(&mut self) {
        self.master_banks.unload(self.system.as_ref());
        if let Err(e) = self
            .master_banks
            .load(&self.regular_bank_folder, self.system.as_ref())
        {
            log::error!("Failed to reload master banks: {}", e);
        }
    }

    pub fn set_language(&mut self, language: &str) {
        self.desc.language = language.to_string();
        self.localized_bank_folder = self.desc.localized_bank_folder();
        log::debug!("Localized banks now read from {}", self.localized_bank_folder.display());
    }

    pub fn new_global_audio_object(&mut self) -> ObjectId {
        self.objects
            .insert(ObjectId::GLOBAL, AudioObject::new(ObjectId::GLOBAL));
        ObjectId::GLOBAL
    }

    pub fn new_audio_object(&mut self) -> ObjectId {
        let id = ObjectId::from_raw(self.next_object);
        self.next_object += 1;
        self.objects.insert(id, AudioObject::new(id));
        id
    }

    pub fn delete_audio_object(&mut self, id: ObjectId) -> RequestStatus {
        if self.registry.contains(id) {
            log::warn!("Deleting {} while it is still registered", id);
            self.registry.unregister(id);
        }
        match self.objects.remove(&id) {
            Some(mut object) => {
                object.reset(self.system.as_ref());
                RequestStatus::Success
            }
            None => {
                log::error!("Invalid audio object {} passed to delete_audio_object", id);
                RequestStatus::Failure
            }
        }
    }

    pub fn register_audio_object(&mut self, id: ObjectId, name: Option<&str>) -> RequestStatus {
        let Some(object) = self.objects.get_mut(&id) else {
            log::error!("Invalid audio object {} passed to register_audio_object", id);
            return RequestStatus::Failure;
        };
        object.set_name(name);
        self.registry.register(id);
        RequestStatus::Success
    }

    pub fn unregister_audio_object(&mut self, id: ObjectId) -> RequestStatus {
        self.registry.unregister(id);
        RequestStatus::Success
    }

    pub fn reset_audio_object(&mut self, id: ObjectId) -> RequestStatus {
        match self.objects.get_mut(&id) {
            Some(object) => {
                object.reset(self.system.as_ref());
                RequestStatus::Success
            }
            None => {
                log::error!("Invalid audio object {} passed to reset_audio_object", id);
                RequestStatus::Failure
            }
        }
    }

    pub fn update_audio_object(&mut self, id: ObjectId) -> RequestStatus {
        self.objects.contains_key(&id).into()
    }

    pub fn set_3d_attributes(&mut self, id: ObjectId, attributes: Attributes3d) -> RequestStatus {
        let Some(object) = self.objects.get_mut(&id) else {
            log::error!("Invalid audio object {} passed to set_3d_attributes", id);
            return RequestStatus::Failure;
        };
        object.set_3d_attributes(attributes, self.system.as_ref());
        RequestStatus::Success
    }

    pub fn set_parameter(&mut self, id: ObjectId, parameter: &Parameter, value: f32) -> RequestStatus {
        self.with_target(id, "set_parameter", |object, system, index| {
            object.set_parameter(parameter, value, system, index)
        })
    }

    pub fn set_switch_state(&mut self, id: ObjectId, state: &SwitchState) -> RequestStatus {
        self.with_target(id, "set_switch_state", |object, system, index| {
            object.set_switch(state, system, index)
        })
    }

    pub fn set_environment(
        &mut self,
        id: ObjectId,
        environment: &Environment,
        amount: f32,
    ) -> RequestStatus {
        self.with_target(id, "set_environment", |object, system, _| {
            object.set_environment(environment, amount, system)
        })
    }

    /// Obstruction and occlusion only make sense per emitter, never as a broadcast.
    pub fn set_obstruction_occlusion(
        &mut self,
        id: ObjectId,
        obstruction: f32,
        occlusion: f32,
    ) -> RequestStatus {
        if id.is_global() {
            log::error!("Trying to set occlusion and obstruction values on the global audio object");
            return RequestStatus::Failure;
        }
        let Some(object) = self.objects.get_mut(&id) else {
            log::error!("Invalid audio object {} passed to set_obstruction_occlusion", id);
            return RequestStatus::Failure;
        };
        object.set_obstruction_occlusion(obstruction, occlusion, self.system.as_ref());
        RequestStatus::Success
    }

    /// Runs `f` on the addressed object, or on every registered one for the global id.
    fn with_target(
        &mut self,
        id: ObjectId,
        context: &str,
        mut f: impl FnMut(&mut AudioObject, &dyn StudioSystem, &mut ControlIndex),
    ) -> RequestStatus {
        let system = self.system.as_ref();
        let index = &mut self.control_index;
        if id.is_global() {
            self.registry
                .for_each_registered(&mut self.objects, |object| f(object, system, index));
            return RequestStatus::Success;
        }

        match self.objects.get_mut(&id) {
            Some(object) => {
                f(object, system, index);
                RequestStatus::Success
            }
            None => {
                log::error!("Invalid audio object {} passed to {}", id, context);
                RequestStatus::Failure
            }
        }
    }

    pub fn stop_all_events(&mut self, id: ObjectId) -> RequestStatus {
        let Some(object) = self.objects.get(&id) else {
            log::error!("Invalid audio object {} passed to stop_all_events", id);
            return RequestStatus::Failure;
        };
        object.stop_all_events(self.system.as_ref());
        RequestStatus::Success
    }

    pub fn new_default_listener(&mut self) -> ListenerId {
        self.listeners
            .insert(ListenerId::DEFAULT, AudioListener::new(ListenerId::DEFAULT));
        ListenerId::DEFAULT
    }

    pub fn new_listener(&mut self) -> ListenerId {
        let id = ListenerId::from_raw(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, AudioListener::new(id));
        id
    }

    pub fn delete_listener(&mut self, id: ListenerId) -> RequestStatus {
        self.listeners.remove(&id).is_some().into()
    }

    pub fn set_listener_3d_attributes(
        &mut self,
        id: ListenerId,
        attributes: Attributes3d,
    ) -> RequestStatus {
        let Some(listener) = self.listeners.get_mut(&id) else {
            log::error!("Invalid listener {:?} passed to set_listener_3d_attributes", id);
            return RequestStatus::Failure;
        };
        listener.set_attributes(attributes);
        RequestStatus::from_result(
            self.system
                .set_listener_attributes(id.raw(), &attributes)
                .map_err(Into::into),
            "set_listener_3d_attributes",
        )
    }

    pub fn new_event(&mut self, id: EventId) -> EventHandle {
        let handle = EventHandle(self.next_event);
        self.next_event += 1;
        self.events.insert(handle, TriggerEvent::new(id));
        handle
    }

    /// Retires an event: it leaves the pending list and its object, and its instance is
    /// released. Later engine signals for it are ignored.
    pub fn reset_event(&mut self, handle: EventHandle) -> RequestStatus {
        let Some(event) = self.events.get_mut(&handle) else {
            log::error!("Invalid {} passed to reset_event", handle);
            return RequestStatus::Failure;
        };
        let object = event.object();
        let instance = event.reset();
        self.retire_key(EventKey::Trigger(handle), object);
        if let Some(instance) = instance {
            if let Err(e) = self.system.release_instance(instance) {
                log::warn!("Failed to release instance of {}: {}", handle, e);
            }
        }
        RequestStatus::Success
    }

    pub fn delete_event(&mut self, handle: EventHandle) -> RequestStatus {
        let status = self.reset_event(handle);
        self.events.remove(&handle);
        status
    }

    /// Stops an event immediately. An event that was not attached yet ends right away so
    /// the next update cannot start it.
    pub fn stop_event(&mut self, handle: EventHandle) -> RequestStatus {
        let Some(instance) = self.events.get(&handle).and_then(TriggerEvent::instance) else {
            log::error!("Invalid {} passed to stop_event", handle);
            return RequestStatus::Failure;
        };
        let key = EventKey::Trigger(handle);
        if self.pending_events.contains(key) {
            self.end_pending(key);
        }
        RequestStatus::from_result(
            self.system
                .stop(instance, StopMode::Immediate)
                .map_err(Into::into),
            "stop_event",
        )
    }

    pub fn new_trigger(&self, node: &DefinitionNode) -> Option<Trigger> {
        Trigger::parse(node, self.system.as_ref())
    }

    pub fn prepare_trigger_sync(&mut self, _object: ObjectId, _trigger: &Trigger) -> RequestStatus {
        RequestStatus::Success
    }

    pub fn unprepare_trigger_sync(&mut self, _object: ObjectId, _trigger: &Trigger) -> RequestStatus {
        RequestStatus::Success
    }

    pub fn prepare_trigger_async(
        &mut self,
        _object: ObjectId,
        _trigger: &Trigger,
        _event: EventHandle,
    ) -> RequestStatus {
        RequestStatus::Success
    }

    pub fn unprepare_trigger_async(
        &mut self,
        _object: ObjectId,
        _trigger: &Trigger,
        _event: EventHandle,
    ) -> RequestStatus {
        RequestStatus::Success
    }

    /// Activates `trigger` on an object.
    ///
    /// A start trigger creates an instance and tracks it until the engine has it ready.
    /// A stop trigger fades out matching instances already on the object and reports
    /// `Failure`, since there is no new event for the host to keep track of.
    pub fn activate_trigger(
        &mut self,
        object: ObjectId,
        trigger: &Trigger,
        event: EventHandle,
    ) -> RequestStatus {
        if !self.objects.contains_key(&object) || !self.events.contains_key(&event) {
            log::error!("Invalid audio object or event passed to activate_trigger");
            return RequestStatus::Failure;
        }

        match trigger.kind() {
            TriggerKind::Start => RequestStatus::from_result(
                self.start_event(object, trigger, event),
                "activate_trigger",
            ),
            TriggerKind::Stop => {
                if let Some(target) = self.objects.get(&object) {
                    target.stop_event(trigger.path_id(), self.system.as_ref());
                }
                RequestStatus::Failure
            }
        }
    }

    fn start_event(&mut self, object: ObjectId, trigger: &Trigger, handle: EventHandle) -> Result<()> {
        if self.events.get(&handle).is_some_and(TriggerEvent::is_bound) {
            return Err(SonoraError::ProtocolViolation(format!(
                "{} already has an instance",
                handle
            )));
        }

        let (instance, _) = self.create_instance(trigger)?;
        self.configure_instance(
            object,
            instance,
            event_callback(handle, instance, self.signal_sender.clone()),
            CallbackMask::STOPPED | CallbackMask::START_FAILED,
        )?;

        let event = self
            .events
            .get_mut(&handle)
            .ok_or_else(|| SonoraError::InvalidArgument(format!("unknown {}", handle)))?;
        event.bind(instance, object, trigger.path_id())?;
        self.pending_events.track(EventKey::Trigger(handle))?;
        log::debug!("Started {} ({}) on {}", handle, trigger.path(), object);
        Ok(())
    }

    fn create_instance(&self, trigger: &Trigger) -> Result<(InstanceHandle, DescriptionHandle)> {
        let description = match trigger.description() {
            Some(description) => description,
            None => self.system.event_by_id(trigger.guid())?,
        };
        let instance = self.system.create_instance(description)?;
        Ok((instance, description))
    }

    /// Attaches the callback and the object's position. Releases the instance on failure.
    fn configure_instance(
        &self,
        object: ObjectId,
        instance: InstanceHandle,
        callback: Arc<InstanceCallback>,
        mask: CallbackMask,
    ) -> Result<()> {
        let attributes = self
            .objects
            .get(&object)
            .map(|object| *object.attributes())
            .unwrap_or_default();
        let result = self
            .system
            .set_callback(instance, callback, mask)
            .and_then(|_| self.system.set_3d_attributes(instance, &attributes));

        if let Err(e) = result {
            release_instance(self.system.as_ref(), instance, StopMode::Immediate);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn new_standalone_file(&mut self) -> FileHandle {
        let handle = FileHandle(self.next_file);
        self.next_file += 1;
        self.files.insert(handle, StandaloneFileRequest::new());
        handle
    }

    /// Retires a standalone file request.
    ///
    /// Refused while the engine still holds the file's sound: the engine has to destroy
    /// the programmer sound first.
    pub fn reset_standalone_file(&mut self, file: FileHandle) -> RequestStatus {
        self.process_signals();

        let Some(request) = self.files.get_mut(&file) else {
            log::error!("Invalid {} passed to reset_standalone_file", file);
            return RequestStatus::Failure;
        };
        let object = request.event().object();
        match request.reset() {
            Ok(instance) => {
                self.pending_files.remove(file);
                self.retire_key(EventKey::ProgrammerSound(file), object);
                if let Some(instance) = instance {
                    if let Err(e) = self.system.release_instance(instance) {
                        log::warn!("Failed to release instance of {}: {}", file, e);
                    }
                }
                RequestStatus::Success
            }
            Err(e) => {
                log::error!("reset_standalone_file: {}", e);
                RequestStatus::Failure
            }
        }
    }

    pub fn delete_standalone_file(&mut self, file: FileHandle) -> RequestStatus {
        let status = self.reset_standalone_file(file);
        if status.is_success() {
            self.files.remove(&file);
        }
        status
    }

    /// Plays a file through the programmer-sound event of `trigger`.
    ///
    /// The started and stopped notifications follow from later updates.
    pub fn play_file(
        &mut self,
        object: ObjectId,
        trigger: &Trigger,
        file: FileHandle,
        info: &StandaloneFileInfo,
    ) -> RequestStatus {
        RequestStatus::from_result(self.start_file(object, trigger, file, info), "play_file")
    }

    fn start_file(
        &mut self,
        object: ObjectId,
        trigger: &Trigger,
        file: FileHandle,
        info: &StandaloneFileInfo,
    ) -> Result<()> {
        if !self.objects.contains_key(&object) {
            return Err(SonoraError::InvalidArgument(format!("unknown {}", object)));
        }
        if trigger.kind() != TriggerKind::Start {
            return Err(SonoraError::InvalidArgument(format!(
                "{} is not a start trigger",
                trigger.path()
            )));
        }
        match self.files.get(&file) {
            None => return Err(SonoraError::InvalidArgument(format!("unknown {}", file))),
            Some(request) if request.event().is_bound() => {
                return Err(SonoraError::ProtocolViolation(format!(
                    "{} is already playing",
                    file
                )));
            }
            Some(_) => {}
        }

        let (instance, description) = self.create_instance(trigger)?;
        let should_stream = self.system.has_user_property(description, STREAMED_PROPERTY);
        let path = self
            .desc
            .standalone_file_path(&info.file_name, info.localized)
            .to_string_lossy()
            .into_owned();

        let mut request = StandaloneFileRequest::new();
        request.prepare(info, path.clone(), should_stream);
        let callback = ProgrammerSoundCallback::new(
            file,
            instance,
            path,
            request.sound_mode(),
            self.low_level.clone(),
            self.signal_sender.clone(),
        );
        self.configure_instance(object, instance, callback.into_callback(), CallbackMask::ALL)?;

        request.event_mut().bind(instance, object, trigger.path_id())?;
        self.files.insert(file, request);
        self.pending_files.add(file)?;
        self.pending_events.track(EventKey::ProgrammerSound(file))?;
        log::debug!("Playing {} as {}", info.file_name, file);
        Ok(())
    }

    /// Stops a file immediately. The stop is confirmed by a later notification.
    pub fn stop_file(&mut self, file: FileHandle) -> RequestStatus {
        let Some(request) = self.files.get_mut(&file) else {
            log::error!("Invalid {} passed to stop_file", file);
            return RequestStatus::Failure;
        };
        request.cancel_open();
        let Some(instance) = request.event().instance() else {
            log::error!("{} is not playing", file);
            return RequestStatus::Failure;
        };
        let key = EventKey::ProgrammerSound(file);
        if self.pending_events.contains(key) {
            self.end_pending(key);
        }
        match self.system.stop(instance, StopMode::Immediate) {
            Ok(()) => RequestStatus::Pending,
            Err(e) => {
                log::error!("stop_file: {}", e);
                RequestStatus::Failure
            }
        }
    }

    pub fn new_parameter(&mut self, node: &DefinitionNode) -> Option<Parameter> {
        let parameter = Parameter::parse(node, ParameterId(self.next_control))?;
        self.next_control += 1;
        Some(parameter)
    }

    /// Drops the parameter from every registered object and from the slot cache.
    pub fn delete_parameter(&mut self, parameter: Parameter) {
        self.registry.for_each_registered(&mut self.objects, |object| {
            object.remove_parameter(parameter.id());
        });
        self.control_index.forget_parameter(parameter.id());
    }

    pub fn new_switch_state(&mut self, node: &DefinitionNode) -> Option<SwitchState> {
        let state = SwitchState::parse(node, SwitchStateId(self.next_control))?;
        self.next_control += 1;
        Some(state)
    }

    pub fn delete_switch_state(&mut self, state: SwitchState) {
        self.registry.for_each_registered(&mut self.objects, |object| {
            object.remove_switch(&state);
        });
        self.control_index.forget_switch(state.id());
    }

    pub fn new_environment(&mut self, node: &DefinitionNode) -> Option<Environment> {
        let environment = Environment::parse(
            node,
            EnvironmentId(self.next_control),
            self.system.as_ref(),
        )?;
        self.next_control += 1;
        Some(environment)
    }

    pub fn delete_environment(&mut self, environment: Environment) {
        let system = self.system.as_ref();
        self.registry.for_each_registered(&mut self.objects, |object| {
            object.remove_environment(environment.id(), system);
        });
    }

    pub fn parse_audio_file_entry(&self, node: &DefinitionNode) -> Option<FileEntry> {
        let mut entry = FileEntry::parse(node)?;
        entry.set_memory_alignment(self.desc.bank_alignment);
        Some(entry)
    }

    /// Folder the host loads `entry` from.
    pub fn audio_file_location(&self, entry: &FileEntry) -> &Path {
        if entry.is_localized() {
            &self.localized_bank_folder
        } else {
            &self.regular_bank_folder
        }
    }

    /// Loads a bank straight from the host's buffer. The entry keeps the buffer alive
    /// until the bank is unregistered.
    ///
    /// A misaligned buffer is a fatal setup error.
    pub fn register_in_memory_file(&mut self, entry: &mut FileEntry, data: Arc<[u8]>) -> Result<()> {
        bank::check_alignment(&data, entry.memory_alignment())?;
        let bank = self.system.load_bank_memory(data.clone())?;
        entry.bank = Some(bank);
        entry.data = Some(data);
        Ok(())
    }

    /// Unloads a memory bank and waits for the engine to let go of its buffer.
    pub fn unregister_in_memory_file(&mut self, entry: &mut FileEntry) -> RequestStatus {
        let Some(bank) = entry.bank else {
            log::error!("{} is not registered", entry.file_name());
            return RequestStatus::Failure;
        };

        match bank::unload_and_wait(self.system.as_ref(), bank, self.desc.max_unload_polls) {
            Ok(()) => {
                entry.bank = None;
                entry.data = None;
                RequestStatus::Success
            }
            Err(e) => {
                log::error!("Failed to unload {}: {}", entry.file_name(), e);
                RequestStatus::Failure
            }
        }
    }

    /// Length of an audio file in seconds.
    pub fn audio_file_duration(&self, path: impl AsRef<Path>) -> Result<f32> {
        Ok(probe_audio_file(path)?.duration_secs())
    }

    pub fn object(&self, id: ObjectId) -> Option<&AudioObject> {
        self.objects.get(&id)
    }

    pub fn listener(&self, id: ListenerId) -> Option<&AudioListener> {
        self.listeners.get(&id)
    }

    pub fn event(&self, handle: EventHandle) -> Option<&TriggerEvent> {
        self.events.get(&handle)
    }

    pub fn standalone_file(&self, file: FileHandle) -> Option<&StandaloneFileRequest> {
        self.files.get(&file)
    }

    pub fn registry(&self) -> &AudioObjectRegistry {
        &self.registry
    }

    pub fn control_index(&self) -> &ControlIndex {
        &self.control_index
    }

    pub fn pending_events(&self) -> &PendingEventTracker {
        &self.pending_events
    }

    pub fn pending_files(&self) -> &StandaloneFileStateMachine {
        &self.pending_files
    }

    pub fn desc(&self) -> &SonoraImplDesc {
        &self.desc
    }
}
