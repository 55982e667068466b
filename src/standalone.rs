//! Standalone file playback.
//!
//! A standalone file is played through an event with a programmer instrument. The engine
//! asks for the sound on its own thread, opens it asynchronously and reports start and
//! stop through the instance callback. Every one of those facts arrives here as an
//! [`EngineSignal`](crate::notifier::EngineSignal) applied on the owning thread, and the
//! per-tick [`StandaloneFileRequest::poll`] turns them into host notifications:
//!
//! ```text
//! Created -> AwaitingOpen -> Playable | FailedToOpen -> Finished
//! ```

use crate::error::{Result, SonoraError};
use crate::event::TriggerEvent;
use crate::ids::{FileHandle, FileId, FileInstanceId};
use crate::notifier::{CompletionNotifier, EngineSignal, SignalSender, send_signal};
use crate::system::{
    CallbackType, InstanceCallback, InstanceHandle, LowLevelSystem, OpenState,
    ProgrammerSoundProperties, SoundHandle, SoundMode,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Created,
    /// The event started and its sound is being opened
    AwaitingOpen,
    Playable,
    FailedToOpen,
    Finished,
}

/// Host-side description of one file playback.
#[derive(Debug, Clone, PartialEq)]
pub struct StandaloneFileInfo {
    pub file_id: FileId,
    pub file_instance_id: FileInstanceId,
    /// File name without extension, relative to the game or localized folder
    pub file_name: String,
    pub localized: bool,
}

#[derive(Debug)]
pub struct StandaloneFileRequest {
    file_id: FileId,
    file_instance_id: FileInstanceId,
    path: String,
    should_stream: bool,
    event: TriggerEvent,
    sound: Option<SoundHandle>,
    sound_failed: bool,
    state: FileState,
    waiting_for_open: bool,
    has_finished: bool,
    started_reported: bool,
    stopped_reported: bool,
}

impl Default for StandaloneFileRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl StandaloneFileRequest {
    pub fn new() -> Self {
        Self {
            file_id: FileId(0),
            file_instance_id: FileInstanceId(0),
            path: String::new(),
            should_stream: false,
            event: TriggerEvent::detached(),
            sound: None,
            sound_failed: false,
            state: FileState::Created,
            waiting_for_open: false,
            has_finished: false,
            started_reported: false,
            stopped_reported: false,
        }
    }

    pub(crate) fn prepare(&mut self, info: &StandaloneFileInfo, path: String, should_stream: bool) {
        self.file_id = info.file_id;
        self.file_instance_id = info.file_instance_id;
        self.path = path;
        self.should_stream = should_stream;
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn file_instance_id(&self) -> FileInstanceId {
        self.file_instance_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn should_stream(&self) -> bool {
        self.should_stream
    }

    pub fn sound_mode(&self) -> SoundMode {
        if self.should_stream {
            SoundMode::Stream
        } else {
            SoundMode::CompressedSample
        }
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    pub fn sound(&self) -> Option<SoundHandle> {
        self.sound
    }

    pub fn is_waiting_for_open(&self) -> bool {
        self.waiting_for_open
    }

    pub fn event(&self) -> &TriggerEvent {
        &self.event
    }

    pub(crate) fn event_mut(&mut self) -> &mut TriggerEvent {
        &mut self.event
    }

    /// Whether a signal from `instance` still belongs to this request.
    pub(crate) fn owns(&self, instance: InstanceHandle) -> bool {
        self.event.instance() == Some(instance)
    }

    pub(crate) fn on_started(&mut self) {
        if self.state == FileState::Created {
            log::debug!("Standalone file {} is opening", self.path);
            self.state = FileState::AwaitingOpen;
            self.waiting_for_open = true;
        }
    }

    pub(crate) fn on_finished(&mut self) {
        if !self.stopped_reported {
            self.has_finished = true;
        }
    }

    pub(crate) fn on_sound_created(&mut self, sound: Option<SoundHandle>) {
        self.sound = sound;
        self.sound_failed = sound.is_none();
    }

    pub(crate) fn on_sound_destroyed(&mut self) {
        self.sound = None;
    }

    /// Stops waiting for the open state. The stop itself is reported later.
    pub(crate) fn cancel_open(&mut self) {
        self.waiting_for_open = false;
    }

    /// Resolves the open state and the finished flag, emitting at most one started and
    /// one stopped notification over the request's lifetime.
    pub(crate) fn poll(&mut self, low_level: &dyn LowLevelSystem, notifier: &CompletionNotifier) {
        if self.waiting_for_open {
            if let Some(open_state) = self.open_state(low_level) {
                if !open_state.is_loading() {
                    self.report_started(open_state.is_playable(), notifier);
                }
            }
        }

        if self.has_finished {
            if !self.started_reported {
                self.report_started(false, notifier);
            }
            notifier.notify_file_stopped(self.file_id, self.file_instance_id, &self.path);
            log::debug!("Standalone file {} finished", self.path);
            self.stopped_reported = true;
            self.has_finished = false;
            self.state = FileState::Finished;
        }
    }

    /// `None` while the engine has not asked for the sound yet.
    fn open_state(&self, low_level: &dyn LowLevelSystem) -> Option<OpenState> {
        match self.sound {
            Some(sound) => Some(low_level.open_state(sound).unwrap_or_else(|e| {
                log::warn!("Open state of {} unavailable: {}", self.path, e);
                OpenState::Error
            })),
            None if self.sound_failed => Some(OpenState::Error),
            None => None,
        }
    }

    fn report_started(&mut self, success: bool, notifier: &CompletionNotifier) {
        self.waiting_for_open = false;
        if self.started_reported {
            return;
        }
        self.started_reported = true;
        self.state = if success {
            FileState::Playable
        } else {
            FileState::FailedToOpen
        };
        notifier.notify_file_started(self.file_id, self.file_instance_id, &self.path, success);
    }

    /// Returns the request to its initial state and hands back the instance to release.
    ///
    /// Fails without changing anything while the engine still holds the sound.
    pub(crate) fn reset(&mut self) -> Result<Option<InstanceHandle>> {
        if let Some(sound) = self.sound {
            return Err(SonoraError::ProtocolViolation(format!(
                "standalone file {} reset while sound {:?} is attached",
                self.path, sound
            )));
        }
        let instance = self.event.reset();
        *self = Self::new();
        Ok(instance)
    }
}

/// Standalone files whose notifications are still being resolved.
#[derive(Debug, Default)]
pub struct StandaloneFileStateMachine {
    pending: Vec<FileHandle>,
}

impl StandaloneFileStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: FileHandle) -> Result<()> {
        if self.pending.contains(&file) {
            return Err(SonoraError::ProtocolViolation(format!(
                "{} is already pending",
                file
            )));
        }
        self.pending.push(file);
        Ok(())
    }

    pub fn remove(&mut self, file: FileHandle) -> bool {
        match self.pending.iter().position(|pending| *pending == file) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, file: FileHandle) -> bool {
        self.pending.contains(&file)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn poll(
        &self,
        files: &mut HashMap<FileHandle, StandaloneFileRequest>,
        low_level: &dyn LowLevelSystem,
        notifier: &CompletionNotifier,
    ) {
        for handle in &self.pending {
            match files.get_mut(handle) {
                Some(request) => request.poll(low_level, notifier),
                None => log::error!("Pending {} has no request", handle),
            }
        }
    }
}

/// Instance callback of a standalone file's programmer-sound event.
///
/// Runs on the engine thread. Sound creation has to finish before the callback
/// returns, so it talks to the [`LowLevelSystem`] directly. The slot pairs every
/// creation with exactly one release.
pub(crate) struct ProgrammerSoundCallback {
    file: FileHandle,
    instance: InstanceHandle,
    path: String,
    mode: SoundMode,
    low_level: Arc<dyn LowLevelSystem>,
    slot: Mutex<Option<SoundHandle>>,
    sender: SignalSender,
}

impl ProgrammerSoundCallback {
    pub(crate) fn new(
        file: FileHandle,
        instance: InstanceHandle,
        path: String,
        mode: SoundMode,
        low_level: Arc<dyn LowLevelSystem>,
        sender: SignalSender,
    ) -> Self {
        Self {
            file,
            instance,
            path,
            mode,
            low_level,
            slot: Mutex::new(None),
            sender,
        }
    }

    pub(crate) fn into_callback(self) -> Arc<InstanceCallback> {
        Arc::new(
            move |kind: CallbackType, properties: &mut ProgrammerSoundProperties| {
                self.handle(kind, properties)
            },
        )
    }

    fn handle(&self, kind: CallbackType, properties: &mut ProgrammerSoundProperties) {
        let (file, instance) = (self.file, self.instance);
        match kind {
            CallbackType::Started => {
                send_signal(&self.sender, EngineSignal::FileStarted { file, instance });
            }
            CallbackType::Stopped | CallbackType::StartFailed => {
                send_signal(&self.sender, EngineSignal::FileEnded { file, instance });
            }
            CallbackType::CreateProgrammerSound => {
                properties.sound = self.create_sound();
            }
            CallbackType::DestroyProgrammerSound => {
                self.destroy_sound();
                properties.sound = None;
            }
        }
    }

    fn create_sound(&self) -> Option<SoundHandle> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sound) = *slot {
            log::error!("Programmer sound for {} requested twice", self.path);
            return Some(sound);
        }

        let sound = match self.low_level.create_sound(&self.path, self.mode) {
            Ok(sound) => Some(sound),
            Err(e) => {
                log::error!("Failed to create programmer sound {}: {}", self.path, e);
                None
            }
        };
        *slot = sound;
        send_signal(
            &self.sender,
            EngineSignal::ProgrammerSoundCreated {
                file: self.file,
                instance: self.instance,
                sound,
            },
        );
        sound
    }

    fn destroy_sound(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sound) = slot.take() else {
            log::warn!("No programmer sound to destroy for {}", self.path);
            return;
        };

        if let Err(e) = self.low_level.release_sound(sound) {
            log::error!("Failed to release programmer sound {}: {}", self.path, e);
        }
        send_signal(
            &self.sender,
            EngineSignal::ProgrammerSoundDestroyed {
                file: self.file,
                instance: self.instance,
            },
        );
    }
}
