//! Boundary to the native mixing engine.
//!
//! The adapter drives the engine through two traits:
//! - [`StudioSystem`]: event definitions, instances, buses, banks and listeners. Only ever
//!   called from the thread that owns the [`SonoraImpl`](crate::SonoraImpl).
//! - [`LowLevelSystem`]: raw sound resources. Shared as an `Arc` because programmer-sound
//!   requests arrive on the engine's own mixing thread and must be served synchronously.
//!
//! Instance callbacks are plain closures ([`InstanceCallback`]). They replace the engine's
//! untyped user-data pointer: whatever a callback needs to identify its owner is captured
//! by value when the callback is attached.

mod byte_source;
#[cfg(test)]
pub(crate) mod mock;

pub use byte_source::{ByteSource, FileByteSource};

use crate::math::Attributes3d;
use std::ops::BitOr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SystemError {
    #[error("engine is not initialized")]
    Uninitialized,

    #[error("invalid handle")]
    InvalidHandle,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("file error: {0}")]
    File(String),

    #[error("engine error: {0}")]
    Engine(String),
}

pub type SystemResult<T> = std::result::Result<T, SystemError>;

macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

engine_handle!(
    /// Identity of a definition as stored in the loaded banks.
    Guid
);
engine_handle!(
    /// An event or snapshot definition.
    DescriptionHandle
);
engine_handle!(
    /// A live instance created from a [`DescriptionHandle`].
    InstanceHandle
);
engine_handle!(
    /// A raw sound resource, usually created for a programmer sound.
    SoundHandle
);
engine_handle!(BusHandle);
engine_handle!(BankHandle);

/// Reasons the engine invokes an [`InstanceCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackType {
    Started,
    Stopped,
    StartFailed,
    /// The engine needs a sound for a programmer instrument. The callback must place a
    /// ready-to-use handle into [`ProgrammerSoundProperties::sound`] before returning.
    CreateProgrammerSound,
    /// The engine is done with the sound in [`ProgrammerSoundProperties::sound`].
    DestroyProgrammerSound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackMask(u32);

impl CallbackMask {
    pub const STARTED: Self = Self(1);
    pub const STOPPED: Self = Self(1 << 1);
    pub const START_FAILED: Self = Self(1 << 2);
    pub const CREATE_PROGRAMMER_SOUND: Self = Self(1 << 3);
    pub const DESTROY_PROGRAMMER_SOUND: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);

    pub fn contains(self, kind: CallbackType) -> bool {
        let bit = match kind {
            CallbackType::Started => Self::STARTED,
            CallbackType::Stopped => Self::STOPPED,
            CallbackType::StartFailed => Self::START_FAILED,
            CallbackType::CreateProgrammerSound => Self::CREATE_PROGRAMMER_SOUND,
            CallbackType::DestroyProgrammerSound => Self::DESTROY_PROGRAMMER_SOUND,
        };
        self.0 & bit.0 != 0
    }
}

impl BitOr for CallbackMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// In/out parameters of the programmer-sound callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgrammerSoundProperties {
    pub sound: Option<SoundHandle>,
}

/// Callback attached to an event instance.
///
/// May be invoked on the engine's internal thread. Implementations must not block and
/// must not touch state owned by the adapter's thread.
pub type InstanceCallback = dyn Fn(CallbackType, &mut ProgrammerSoundProperties) + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    AllowFadeout,
    Immediate,
}

/// How a raw sound is created. Both modes open asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundMode {
    /// Decode from disk while playing
    Stream,
    /// Load fully into memory in compressed form
    CompressedSample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    Ready,
    Loading,
    Error,
    Connecting,
    Buffering,
    Seeking,
    Playing,
    SetPosition,
}

impl OpenState {
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }

    /// True when the sound can be heard, either ready to play or already playing.
    pub fn is_playable(self) -> bool {
        matches!(self, Self::Ready | Self::Playing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingState {
    Unloading,
    Unloaded,
    Loading,
    Loaded,
    Error,
}

/// Settings passed to [`StudioSystem::initialize`].
#[derive(Debug, Clone, PartialEq)]
pub struct InitSettings {
    pub max_channels: u32,
    pub live_update: bool,
    pub synchronous_update: bool,
    pub doppler_scale: f32,
    pub distance_factor: f32,
    pub rolloff_scale: f32,
}

/// Raw sound services. Safe to call from any thread.
pub trait LowLevelSystem: Send + Sync {
    fn version(&self) -> SystemResult<u32>;

    /// Starts opening `path`. The returned sound is usable immediately, its
    /// [`OpenState`] reports when the data is actually available.
    fn create_sound(&self, path: &str, mode: SoundMode) -> SystemResult<SoundHandle>;

    fn open_state(&self, sound: SoundHandle) -> SystemResult<OpenState>;

    fn release_sound(&self, sound: SoundHandle) -> SystemResult<()>;
}

/// High-level engine services. Called from the owning thread only.
pub trait StudioSystem {
    fn initialize(&self, settings: &InitSettings) -> SystemResult<()>;

    fn release(&self) -> SystemResult<()>;

    /// Runs one engine tick. Instance callbacks may fire during or after this call.
    fn update(&self) -> SystemResult<()>;

    fn low_level_system(&self) -> Arc<dyn LowLevelSystem>;

    fn lookup_id(&self, path: &str) -> SystemResult<Guid>;

    fn event_by_id(&self, guid: Guid) -> SystemResult<DescriptionHandle>;

    fn bus_by_id(&self, guid: Guid) -> SystemResult<BusHandle>;

    fn bus(&self, path: &str) -> SystemResult<BusHandle>;

    fn has_user_property(&self, description: DescriptionHandle, name: &str) -> bool;

    /// Position of the named parameter within the description's parameter list.
    fn parameter_index(&self, description: DescriptionHandle, name: &str) -> SystemResult<usize>;

    fn create_instance(&self, description: DescriptionHandle) -> SystemResult<InstanceHandle>;

    fn description_of(&self, instance: InstanceHandle) -> SystemResult<DescriptionHandle>;

    fn set_callback(
        &self,
        instance: InstanceHandle,
        callback: Arc<InstanceCallback>,
        mask: CallbackMask,
    ) -> SystemResult<()>;

    fn set_3d_attributes(
        &self,
        instance: InstanceHandle,
        attributes: &Attributes3d,
    ) -> SystemResult<()>;

    /// True once the engine has built the instance's signal chain so it can be started
    /// and have parameters applied.
    fn is_instance_ready(&self, instance: InstanceHandle) -> bool;

    fn start(&self, instance: InstanceHandle) -> SystemResult<()>;

    fn stop(&self, instance: InstanceHandle, mode: StopMode) -> SystemResult<()>;

    fn release_instance(&self, instance: InstanceHandle) -> SystemResult<()>;

    fn set_parameter_by_index(
        &self,
        instance: InstanceHandle,
        index: usize,
        value: f32,
    ) -> SystemResult<()>;

    fn set_parameter_by_name(
        &self,
        instance: InstanceHandle,
        name: &str,
        value: f32,
    ) -> SystemResult<()>;

    fn set_bus_send(&self, instance: InstanceHandle, bus: BusHandle, amount: f32)
    -> SystemResult<()>;

    fn set_obstruction_occlusion(
        &self,
        instance: InstanceHandle,
        obstruction: f32,
        occlusion: f32,
    ) -> SystemResult<()>;

    fn set_listener_attributes(&self, listener: u32, attributes: &Attributes3d)
    -> SystemResult<()>;

    fn set_bus_mute(&self, bus: BusHandle, mute: bool) -> SystemResult<()>;

    fn stop_all_bus_events(&self, bus: BusHandle, mode: StopMode) -> SystemResult<()>;

    /// Loads a bank that points into `data` without copying it. The buffer has to stay
    /// alive until [`StudioSystem::bank_loading_state`] no longer reports `Unloading`.
    fn load_bank_memory(&self, data: Arc<[u8]>) -> SystemResult<BankHandle>;

    /// Loads a bank whose bytes are pulled through `source`.
    fn load_bank_custom(&self, source: Box<dyn ByteSource>) -> SystemResult<BankHandle>;

    /// Starts unloading a bank. Completion is observed through `bank_loading_state`.
    fn unload_bank(&self, bank: BankHandle) -> SystemResult<()>;

    fn bank_loading_state(&self, bank: BankHandle) -> SystemResult<LoadingState>;

    fn bank_buses(&self, bank: BankHandle) -> SystemResult<Vec<BusHandle>>;

    fn lock_channel_group(&self, bus: BusHandle) -> SystemResult<()>;
}
