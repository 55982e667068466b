pub mod audio_data;
pub mod bank;
pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod event;
pub mod events;
pub mod ids;
pub mod math;
pub mod notifier;
pub mod object;
pub mod registry;
pub mod standalone;
pub mod system;
pub mod tracker;

pub use audio_data::AudioFileData;
pub use config::SonoraImplDesc;
pub use definition::{
    DefinitionNode, Environment, EnvironmentKind, FileEntry, Parameter, SwitchState, Trigger,
    TriggerKind,
};
pub use engine::{ENGINE_HEADER_VERSION, SonoraImpl, format_version};
pub use error::{RequestStatus, Result, SonoraError};
pub use event::{EventState, TriggerEvent};
pub use events::SonoraEvent;
pub use ids::{
    EnvironmentId, EventHandle, EventId, FileHandle, FileId, FileInstanceId, ListenerId,
    ObjectId, ParameterId, PathId, SwitchStateId,
};
pub use math::{Attributes3d, Pose};
pub use notifier::CompletionNotifier;
pub use object::{AudioListener, AudioObject};
pub use registry::{AudioObjectRegistry, ControlIndex};
pub use standalone::{
    FileState, StandaloneFileInfo, StandaloneFileRequest, StandaloneFileStateMachine,
};
pub use system::{LowLevelSystem, StudioSystem, SystemError};
pub use tracker::{EventKey, PendingEventTracker};
