//! Cross-thread completion signalling.
//!
//! Engine callbacks run on the engine's mixing thread. They never touch adapter state;
//! they only push an [`EngineSignal`] into a channel that the owning thread drains at the
//! start of every update. Host notifications leave through a [`CompletionNotifier`].

use crate::events::SonoraEvent;
use crate::ids::{EventHandle, EventId, FileHandle, FileId, FileInstanceId};
use crate::system::{
    CallbackType, InstanceCallback, InstanceHandle, ProgrammerSoundProperties, SoundHandle,
};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;

/// Fact observed by an engine callback, addressed by the adapter key captured in the
/// callback and the instance it was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineSignal {
    /// A trigger event stopped or failed to start.
    EventEnded {
        event: EventHandle,
        instance: InstanceHandle,
    },
    /// The programmer-sound event of a standalone file started playing.
    FileStarted {
        file: FileHandle,
        instance: InstanceHandle,
    },
    /// The programmer-sound event of a standalone file stopped or failed to start.
    FileEnded {
        file: FileHandle,
        instance: InstanceHandle,
    },
    /// A sound was handed to the engine. `None` when it could not be created.
    ProgrammerSoundCreated {
        file: FileHandle,
        instance: InstanceHandle,
        sound: Option<SoundHandle>,
    },
    ProgrammerSoundDestroyed {
        file: FileHandle,
        instance: InstanceHandle,
    },
}

pub(crate) type SignalSender = Sender<EngineSignal>;
pub(crate) type SignalReceiver = Receiver<EngineSignal>;

pub(crate) fn signal_channel() -> (SignalSender, SignalReceiver) {
    unbounded()
}

/// Sends without blocking. A closed channel only happens after the adapter is gone.
pub(crate) fn send_signal(sender: &SignalSender, signal: EngineSignal) {
    if let Err(e) = sender.send(signal) {
        log::debug!("Dropping engine signal after shutdown: {:?}", e.into_inner());
    }
}

/// Callback attached to the instance of a start trigger.
pub(crate) fn event_callback(
    event: EventHandle,
    instance: InstanceHandle,
    sender: SignalSender,
) -> Arc<InstanceCallback> {
    Arc::new(move |kind: CallbackType, _: &mut ProgrammerSoundProperties| {
        if matches!(kind, CallbackType::Stopped | CallbackType::StartFailed) {
            send_signal(&sender, EngineSignal::EventEnded { event, instance });
        }
    })
}

/// Thread-safe path from the adapter into the host's request queue.
///
/// Translation only: every call turns an internal fact into one [`SonoraEvent`]. The
/// queue is unbounded so a notification never blocks the caller.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    sender: Sender<SonoraEvent>,
}

impl CompletionNotifier {
    pub fn new() -> (Self, Receiver<SonoraEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    pub fn notify_finished(&self, event_id: EventId) {
        self.push(SonoraEvent::EventFinished { event_id });
    }

    pub fn notify_file_started(
        &self,
        file_id: FileId,
        file_instance_id: FileInstanceId,
        path: &str,
        success: bool,
    ) {
        self.push(SonoraEvent::FileStarted {
            file_id,
            file_instance_id,
            path: path.to_string(),
            success,
        });
    }

    pub fn notify_file_stopped(&self, file_id: FileId, file_instance_id: FileInstanceId, path: &str) {
        self.push(SonoraEvent::FileStopped {
            file_id,
            file_instance_id,
            path: path.to_string(),
        });
    }

    fn push(&self, event: SonoraEvent) {
        if let Err(e) = self.sender.send(event) {
            log::error!("Host request queue is closed, dropping {:?}", e.into_inner());
        }
    }
}
