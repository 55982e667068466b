//! Event types for Sonora

use crate::ids::{EventId, FileId, FileInstanceId};

/// Notification delivered to the host's request queue.
///
/// Produced on the owning thread during [`SonoraImpl::update`](crate::SonoraImpl::update)
/// and drained with [`SonoraImpl::poll_events`](crate::SonoraImpl::poll_events) or from
/// any thread holding the receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum SonoraEvent {
    /// A trigger-activated event stopped or failed to start.
    EventFinished { event_id: EventId },
    /// A standalone file finished opening. `success` is false when it could not be opened.
    FileStarted {
        file_id: FileId,
        file_instance_id: FileInstanceId,
        path: String,
        success: bool,
    },
    /// A standalone file stopped playing.
    FileStopped {
        file_id: FileId,
        file_instance_id: FileInstanceId,
        path: String,
    },
}

impl SonoraEvent {
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            Self::EventFinished { event_id } => Some(*event_id),
            _ => None,
        }
    }

    pub fn file_instance_id(&self) -> Option<FileInstanceId> {
        match self {
            Self::FileStarted {
                file_instance_id, ..
            }
            | Self::FileStopped {
                file_instance_id, ..
            } => Some(*file_instance_id),
            Self::EventFinished { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::FileStarted { success: false, .. })
    }

    pub fn is_file_event(&self) -> bool {
        matches!(self, Self::FileStarted { .. } | Self::FileStopped { .. })
    }
}
