use crate::error::{Result, SonoraError};
use crate::ids::{EventId, ObjectId, PathId};
use crate::system::InstanceHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// Instance created, waiting for the engine to make it ready
    Pending,
    /// Attached to its object and started
    Active,
    /// The engine reported stop or start failure
    Finished,
}

/// One activation of a start trigger.
///
/// The owning object is kept as an [`ObjectId`], never a reference. Lookups through a
/// deleted object simply fail.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    id: Option<EventId>,
    instance: Option<InstanceHandle>,
    object: Option<ObjectId>,
    path_id: Option<PathId>,
    state: EventState,
}

impl TriggerEvent {
    pub fn new(id: EventId) -> Self {
        Self {
            id: Some(id),
            ..Self::detached()
        }
    }

    /// An event the host never hears about, such as the one driving a standalone file.
    pub(crate) fn detached() -> Self {
        Self {
            id: None,
            instance: None,
            object: None,
            path_id: None,
            state: EventState::Pending,
        }
    }

    pub fn id(&self) -> Option<EventId> {
        self.id
    }

    pub fn instance(&self) -> Option<InstanceHandle> {
        self.instance
    }

    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    pub fn path_id(&self) -> Option<PathId> {
        self.path_id
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.instance.is_some()
    }

    pub(crate) fn bind(
        &mut self,
        instance: InstanceHandle,
        object: ObjectId,
        path_id: PathId,
    ) -> Result<()> {
        if let Some(current) = self.instance {
            return Err(SonoraError::ProtocolViolation(format!(
                "event is already bound to instance {:?}",
                current
            )));
        }
        self.instance = Some(instance);
        self.object = Some(object);
        self.path_id = Some(path_id);
        self.state = EventState::Pending;
        Ok(())
    }

    pub(crate) fn mark_active(&mut self) {
        if self.state == EventState::Pending {
            self.state = EventState::Active;
        }
    }

    /// Returns true only for the first call on a bound event.
    pub(crate) fn mark_finished(&mut self) -> bool {
        if !self.is_bound() || self.state == EventState::Finished {
            return false;
        }
        self.state = EventState::Finished;
        true
    }

    /// Clears the binding and hands back the instance so the caller can release it.
    pub(crate) fn reset(&mut self) -> Option<InstanceHandle> {
        self.object = None;
        self.path_id = None;
        self.state = EventState::Pending;
        self.instance.take()
    }
}
