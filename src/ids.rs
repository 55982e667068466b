//! Identifiers passed between the host and the adapter.

use std::fmt;

/// Identifier of a spatial audio object.
///
/// [`ObjectId::GLOBAL`] is the sentinel that addresses every registered object at once.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub const GLOBAL: ObjectId = ObjectId(0);

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_global(self) -> bool {
        self == Self::GLOBAL
    }

    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

impl ListenerId {
    pub const DEFAULT: ListenerId = ListenerId(0);

    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// Host-visible identifier of an event, reported back in finished notifications.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventId(pub u32);

/// Host-visible identifier of a standalone file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Host-visible identifier of one playback of a standalone file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileInstanceId(pub u32);

/// Adapter key of a [`TriggerEvent`](crate::TriggerEvent). Never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventHandle(pub(crate) u64);

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandle({})", self.0)
    }
}

/// Adapter key of a [`StandaloneFileRequest`](crate::StandaloneFileRequest). Never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileHandle(pub(crate) u64);

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle({})", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParameterId(pub(crate) u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SwitchStateId(pub(crate) u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnvironmentId(pub(crate) u32);

/// Case-insensitive hash of an engine path such as `event:/ui/click`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathId(u32);

impl PathId {
    pub fn from_path(path: &str) -> Self {
        Self(crc32_lowercase(path.as_bytes()))
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// IEEE CRC-32 over the ASCII-lowercased input.
fn crc32_lowercase(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;
    for byte in bytes {
        crc ^= byte.to_ascii_lowercase() as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
