//! Parsing of trigger, parameter, switch, environment and file-entry definitions.
//!
//! Definitions arrive as [`DefinitionNode`]s: a tag plus named string attributes. Tags
//! are matched case-insensitively. Unknown tags and paths the engine cannot resolve are
//! logged as warnings and produce no definition.

use crate::ids::{EnvironmentId, ParameterId, PathId, SwitchStateId};
use crate::system::{BankHandle, BusHandle, DescriptionHandle, Guid, StudioSystem};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

pub const EVENT_TAG: &str = "SonoraEvent";
pub const SNAPSHOT_TAG: &str = "SonoraSnapshot";
pub const EVENT_PARAMETER_TAG: &str = "SonoraEventParameter";
pub const SNAPSHOT_PARAMETER_TAG: &str = "SonoraSnapshotParameter";
pub const FILE_TAG: &str = "SonoraFile";
pub const BUS_TAG: &str = "SonoraBus";

pub const NAME_ATTRIBUTE: &str = "name";
pub const VALUE_ATTRIBUTE: &str = "value";
pub const MULTIPLIER_ATTRIBUTE: &str = "value_multiplier";
pub const SHIFT_ATTRIBUTE: &str = "value_shift";
pub const PATH_ATTRIBUTE: &str = "path";
pub const LOCALIZED_ATTRIBUTE: &str = "localized";
pub const EVENT_TYPE_ATTRIBUTE: &str = "event_type";

pub const EVENT_PREFIX: &str = "event:/";
pub const SNAPSHOT_PREFIX: &str = "snapshot:/";
pub const BUS_PREFIX: &str = "bus:/";

/// In-memory banks are mapped directly by the engine and need this alignment.
pub const BANK_MEMORY_ALIGNMENT: usize = 32;

/// A structured definition as handed over by the host's definition parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionNode {
    tag: String,
    attributes: HashMap<String, String>,
}

impl DefinitionNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Parses an attribute, `None` when it is missing or malformed.
    pub fn parse_attribute<T: FromStr>(&self, name: &str) -> Option<T> {
        self.attribute(name).and_then(|value| value.trim().parse().ok())
    }

    fn attribute_or_empty(&self, name: &str) -> &str {
        self.attribute(name).unwrap_or_default()
    }

    fn flag(&self, name: &str) -> bool {
        self.attribute(name)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Creates and starts an event instance
    Start,
    /// Stops instances of the same path already playing on the addressed object
    Stop,
}

/// A host trigger bound to an event or snapshot definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    path: String,
    path_id: PathId,
    kind: TriggerKind,
    guid: Guid,
    description: Option<DescriptionHandle>,
}

impl Trigger {
    pub fn parse(node: &DefinitionNode, system: &dyn StudioSystem) -> Option<Self> {
        let (prefix, is_snapshot) = if node.is(EVENT_TAG) {
            (EVENT_PREFIX, false)
        } else if node.is(SNAPSHOT_TAG) {
            (SNAPSHOT_PREFIX, true)
        } else {
            log::warn!("Unknown trigger tag: {}", node.tag());
            return None;
        };

        let path = format!("{}{}", prefix, node.attribute_or_empty(NAME_ATTRIBUTE));
        let guid = match system.lookup_id(&path) {
            Ok(guid) => guid,
            Err(e) => {
                log::warn!("Unknown {}: {} ({})", if is_snapshot { "snapshot" } else { "event" }, path, e);
                return None;
            }
        };

        let kind = match node.attribute(EVENT_TYPE_ATTRIBUTE) {
            Some(kind) if kind.eq_ignore_ascii_case("stop") => TriggerKind::Stop,
            _ => TriggerKind::Start,
        };

        // Events resolve their description when activated, snapshots right away.
        let description = if is_snapshot {
            system.event_by_id(guid).ok()
        } else {
            None
        };

        Some(Self {
            path_id: PathId::from_path(&path),
            path,
            kind,
            guid,
            description,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_id(&self) -> PathId {
        self.path_id
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn description(&self) -> Option<DescriptionHandle> {
        self.description
    }
}

fn control_prefix(node: &DefinitionNode) -> Option<&'static str> {
    if node.is(EVENT_PARAMETER_TAG) {
        Some(EVENT_PREFIX)
    } else if node.is(SNAPSHOT_PARAMETER_TAG) {
        Some(SNAPSHOT_PREFIX)
    } else {
        None
    }
}

/// A continuous control mapped onto a named parameter of one event definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    id: ParameterId,
    path_id: PathId,
    name: String,
    multiplier: f32,
    shift: f32,
}

impl Parameter {
    pub(crate) fn parse(node: &DefinitionNode, id: ParameterId) -> Option<Self> {
        let Some(prefix) = control_prefix(node) else {
            log::warn!("Unknown parameter tag: {}", node.tag());
            return None;
        };
        let path = format!("{}{}", prefix, node.attribute_or_empty(PATH_ATTRIBUTE));

        Some(Self {
            id,
            path_id: PathId::from_path(&path),
            name: node.attribute_or_empty(NAME_ATTRIBUTE).to_string(),
            multiplier: node.parse_attribute(MULTIPLIER_ATTRIBUTE).unwrap_or(1.0),
            shift: node.parse_attribute(SHIFT_ATTRIBUTE).unwrap_or(0.0),
        })
    }

    pub fn id(&self) -> ParameterId {
        self.id
    }

    /// Path id of the event definition the parameter belongs to.
    pub fn path_id(&self) -> PathId {
        self.path_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maps a host value onto the engine parameter range.
    pub fn scaled(&self, value: f32) -> f32 {
        value * self.multiplier + self.shift
    }
}

/// A discrete state written as a fixed value to a named event parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchState {
    id: SwitchStateId,
    path_id: PathId,
    name: String,
    value: f32,
}

impl SwitchState {
    pub(crate) fn parse(node: &DefinitionNode, id: SwitchStateId) -> Option<Self> {
        let Some(prefix) = control_prefix(node) else {
            log::warn!("Unknown switch tag: {}", node.tag());
            return None;
        };
        let path = format!("{}{}", prefix, node.attribute_or_empty(PATH_ATTRIBUTE));

        Some(Self {
            id,
            path_id: PathId::from_path(&path),
            name: node.attribute_or_empty(NAME_ATTRIBUTE).to_string(),
            value: node.parse_attribute(VALUE_ATTRIBUTE).unwrap_or(0.0),
        })
    }

    pub fn id(&self) -> SwitchStateId {
        self.id
    }

    pub fn path_id(&self) -> PathId {
        self.path_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// What an environment amount drives inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentKind {
    /// Send level from each event into a reverb bus
    Bus(BusHandle),
    /// Intensity of a snapshot kept alive per object
    Snapshot(DescriptionHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    id: EnvironmentId,
    kind: EnvironmentKind,
}

impl Environment {
    pub(crate) fn parse(
        node: &DefinitionNode,
        id: EnvironmentId,
        system: &dyn StudioSystem,
    ) -> Option<Self> {
        let name = node.attribute_or_empty(NAME_ATTRIBUTE);

        if node.is(BUS_TAG) {
            let path = format!("{}{}", BUS_PREFIX, name);
            let bus = system
                .lookup_id(&path)
                .and_then(|guid| system.bus_by_id(guid));
            match bus {
                Ok(bus) => Some(Self {
                    id,
                    kind: EnvironmentKind::Bus(bus),
                }),
                Err(e) => {
                    log::warn!("Unknown bus: {} ({})", path, e);
                    None
                }
            }
        } else if node.is(SNAPSHOT_TAG) {
            let path = format!("{}{}", SNAPSHOT_PREFIX, name);
            let description = system
                .lookup_id(&path)
                .and_then(|guid| system.event_by_id(guid));
            match description {
                Ok(description) => Some(Self {
                    id,
                    kind: EnvironmentKind::Snapshot(description),
                }),
                Err(e) => {
                    log::warn!("Unknown snapshot: {} ({})", path, e);
                    None
                }
            }
        } else {
            log::warn!("Unknown environment tag: {}", node.tag());
            None
        }
    }

    pub fn id(&self) -> EnvironmentId {
        self.id
    }

    pub fn kind(&self) -> EnvironmentKind {
        self.kind
    }
}

/// A bank file the host loads into memory and registers with the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    file_name: String,
    localized: bool,
    memory_alignment: usize,
    pub(crate) bank: Option<BankHandle>,
    pub(crate) data: Option<Arc<[u8]>>,
}

impl FileEntry {
    pub fn parse(node: &DefinitionNode) -> Option<Self> {
        if !node.is(FILE_TAG) {
            log::warn!("Unknown audio file entry tag: {}", node.tag());
            return None;
        }
        let Some(file_name) = node.attribute(NAME_ATTRIBUTE).filter(|name| !name.is_empty()) else {
            log::warn!("Audio file entry without a name");
            return None;
        };

        Some(Self {
            file_name: file_name.to_string(),
            localized: node.flag(LOCALIZED_ATTRIBUTE),
            memory_alignment: BANK_MEMORY_ALIGNMENT,
            bank: None,
            data: None,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn is_localized(&self) -> bool {
        self.localized
    }

    /// Alignment the host must give the buffer passed to `register_in_memory_file`.
    pub fn memory_alignment(&self) -> usize {
        self.memory_alignment
    }

    pub(crate) fn set_memory_alignment(&mut self, alignment: usize) {
        self.memory_alignment = alignment;
    }

    pub fn is_loaded(&self) -> bool {
        self.bank.is_some()
    }
}
