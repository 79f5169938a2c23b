use crate::queue::QueueItem;
use model::ObjectRef;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// What a worker should do with an object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EventType {
    Observe,
    Create,
    Update,
    Delete,
}

serde_plain::derive_display_from_serialize!(EventType);

/// A unit of work. It carries no document: workers always read the live object.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) struct Event {
    pub(crate) event_type: EventType,
    pub(crate) object_ref: ObjectRef,
}

impl Event {
    pub(crate) fn new(event_type: EventType, object_ref: ObjectRef) -> Self {
        Self {
            event_type,
            object_ref,
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.event_type, self.object_ref)
    }
}

impl QueueItem for Event {
    type Key = ObjectRef;

    fn key(&self) -> &ObjectRef {
        &self.object_ref
    }
}
