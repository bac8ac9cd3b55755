//! Deferred construction of trace scopes
//!
//! A trace scope can be declared before the session knows whether a trace
//! will be written at all. Instead of opening its container, the scope
//! registers a [`Deferred`] description here. When a trace starts, the
//! session realizes every unrealized registration in registration order, so
//! containers open in the nesting order the scopes were declared in.
//!
//! Slots are only ever removed from the end of the list, which keeps every
//! live [`SlotId`] valid. A slot released out of order is marked dead and
//! skipped at realization.

use optrace_wire::JsonWriter;

/// Kind of container a trace scope opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// A JSON object
    Object,
    /// A JSON array
    Array,
}

impl ContainerKind {
    pub(crate) fn open(self, writer: &mut JsonWriter, name: Option<&str>) {
        if let Some(name) = name {
            writer.add_member(name);
        }
        match self {
            ContainerKind::Object => writer.start_object(),
            ContainerKind::Array => writer.start_array(),
        }
    }

    pub(crate) fn close(self, writer: &mut JsonWriter) {
        match self {
            ContainerKind::Object => writer.end_object(),
            ContainerKind::Array => writer.end_array(),
        }
    }
}

/// What a registration will open once realized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    /// Container to open
    pub kind: ContainerKind,
    /// Member name, when the container is the value of an object member
    pub name: Option<String>,
}

impl Deferred {
    fn realize(&self, writer: &mut JsonWriter) {
        self.kind.open(writer, self.name.as_deref());
    }
}

/// Handle to a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(usize);

#[derive(Debug)]
struct Slot {
    deferred: Deferred,
    /// Generation of the trace the slot was realized into
    realized: Option<u64>,
    live: bool,
}

/// Ordered registrations awaiting an active trace
#[derive(Debug, Default)]
pub struct PendingRegistry {
    slots: Vec<Slot>,
    /// Number of leading slots already realized
    cursor: usize,
}

impl PendingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope without constructing anything
    pub fn register(&mut self, deferred: Deferred) -> SlotId {
        self.slots.push(Slot {
            deferred,
            realized: None,
            live: true,
        });
        SlotId(self.slots.len() - 1)
    }

    /// Open every unrealized live registration, in registration order.
    ///
    /// Returns the number of containers opened.
    pub fn realize_all(&mut self, generation: u64, writer: &mut JsonWriter) -> usize {
        let mut opened = 0;
        for slot in &mut self.slots[self.cursor..] {
            if !slot.live {
                continue;
            }
            slot.deferred.realize(writer);
            slot.realized = Some(generation);
            opened += 1;
        }
        self.cursor = self.slots.len();
        opened
    }

    /// Generation the slot was realized into, if it has been
    pub fn realized(&self, id: SlotId) -> Option<u64> {
        self.slots
            .get(id.0)
            .filter(|slot| slot.live)
            .and_then(|slot| slot.realized)
    }

    /// Drop a registration at the end of its scope.
    ///
    /// Returns what was realized, and into which trace generation, so the
    /// caller can close the container; `None` if it never was.
    pub fn release(&mut self, id: SlotId) -> Option<(ContainerKind, u64)> {
        let slot = self.slots.get_mut(id.0)?;
        if !slot.live {
            return None;
        }
        slot.live = false;
        let realized = slot.realized.map(|generation| (slot.deferred.kind, generation));

        while self.slots.last().is_some_and(|slot| !slot.live) {
            self.slots.pop();
        }
        self.cursor = self.cursor.min(self.slots.len());
        realized
    }

    /// Number of registrations not yet realized
    pub fn unrealized(&self) -> usize {
        self.slots[self.cursor..]
            .iter()
            .filter(|slot| slot.live)
            .count()
    }

    /// Number of live registrations
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.live).count()
    }

    /// True if no live registration remains
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optrace_wire::WriterOptions;

    fn object(name: Option<&str>) -> Deferred {
        Deferred {
            kind: ContainerKind::Object,
            name: name.map(str::to_owned),
        }
    }

    fn array(name: &str) -> Deferred {
        Deferred {
            kind: ContainerKind::Array,
            name: Some(name.to_owned()),
        }
    }

    #[test]
    fn test_realizes_in_registration_order() {
        let mut registry = PendingRegistry::new();
        let outer = registry.register(object(None));
        let inner = registry.register(object(Some("join")));
        assert_eq!(registry.unrealized(), 2);

        let mut writer = JsonWriter::new(WriterOptions::default());
        assert_eq!(registry.realize_all(7, &mut writer), 2);
        assert_eq!(registry.unrealized(), 0);
        assert_eq!(registry.realized(outer), Some(7));
        assert_eq!(registry.realized(inner), Some(7));
        assert_eq!(writer.output(), "{\n  \"join\": {");
        assert_eq!(writer.depth(), 2);
    }

    #[test]
    fn test_release_before_realization_is_noop() {
        let mut registry = PendingRegistry::new();
        let id = registry.register(array("steps"));
        assert_eq!(registry.release(id), None);
        assert!(registry.is_empty());

        let mut writer = JsonWriter::new(WriterOptions::default());
        assert_eq!(registry.realize_all(1, &mut writer), 0);
        assert_eq!(writer.output(), "");
    }

    #[test]
    fn test_release_after_realization_reports_kind() {
        let mut registry = PendingRegistry::new();
        let id = registry.register(array("steps"));
        let mut writer = JsonWriter::new(WriterOptions::default());
        registry.realize_all(3, &mut writer);
        assert_eq!(registry.release(id), Some((ContainerKind::Array, 3)));
        assert_eq!(registry.release(id), None);
    }

    #[test]
    fn test_out_of_order_release_skipped_at_realization() {
        let mut registry = PendingRegistry::new();
        let first = registry.register(object(None));
        let second = registry.register(array("a"));
        let third = registry.register(array("b"));

        // Released in the middle: stays as a dead slot
        assert_eq!(registry.release(second), None);
        assert_eq!(registry.len(), 2);

        let mut writer = JsonWriter::new(WriterOptions::default());
        assert_eq!(registry.realize_all(1, &mut writer), 2);
        assert_eq!(registry.realized(second), None);

        assert!(registry.release(third).is_some());
        assert!(registry.release(first).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_later_registrations_wait_for_next_realization() {
        let mut registry = PendingRegistry::new();
        let mut writer = JsonWriter::new(WriterOptions::default());
        registry.register(object(None));
        registry.realize_all(1, &mut writer);

        let late = registry.register(array("later"));
        assert_eq!(registry.unrealized(), 1);
        assert_eq!(registry.realized(late), None);
        registry.realize_all(2, &mut writer);
        assert_eq!(registry.realized(late), Some(2));
    }
}
