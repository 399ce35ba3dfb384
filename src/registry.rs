use crate::slot::{Slot, SlotClass};

/// Read-only lookup over the configured slots.
///
/// The registry never mutates slots; it is constructed once from whatever
/// the configuration collaborator produced and handed to the
/// [`crate::dispatcher::BootSlotDispatcher`] by reference.
#[derive(Debug, Clone)]
pub struct SlotRegistry {
    slots: Vec<Slot>,
}

impl SlotRegistry {
    pub fn new(slots: Vec<Slot>) -> Self {
        Self { slots }
    }

    /// Look up a slot by its configured name.
    pub fn by_name(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Look up the slot that maps to a given bootloader bootname.
    pub fn by_bootname(&self, bootname: &str) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|s| s.bootname.as_deref() == Some(bootname))
    }

    /// All slots of a given class, in configuration order. Stable order
    /// is relied on by every backend's tie-break rule when priorities or
    /// attempt counts are equal.
    pub fn by_class(&self, class: SlotClass) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(move |s| s.class == class)
    }

    pub fn rootfs_slots(&self) -> impl Iterator<Item = &Slot> {
        self.by_class(SlotClass::Rootfs)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }
}
