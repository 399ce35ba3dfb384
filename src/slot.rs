use serde::Deserialize;

/// Role tag for a slot. Only `Rootfs` slots participate in primary
/// selection; other classes are addressable by name but never candidates
/// for `get_primary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotClass {
    Rootfs,
    Recovery,
    Rescue,
}

/// A slot as supplied by the configuration collaborator. The core treats
/// this as read-only input; it never constructs or persists slots itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Slot {
    /// Unique identifier within a slot class, e.g. `rootfs.0`.
    pub name: String,

    /// The name the bootloader uses for this slot, e.g. `system0`, `A`,
    /// `recover`. Absent for slots the bootloader never selects.
    pub bootname: Option<String>,

    pub class: SlotClass,

    /// Opaque to the core; used only for identity by the caller.
    pub device: String,

    #[serde(default)]
    pub readonly: bool,
}

impl Slot {
    /// Returns the bootname, or `Error::NotBootable` if this slot can't be
    /// selected by a bootloader.
    pub fn bootname(&self) -> Result<&str, crate::Error> {
        self.bootname
            .as_deref()
            .ok_or_else(|| crate::Error::NotBootable(self.name.clone()))
    }
}
