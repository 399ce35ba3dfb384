//! EFI backend: `efibootmgr`.
//!
//! `efibootmgr` prints a `BootOrder:` summary line plus one `Boot####`
//! line per entry, where a trailing `*` marks the entry active.

use crate::process::{run_checked, ProcessRunner};
use crate::registry::SlotRegistry;
use crate::slot::Slot;
use crate::Error;

use super::Backend;

const TOOL: &str = "efibootmgr";

#[derive(Debug, Clone, Default, PartialEq)]
struct EfiEntry {
    id: String,
    label: String,
    active: bool,
}

#[derive(Debug, Clone, Default)]
struct EfiListing {
    boot_order: Vec<String>,
    entries: Vec<EfiEntry>,
}

impl EfiListing {
    fn parse(output: &str) -> Result<Self, Error> {
        let mut listing = Self::default();

        for line in output.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("BootOrder:") {
                listing.boot_order = rest.trim().split(',').map(|s| s.trim().to_string()).collect();
                continue;
            }
            if line.starts_with("BootCurrent:") || line.starts_with("BootNext:") {
                continue;
            }

            let Some(rest) = line.strip_prefix("Boot") else {
                continue;
            };
            if rest.len() < 4 {
                return Err(Error::parse(line.to_string()));
            }
            let (id, rest) = rest.split_at(4);
            let (active, label) = match rest.strip_prefix('*') {
                Some(label) => (true, label),
                None => (false, rest),
            };
            let Some(label) = label.strip_prefix(' ') else {
                return Err(Error::parse(line.to_string()));
            };

            listing.entries.push(EfiEntry {
                id: id.to_string(),
                label: label.trim().to_string(),
                active,
            });
        }

        Ok(listing)
    }

    fn by_label(&self, label: &str) -> Option<&EfiEntry> {
        self.entries.iter().find(|e| e.label == label)
    }
}

pub struct EfiBackend<'a> {
    registry: &'a SlotRegistry,
    runner: &'a dyn ProcessRunner,
}

impl<'a> EfiBackend<'a> {
    pub fn new(registry: &'a SlotRegistry, runner: &'a dyn ProcessRunner) -> Self {
        Self { registry, runner }
    }

    fn list(&self) -> Result<EfiListing, Error> {
        let output = run_checked(self.runner, TOOL, &[])?;
        EfiListing::parse(&output)
    }

    fn entry_for(&self, listing: &EfiListing, slot: &Slot) -> Result<Option<EfiEntry>, Error> {
        let bootname = slot.bootname()?;
        Ok(listing.by_label(bootname).cloned())
    }
}

impl Backend for EfiBackend<'_> {
    fn get_state(&self, slot: &Slot) -> Result<bool, Error> {
        let listing = self.list()?;
        Ok(self
            .entry_for(&listing, slot)?
            .map(|e| e.active)
            .unwrap_or(false))
    }

    fn get_primary(&self) -> Result<Slot, Error> {
        let listing = self.list()?;
        for id in &listing.boot_order {
            let Some(entry) = listing.entries.iter().find(|e| &e.id == id) else {
                continue;
            };
            if !entry.active {
                continue;
            }
            if let Some(slot) = self.registry.by_bootname(&entry.label) {
                return Ok(slot.clone());
            }
        }
        Err(Error::NoPrimary)
    }

    fn set_state(&self, slot: &Slot, good: bool) -> Result<(), Error> {
        let listing = self.list()?;
        let entry = self
            .entry_for(&listing, slot)?
            .ok_or_else(|| Error::parse(format!("no efibootmgr entry for '{}'", slot.name)))?;
        let flag = if good { "-a" } else { "-A" };
        run_checked(self.runner, TOOL, &["-b", &entry.id, flag])?;
        Ok(())
    }

    fn set_primary(&self, slot: &Slot) -> Result<(), Error> {
        let listing = self.list()?;
        let entry = self
            .entry_for(&listing, slot)?
            .ok_or_else(|| Error::parse(format!("no efibootmgr entry for '{}'", slot.name)))?;

        let mut new_order = vec![entry.id.clone()];
        new_order.extend(listing.boot_order.iter().filter(|id| **id != entry.id).cloned());
        let joined = new_order.join(",");

        run_checked(self.runner, TOOL, &["-o", &joined])?;
        run_checked(self.runner, TOOL, &["-b", &entry.id, "-a"])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::FakeRunner;
    use crate::slot::SlotClass;

    fn slot(name: &str, bootname: &str) -> Slot {
        Slot {
            name: name.to_string(),
            bootname: Some(bootname.to_string()),
            class: SlotClass::Rootfs,
            device: format!("/dev/{name}"),
            readonly: false,
        }
    }

    fn registry() -> SlotRegistry {
        SlotRegistry::new(vec![slot("rootfs.0", "system0"), slot("rootfs.1", "system1")])
    }

    const SAMPLE: &str = "\
BootCurrent: 0001
BootNext: 0002
BootOrder: 0001,0002,0003
Boot0001* system0
Boot0002* system1
Boot0003  recovery
";

    #[test]
    fn parses_entries_and_active_flag() {
        let listing = EfiListing::parse(SAMPLE).unwrap();
        assert_eq!(listing.boot_order, vec!["0001", "0002", "0003"]);
        assert_eq!(listing.entries.len(), 3);
        assert!(listing.by_label("system0").unwrap().active);
        assert!(!listing.by_label("recovery").unwrap().active);
    }

    #[test]
    fn get_primary_is_first_active_mapped_entry() {
        let runner = FakeRunner::new();
        runner.push_ok(SAMPLE);
        let reg = registry();
        let backend = EfiBackend::new(&reg, &runner);
        assert_eq!(backend.get_primary().unwrap().name, "rootfs.0");
    }

    #[test]
    fn get_state_false_for_inactive_entry() {
        let runner = FakeRunner::new();
        runner.push_ok(SAMPLE);
        let reg = registry();
        let backend = EfiBackend::new(&reg, &runner);
        // rootfs.1 maps to system1, which is active in SAMPLE.
        assert!(backend
            .get_state(reg.by_name("rootfs.1").unwrap())
            .unwrap());
    }
}
