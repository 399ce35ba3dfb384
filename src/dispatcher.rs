//! Dispatcher: routes the four core operations to the configured backend.

use crate::backends::barebox::BareboxBackend;
use crate::backends::efi::EfiBackend;
use crate::backends::grub::GrubBackend;
use crate::backends::uboot::UbootBackend;
use crate::backends::Backend;
use crate::config::{BootLoaderName, SystemConfig};
use crate::process::{ProcessRunner, SystemRunner};
use crate::registry::SlotRegistry;
use crate::slot::Slot;
use crate::Error;

/// The uniform slot-selection contract, backed by one of the four
/// concrete bootloader backends.
///
/// Construction is the only place the configured bootloader name is
/// consulted; an immutable [`SystemConfig`] is passed in once rather than
/// read from a process-wide singleton.
pub struct BootSlotDispatcher<'a> {
    registry: &'a SlotRegistry,
    config: &'a SystemConfig,
    runner: Box<dyn ProcessRunner + 'a>,
}

impl<'a> BootSlotDispatcher<'a> {
    /// Build a dispatcher that spawns real subprocesses.
    pub fn new(registry: &'a SlotRegistry, config: &'a SystemConfig) -> Result<Self, Error> {
        Self::with_runner(registry, config, SystemRunner)
    }

    /// Build a dispatcher over an injected [`ProcessRunner`], the seam
    /// tests substitute a double for.
    pub fn with_runner(
        registry: &'a SlotRegistry,
        config: &'a SystemConfig,
        runner: impl ProcessRunner + 'a,
    ) -> Result<Self, Error> {
        if config.bootloader == BootLoaderName::Grub && config.grubenv_path.is_none() {
            return Err(Error::Unsupported(
                "grub bootloader requires a grubenv_path in configuration".to_string(),
            ));
        }

        Ok(Self {
            registry,
            config,
            runner: Box::new(runner),
        })
    }

    fn backend(&self) -> Result<Box<dyn Backend + '_>, Error> {
        tracing::trace!(bootloader = %self.config.bootloader, "selecting backend");
        Ok(match self.config.bootloader {
            BootLoaderName::Barebox => Box::new(BareboxBackend::new(
                self.registry,
                self.runner.as_ref(),
                self.config.max_attempts,
            )),
            BootLoaderName::Uboot => Box::new(UbootBackend::new(
                self.registry,
                self.runner.as_ref(),
                self.config.max_attempts,
            )),
            BootLoaderName::Grub => {
                let path = self
                    .config
                    .grubenv_path
                    .as_ref()
                    .and_then(|p| p.to_str())
                    .ok_or_else(|| {
                        Error::Unsupported("grubenv_path is not valid UTF-8".to_string())
                    })?;
                Box::new(GrubBackend::new(self.registry, self.runner.as_ref(), path))
            }
            BootLoaderName::Efi => Box::new(EfiBackend::new(self.registry, self.runner.as_ref())),
        })
    }

    /// Is `slot` currently bootable?
    pub fn get_state(&self, slot: &Slot) -> Result<bool, Error> {
        tracing::debug!(slot = %slot.name, "get_state");
        self.backend()?.get_state(slot)
    }

    /// Which slot will be selected on next boot?
    pub fn get_primary(&self) -> Result<Slot, Error> {
        let primary = self.backend()?.get_primary()?;
        tracing::debug!(slot = %primary.name, "get_primary");
        Ok(primary)
    }

    /// Mark `slot` good or bad.
    pub fn set_state(&self, slot: &Slot, good: bool) -> Result<(), Error> {
        tracing::debug!(slot = %slot.name, good, "set_state");
        self.backend()?.set_state(slot, good)
    }

    /// Promote `slot` to primary.
    pub fn set_primary(&self, slot: &Slot) -> Result<(), Error> {
        tracing::debug!(slot = %slot.name, "set_primary");
        self.backend()?.set_primary(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_ATTEMPTS;
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

    #[test]
    fn grub_without_path_is_unsupported() {
        let registry = SlotRegistry::new(vec![slot("rootfs.0", "A")]);
        let config = SystemConfig {
            bootloader: BootLoaderName::Grub,
            grubenv_path: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        };
        let runner = FakeRunner::new();
        let result = BootSlotDispatcher::with_runner(&registry, &config, runner);
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }

    #[test]
    fn not_bootable_slot_is_rejected_before_any_subprocess_call() {
        let registry = SlotRegistry::new(vec![Slot {
            name: "recovery.0".to_string(),
            bootname: None,
            class: SlotClass::Recovery,
            device: "/dev/recovery-0".to_string(),
            readonly: true,
        }]);
        let config = SystemConfig {
            bootloader: BootLoaderName::Barebox,
            grubenv_path: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        };
        let runner = FakeRunner::new();
        let dispatcher = BootSlotDispatcher::with_runner(&registry, &config, runner).unwrap();
        let slot = registry.by_name("recovery.0").unwrap();
        let result = dispatcher.get_state(slot);
        assert!(matches!(result, Err(Error::NotBootable(_))));
    }
}
