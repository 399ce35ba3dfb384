//! U-Boot backend: `fw_printenv` / `fw_setenv`.
//!
//! `BOOT_ORDER` is a whitespace-separated preference list, bootnames are
//! verbatim (no case folding), and `set_primary` only ever reorders — it
//! never touches another slot's `_LEFT` counter.

use crate::process::{run_checked, ProcessRunner};
use crate::registry::SlotRegistry;
use crate::slot::Slot;
use crate::Error;

use super::{Backend, BootEntry};

const PRINTENV: &str = "fw_printenv";
const SETENV: &str = "fw_setenv";

struct UbootEnv {
    order: Vec<String>,
    left: Vec<(String, u32)>,
}

impl UbootEnv {
    fn read(runner: &dyn ProcessRunner) -> Result<Self, Error> {
        let dump = run_checked(runner, PRINTENV, &[])?;
        let pairs = crate::envparser::parse_env_blob(&dump)?;

        let order = pairs
            .iter()
            .find(|(k, _)| k == "BOOT_ORDER")
            .map(|(_, v)| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let mut left = Vec::new();
        for (key, value) in &pairs {
            let Some(bootname) = key
                .strip_prefix("BOOT_")
                .and_then(|rest| rest.strip_suffix("_LEFT"))
            else {
                continue;
            };
            let n: u32 = value
                .parse()
                .map_err(|_| Error::parse(format!("{key}={value}")))?;
            left.push((bootname.to_string(), n));
        }

        Ok(Self { order, left })
    }

    fn left_for(&self, bootname: &str) -> u32 {
        self.left
            .iter()
            .find(|(b, _)| b == bootname)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    fn in_order(&self, bootname: &str) -> bool {
        self.order.iter().any(|b| b == bootname)
    }
}

pub struct UbootBackend<'a> {
    registry: &'a SlotRegistry,
    runner: &'a dyn ProcessRunner,
    max_attempts: u32,
}

impl<'a> UbootBackend<'a> {
    pub fn new(registry: &'a SlotRegistry, runner: &'a dyn ProcessRunner, max_attempts: u32) -> Self {
        Self {
            registry,
            runner,
            max_attempts,
        }
    }

    fn set_left(&self, bootname: &str, value: u32) -> Result<(), Error> {
        let var = format!("BOOT_{bootname}_LEFT");
        run_checked(self.runner, SETENV, &[&var, &value.to_string()])?;
        Ok(())
    }

    fn set_order(&self, order: &[String]) -> Result<(), Error> {
        let joined = order.join(" ");
        run_checked(self.runner, SETENV, &["BOOT_ORDER", &joined])?;
        Ok(())
    }
}

impl Backend for UbootBackend<'_> {
    fn get_state(&self, slot: &Slot) -> Result<bool, Error> {
        let bootname = slot.bootname()?;
        let env = UbootEnv::read(self.runner)?;
        let entry = BootEntry {
            in_order: env.in_order(bootname),
            attempts: env.left_for(bootname),
            ..Default::default()
        };
        let good = entry.good_by_order();
        tracing::trace!(bootname, state = ?entry.classify(good, false), "uboot entry");
        Ok(good)
    }

    fn get_primary(&self) -> Result<Slot, Error> {
        let env = UbootEnv::read(self.runner)?;

        for bootname in &env.order {
            let left = env.left_for(bootname);
            if left == 0 {
                continue;
            }
            return match self.registry.by_bootname(bootname) {
                Some(slot) => {
                    let entry = BootEntry {
                        in_order: true,
                        attempts: left,
                        ..Default::default()
                    };
                    tracing::trace!(
                        bootname,
                        state = ?entry.classify(true, true),
                        "uboot primary selected"
                    );
                    Ok(slot.clone())
                }
                // The first entry with attempts left doesn't map to any
                // configured slot: intentional strictness to detect
                // configuration drift.
                None => Err(Error::parse(format!(
                    "BOOT_ORDER entry '{bootname}' has no configured slot"
                ))),
            };
        }

        Err(Error::NoPrimary)
    }

    fn set_state(&self, slot: &Slot, good: bool) -> Result<(), Error> {
        let bootname = slot.bootname()?;
        if good {
            // Do not reinsert into BOOT_ORDER if it was removed.
            self.set_left(bootname, self.max_attempts)
        } else {
            let env = UbootEnv::read(self.runner)?;
            let new_order: Vec<String> =
                env.order.iter().filter(|b| b.as_str() != bootname).cloned().collect();
            if new_order.len() != env.order.len() {
                self.set_order(&new_order)?;
            }
            self.set_left(bootname, 0)
        }
    }

    fn set_primary(&self, slot: &Slot) -> Result<(), Error> {
        let bootname = slot.bootname()?;
        let env = UbootEnv::read(self.runner)?;

        let mut new_order = vec![bootname.to_string()];
        new_order.extend(env.order.iter().filter(|b| b.as_str() != bootname).cloned());

        // Write BOOT_ORDER before per-entry _LEFT so a crash mid-update
        // never leaves a promoted slot with a stale attempts counter.
        self.set_order(&new_order)?;
        self.set_left(bootname, self.max_attempts)
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
        SlotRegistry::new(vec![slot("rootfs.0", "A"), slot("rootfs.1", "B")])
    }

    // set_primary(rootfs.1) with an exhausted peer keeps the peer's
    // _LEFT untouched but reorders BOOT_ORDER.
    #[test]
    fn set_primary_reorders_without_touching_peer_left() {
        let runner = FakeRunner::new();
        runner.push_ok("BOOT_ORDER=A B\nBOOT_A_LEFT=0\nBOOT_B_LEFT=0\n");
        runner.push_ok(""); // set BOOT_ORDER
        runner.push_ok(""); // set BOOT_B_LEFT

        let reg = registry();
        let backend = UbootBackend::new(&reg, &runner, 3);
        backend
            .set_primary(reg.by_name("rootfs.1").unwrap())
            .unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls[1].1, vec!["BOOT_ORDER", "B A"]);
        assert_eq!(calls[2].1, vec!["BOOT_B_LEFT", "3"]);
    }

    #[test]
    fn order_not_mapping_to_slot_is_parse_error() {
        let runner = FakeRunner::new();
        runner.push_ok("BOOT_ORDER=ghost A\nBOOT_ghost_LEFT=3\nBOOT_A_LEFT=3\n");
        let reg = registry();
        let backend = UbootBackend::new(&reg, &runner, 3);
        assert!(matches!(backend.get_primary(), Err(Error::ParseError { .. })));
    }

    #[test]
    fn set_state_false_removes_from_order_and_zeroes_left() {
        let runner = FakeRunner::new();
        runner.push_ok("BOOT_ORDER=A B\nBOOT_A_LEFT=3\nBOOT_B_LEFT=3\n");
        runner.push_ok(""); // set BOOT_ORDER
        runner.push_ok(""); // set BOOT_A_LEFT

        let reg = registry();
        let backend = UbootBackend::new(&reg, &runner, 3);
        backend
            .set_state(reg.by_name("rootfs.0").unwrap(), false)
            .unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls[1].1, vec!["BOOT_ORDER", "B"]);
        assert_eq!(calls[2].1, vec!["BOOT_A_LEFT", "0"]);
    }
}
