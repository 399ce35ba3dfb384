//! GRUB backend: `grub-editenv <grubenv-file> list|set|unset`.
//!
//! Variables: `ORDER` (whitespace-separated preference list, mirroring
//! U-Boot's `BOOT_ORDER`), `<bootname>_OK` (0/1) and `<bootname>_TRY`
//! (attempts). `_OK` is the boolean enable flag — the GRUB analog of
//! Barebox's priority>0 — and a missing `_OK`/`_TRY` key, as happens on a
//! freshly flashed environment, reads as `0` rather than a `ParseError`.

use crate::envparser::{self, parse_env_blob};
use crate::process::{run_checked, ProcessRunner};
use crate::registry::SlotRegistry;
use crate::slot::Slot;
use crate::Error;

use super::Backend;

const TOOL: &str = "grub-editenv";

struct GrubEnv {
    order: Vec<String>,
    pairs: Vec<(String, String)>,
}

impl GrubEnv {
    fn read(runner: &dyn ProcessRunner, path: &str) -> Result<Self, Error> {
        let listing = run_checked(runner, TOOL, &[path, "list"])?;
        let pairs = parse_env_blob(&listing)?;
        let order = envparser::lookup(&pairs, "ORDER")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Ok(Self { order, pairs })
    }

    fn ok(&self, bootname: &str) -> bool {
        envparser::lookup(&self.pairs, &format!("{bootname}_OK"))
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0)
            == 1
    }
}

pub struct GrubBackend<'a> {
    registry: &'a SlotRegistry,
    runner: &'a dyn ProcessRunner,
    grubenv_path: &'a str,
}

impl<'a> GrubBackend<'a> {
    pub fn new(registry: &'a SlotRegistry, runner: &'a dyn ProcessRunner, grubenv_path: &'a str) -> Self {
        Self {
            registry,
            runner,
            grubenv_path,
        }
    }

    fn set(&self, assignments: &[(String, String)]) -> Result<(), Error> {
        if assignments.is_empty() {
            return Ok(());
        }
        let rendered: Vec<String> = assignments
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let mut args: Vec<&str> = vec![self.grubenv_path, "set"];
        args.extend(rendered.iter().map(String::as_str));
        run_checked(self.runner, TOOL, &args)?;
        Ok(())
    }
}

impl Backend for GrubBackend<'_> {
    fn get_state(&self, slot: &Slot) -> Result<bool, Error> {
        let bootname = slot.bootname()?;
        let env = GrubEnv::read(self.runner, self.grubenv_path)?;
        Ok(env.ok(bootname))
    }

    fn get_primary(&self) -> Result<Slot, Error> {
        let env = GrubEnv::read(self.runner, self.grubenv_path)?;
        for bootname in &env.order {
            if !env.ok(bootname) {
                continue;
            }
            if let Some(slot) = self.registry.by_bootname(bootname) {
                return Ok(slot.clone());
            }
        }
        Err(Error::NoPrimary)
    }

    fn set_state(&self, slot: &Slot, good: bool) -> Result<(), Error> {
        let bootname = slot.bootname()?;
        if good {
            self.set(&[
                (format!("{bootname}_OK"), "1".to_string()),
                (format!("{bootname}_TRY"), "0".to_string()),
            ])
        } else {
            self.set(&[(format!("{bootname}_OK"), "0".to_string())])
        }
    }

    fn set_primary(&self, slot: &Slot) -> Result<(), Error> {
        let bootname = slot.bootname()?;
        let env = GrubEnv::read(self.runner, self.grubenv_path)?;

        let mut new_order = vec![bootname.to_string()];
        new_order.extend(env.order.iter().filter(|b| b.as_str() != bootname).cloned());

        self.set(&[
            ("ORDER".to_string(), new_order.join(" ")),
            (format!("{bootname}_OK"), "1".to_string()),
            (format!("{bootname}_TRY"), "0".to_string()),
        ])
    }
}
