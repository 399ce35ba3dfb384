//! Barebox backend: `barebox-state --get-dump` / `--set`.
//!
//! Priority and remaining-attempts are independent counters per bootname;
//! `get_primary` picks the highest-priority entry that is also
//! non-exhausted.

use std::collections::HashMap;

use crate::config::{
    BAREBOX_PRIMARY_PRIORITY, BAREBOX_SECONDARY_PRIORITY, DISABLED_PRIORITY,
};
use crate::envparser::parse_env_blob;
use crate::process::{run_checked, ProcessRunner};
use crate::registry::SlotRegistry;
use crate::slot::Slot;
use crate::Error;

use super::{Backend, BootEntry};

const TOOL: &str = "barebox-state";

/// One [`BootEntry`] per bootname, read via a single `--get-dump`.
struct BareboxState {
    entries: HashMap<String, BootEntry>,
}

impl BareboxState {
    fn read(runner: &dyn ProcessRunner) -> Result<Self, Error> {
        let dump = run_checked(runner, TOOL, &["--get-dump"])?;
        let pairs = parse_env_blob(&dump)?;

        let mut entries: HashMap<String, BootEntry> = HashMap::new();
        for (key, value) in &pairs {
            let Some(rest) = key.strip_prefix("bootstate.") else {
                continue;
            };
            let Some((bootname, field)) = rest.rsplit_once('.') else {
                continue;
            };
            let n: u32 = value
                .parse()
                .map_err(|_| Error::parse(format!("{key}={value}")))?;
            let entry = entries.entry(bootname.to_string()).or_default();
            match field {
                "priority" => entry.priority = n,
                "remaining_attempts" => entry.attempts = n,
                _ => {}
            }
        }

        Ok(Self { entries })
    }

    fn get(&self, bootname: &str) -> BootEntry {
        self.entries.get(bootname).copied().unwrap_or_default()
    }
}

pub struct BareboxBackend<'a> {
    registry: &'a SlotRegistry,
    runner: &'a dyn ProcessRunner,
    max_attempts: u32,
}

impl<'a> BareboxBackend<'a> {
    pub fn new(registry: &'a SlotRegistry, runner: &'a dyn ProcessRunner, max_attempts: u32) -> Self {
        Self {
            registry,
            runner,
            max_attempts,
        }
    }

    fn write(&self, sets: &[(String, String)]) -> Result<(), Error> {
        if sets.is_empty() {
            return Ok(());
        }
        let mut args: Vec<&str> = Vec::with_capacity(sets.len() * 2);
        let rendered: Vec<String> = sets
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        for kv in &rendered {
            args.push("--set");
            args.push(kv);
        }
        run_checked(self.runner, TOOL, &args)?;
        Ok(())
    }
}

impl Backend for BareboxBackend<'_> {
    fn get_state(&self, slot: &Slot) -> Result<bool, Error> {
        let bootname = slot.bootname()?;
        let state = BareboxState::read(self.runner)?;
        let entry = state.get(bootname);
        let good = entry.good_by_priority();
        tracing::trace!(bootname, state = ?entry.classify(good, false), "barebox entry");
        Ok(good)
    }

    fn get_primary(&self) -> Result<Slot, Error> {
        let state = BareboxState::read(self.runner)?;

        let mut best: Option<(&Slot, BootEntry)> = None;
        for slot in self.registry.rootfs_slots() {
            let Some(bootname) = slot.bootname.as_deref() else {
                continue;
            };
            let entry = state.get(bootname);
            if !entry.good_by_priority() {
                continue;
            }
            match &best {
                Some((_, best_entry)) if best_entry.priority >= entry.priority => {}
                _ => best = Some((slot, entry)),
            }
        }

        let (slot, entry) = best.ok_or(Error::NoPrimary)?;
        tracing::trace!(
            bootname = slot.bootname.as_deref(),
            state = ?entry.classify(true, true),
            "barebox primary selected"
        );
        Ok(slot.clone())
    }

    fn set_state(&self, slot: &Slot, good: bool) -> Result<(), Error> {
        let bootname = slot.bootname()?;
        if good {
            self.write(&[(
                format!("bootstate.{bootname}.remaining_attempts"),
                self.max_attempts.to_string(),
            )])
        } else {
            self.write(&[
                (
                    format!("bootstate.{bootname}.priority"),
                    DISABLED_PRIORITY.to_string(),
                ),
                (
                    format!("bootstate.{bootname}.remaining_attempts"),
                    0.to_string(),
                ),
            ])
        }
    }

    fn set_primary(&self, slot: &Slot) -> Result<(), Error> {
        let bootname = slot.bootname()?;
        let state = BareboxState::read(self.runner)?;

        let mut sets = vec![
            (
                format!("bootstate.{bootname}.priority"),
                BAREBOX_PRIMARY_PRIORITY.to_string(),
            ),
            (
                format!("bootstate.{bootname}.remaining_attempts"),
                self.max_attempts.to_string(),
            ),
        ];

        // Demote every other currently-enabled rootfs slot to secondary
        // priority. Disabled slots (priority 0) stay disabled — promotion
        // never re-enables other slots.
        for other in self.registry.rootfs_slots() {
            let Some(other_bootname) = other.bootname.as_deref() else {
                continue;
            };
            if other_bootname == bootname {
                continue;
            }
            let entry = state.get(other_bootname);
            if entry.priority > 0 {
                sets.push((
                    format!("bootstate.{other_bootname}.priority"),
                    BAREBOX_SECONDARY_PRIORITY.to_string(),
                ));
            }
        }

        self.write(&sets)
    }
}
