//! Test fixtures shared by integration tests.
//!
//! Installs mock `barebox-state`/`fw_printenv`/`fw_setenv`/`grub-editenv`
//! tools reachable via `$PATH` and drives them through env-var-pointed
//! state files. This lets integration tests exercise the real
//! [`crate::process::SystemRunner`] unmodified, with only `$PATH` and a
//! couple of env vars shadowed.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::TempDir;

const BAREBOX_STATE: &str = include_str!("../tests/fixtures/barebox-state");
const FW_PRINTENV: &str = include_str!("../tests/fixtures/fw_printenv");
const FW_SETENV: &str = include_str!("../tests/fixtures/fw_setenv");
const GRUB_EDITENV: &str = include_str!("../tests/fixtures/grub-editenv");

/// Serializes tests that mutate the process-global `$PATH`/state-path env
/// vars, since `cargo test` runs test functions concurrently within one
/// process. Each [`MockToolchain`] still gets its own tempdir; this guard
/// only prevents two tests from observing each other's `$PATH` mid-swap.
static PATH_GUARD: Mutex<()> = Mutex::new(());

/// A tempdir populated with mock bootloader tools, plus a guard that
/// restores `$PATH` (and any state-path env vars it set) on drop.
pub struct MockToolchain {
    _tools_dir: TempDir,
    state_dir: TempDir,
    original_path: String,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl MockToolchain {
    /// Installs all four mock tools on `$PATH` and returns state file
    /// paths tests can seed/inspect directly.
    pub fn new() -> Self {
        let lock = PATH_GUARD.lock().unwrap_or_else(|e| e.into_inner());

        let tools_dir = TempDir::new_in("/tmp").expect("create tools tempdir");
        let state_dir = TempDir::new_in("/tmp").expect("create state tempdir");

        write_executable(&tools_dir.path().join("barebox-state"), BAREBOX_STATE);
        write_executable(&tools_dir.path().join("fw_printenv"), FW_PRINTENV);
        write_executable(&tools_dir.path().join("fw_setenv"), FW_SETENV);
        write_executable(&tools_dir.path().join("grub-editenv"), GRUB_EDITENV);

        let original_path = std::env::var("PATH").unwrap_or_default();
        let new_path = format!("{}:{}", tools_dir.path().display(), original_path);
        std::env::set_var("PATH", &new_path);
        std::env::set_var(
            "BAREBOX_STATE_PATH",
            state_dir.path().join("barebox-state.env"),
        );
        std::env::set_var("UBOOT_STATE_PATH", state_dir.path().join("uboot.env"));

        Self {
            _tools_dir: tools_dir,
            state_dir,
            original_path,
            _lock: lock,
        }
    }

    pub fn barebox_state_path(&self) -> PathBuf {
        self.state_dir.path().join("barebox-state.env")
    }

    pub fn uboot_state_path(&self) -> PathBuf {
        self.state_dir.path().join("uboot.env")
    }

    pub fn grubenv_path(&self) -> PathBuf {
        self.state_dir.path().join("grubenv")
    }

    pub fn seed(&self, path: &std::path::Path, contents: &str) {
        fs::write(path, contents).expect("seed mock tool state");
    }

    pub fn read(&self, path: &std::path::Path) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }
}

impl Default for MockToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MockToolchain {
    fn drop(&mut self) {
        std::env::set_var("PATH", &self.original_path);
        std::env::remove_var("BAREBOX_STATE_PATH");
        std::env::remove_var("UBOOT_STATE_PATH");
    }
}

fn write_executable(path: &std::path::Path, contents: &str) {
    fs::write(path, contents).expect("write mock tool script");
    let mut perms = fs::metadata(path).expect("stat mock tool").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod mock tool");
}
