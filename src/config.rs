use std::path::PathBuf;

use serde::Deserialize;

use crate::Error;

/// Default maximum boot attempts before a slot is considered exhausted.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Barebox's default priority for the primary slot.
pub const BAREBOX_PRIMARY_PRIORITY: u32 = 20;
/// Barebox's default priority for a non-primary, enabled slot.
pub const BAREBOX_SECONDARY_PRIORITY: u32 = 10;
/// Priority value that marks a Barebox/GRUB slot disabled.
pub const DISABLED_PRIORITY: u32 = 0;

/// The bootloader backend to dispatch to, supplied by the configuration
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootLoaderName {
    Barebox,
    Uboot,
    Grub,
    Efi,
}

impl std::str::FromStr for BootLoaderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "barebox" => Ok(Self::Barebox),
            "uboot" => Ok(Self::Uboot),
            "grub" => Ok(Self::Grub),
            "efi" => Ok(Self::Efi),
            other => Err(Error::Unsupported(format!(
                "unknown bootloader '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for BootLoaderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Barebox => "barebox",
            Self::Uboot => "uboot",
            Self::Grub => "grub",
            Self::Efi => "efi",
        };
        f.write_str(s)
    }
}

/// System configuration handed to the dispatcher at construction.
/// Everything here is read-once, read-many: the core holds it as an
/// immutable value and never mutates it.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub bootloader: BootLoaderName,

    /// Path to the `grubenv` file. Required only when `bootloader ==
    /// Grub`; absence with any other bootloader is harmless.
    #[serde(default)]
    pub grubenv_path: Option<PathBuf>,

    /// Maximum boot attempts restored by `set_state(good=true)` and
    /// `set_primary`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl SystemConfig {
    /// Build a config from a raw bootloader name, as handed over by the
    /// configuration collaborator before it has been typed into a
    /// [`BootLoaderName`] (spec.md §6). An unrecognized name surfaces as
    /// `Error::Unsupported` naming the string verbatim, via
    /// [`BootLoaderName`]'s `FromStr` impl.
    pub fn new(
        bootloader: &str,
        grubenv_path: Option<PathBuf>,
        max_attempts: u32,
    ) -> Result<Self, Error> {
        Ok(Self {
            bootloader: bootloader.parse()?,
            grubenv_path,
            max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_accepts_known_names() {
        assert_eq!("barebox".parse::<BootLoaderName>().unwrap(), BootLoaderName::Barebox);
        assert_eq!("uboot".parse::<BootLoaderName>().unwrap(), BootLoaderName::Uboot);
        assert_eq!("grub".parse::<BootLoaderName>().unwrap(), BootLoaderName::Grub);
        assert_eq!("efi".parse::<BootLoaderName>().unwrap(), BootLoaderName::Efi);
    }

    #[test]
    fn from_str_names_the_unrecognized_string_verbatim() {
        let err = "vendorloader".parse::<BootLoaderName>().unwrap_err();
        match err {
            Error::Unsupported(msg) => assert!(msg.contains("vendorloader")),
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for name in [
            BootLoaderName::Barebox,
            BootLoaderName::Uboot,
            BootLoaderName::Grub,
            BootLoaderName::Efi,
        ] {
            assert_eq!(name.to_string().parse::<BootLoaderName>().unwrap(), name);
        }
    }

    #[test]
    fn new_surfaces_unsupported_for_bad_bootloader_name() {
        let err = SystemConfig::new("vendorloader", None, DEFAULT_MAX_ATTEMPTS).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn new_builds_config_for_known_bootloader_name() {
        let config = SystemConfig::new("uboot", None, DEFAULT_MAX_ATTEMPTS).unwrap();
        assert_eq!(config.bootloader, BootLoaderName::Uboot);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }
}
