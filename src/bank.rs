//! Bank loading: the master banks read from disk and banks registered from memory.

use crate::error::{Result, SonoraError};
use crate::system::{
    BankHandle, FileByteSource, LoadingState, StudioSystem, SystemError,
};
use std::fs;
use std::path::{Path, PathBuf};

const STRINGS_BANK_SUFFIX: &str = ".strings.bank";
const BANK_EXTENSION: &str = "bank";

/// Finds the master bank pair in `folder`.
///
/// The master bank is the one that comes with a `<name>.strings.bank`. Returns the paths
/// of `<name>.bank` and `<name>.strings.bank`, or `None` when no strings bank exists.
pub fn find_master_banks(folder: &Path) -> std::io::Result<Option<(PathBuf, PathBuf)>> {
    let mut names: Vec<String> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == BANK_EXTENSION))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    Ok(names.iter().find_map(|name| {
        let stem = name.strip_suffix(STRINGS_BANK_SUFFIX)?;
        Some((
            folder.join(format!("{}.{}", stem, BANK_EXTENSION)),
            folder.join(name),
        ))
    }))
}

/// The master bank and its strings bank, both streamed through [`FileByteSource`].
#[derive(Debug, Default)]
pub struct MasterBanks {
    master: Option<BankHandle>,
    strings: Option<BankHandle>,
}

impl MasterBanks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.master.is_some()
    }

    /// Loads the master banks from `folder` and locks the channel group of every bus in
    /// the master bank.
    ///
    /// A folder without master banks is reported but not treated as a failure.
    pub fn load(&mut self, folder: &Path, system: &dyn StudioSystem) -> Result<()> {
        let found = match find_master_banks(folder) {
            Ok(found) => found,
            Err(e) => {
                log::error!("Cannot scan bank folder {}: {}", folder.display(), e);
                None
            }
        };
        let Some((master_path, strings_path)) = found else {
            log::error!("Failed to load master banks from {}", folder.display());
            return Ok(());
        };

        let master = load_bank_file(&master_path, system)?;
        self.master = Some(master);
        self.strings = Some(load_bank_file(&strings_path, system)?);

        let buses = system.bank_buses(master)?;
        for bus in &buses {
            if let Err(e) = system.lock_channel_group(*bus) {
                log::warn!("Failed to lock channel group of {:?}: {}", bus, e);
            }
        }
        log::info!(
            "Loaded master bank {} with {} buses",
            master_path.display(),
            buses.len()
        );
        Ok(())
    }

    /// Starts unloading both banks. Does not wait for completion.
    pub fn unload(&mut self, system: &dyn StudioSystem) {
        for bank in [self.strings.take(), self.master.take()].into_iter().flatten() {
            if let Err(e) = system.unload_bank(bank) {
                log::warn!("Failed to unload master bank {:?}: {}", bank, e);
            }
        }
    }
}

fn load_bank_file(path: &Path, system: &dyn StudioSystem) -> Result<BankHandle> {
    let source = FileByteSource::open_file(path).map_err(|e| {
        SonoraError::AssetUnavailable(format!("{}: {}", path.display(), e))
    })?;
    if source.size() == 0 {
        return Err(SonoraError::AssetUnavailable(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(system.load_bank_custom(Box::new(source))?)
}

/// Banks loaded from memory point into the host's buffer and need it aligned.
pub fn check_alignment(data: &[u8], alignment: usize) -> Result<()> {
    let address = data.as_ptr() as usize;
    if alignment > 1 && address % alignment != 0 {
        return Err(SonoraError::Misaligned { address, alignment });
    }
    Ok(())
}

/// Unloads `bank` and polls until the engine no longer reports it as unloading.
///
/// This is a deliberate busy poll: unloading is asynchronous and a memory bank's buffer
/// must outlive it. Each round ticks the engine once. An invalid handle counts as
/// unloaded, other query errors are retried.
pub fn unload_and_wait(
    system: &dyn StudioSystem,
    bank: BankHandle,
    max_polls: usize,
) -> Result<()> {
    system.unload_bank(bank)?;

    for _ in 0..max_polls {
        if let Err(e) = system.update() {
            log::warn!("Engine update failed while unloading {:?}: {}", bank, e);
        }
        match system.bank_loading_state(bank) {
            Ok(LoadingState::Unloading) => continue,
            Ok(LoadingState::Error) => {
                return Err(SystemError::Engine(format!("bank {:?} failed to unload", bank)).into());
            }
            Ok(_) | Err(SystemError::InvalidHandle) => return Ok(()),
            Err(e) => log::debug!("Retrying loading state of {:?}: {}", bank, e),
        }
    }

    Err(SystemError::Engine(format!(
        "bank {:?} still unloading after {} polls",
        bank, max_polls
    ))
    .into())
}
