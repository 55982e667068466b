//! Configuration for Sonora

use std::path::PathBuf;

/// Configuration descriptor for a [`SonoraImpl`](crate::SonoraImpl).
#[derive(Debug, Clone)]
pub struct SonoraImplDesc {
    /// Project asset directory. Must exist, the adapter cannot start without it.
    pub asset_directory: PathBuf,
    /// Folder below the asset directory (or the localized folder) holding bank files
    pub data_root: String,
    /// Root folder standalone files are resolved against
    pub game_folder: PathBuf,
    /// Folder below the game folder holding per-language content
    pub localization_folder: String,
    /// Active language, selects the localized bank and standalone file folders
    pub language: String,
    /// Maximum number of voices the engine may mix
    pub max_channels: u32,
    pub doppler_scale: f32,
    pub distance_factor: f32,
    pub rolloff_scale: f32,
    /// Allow a live-update tool connection to the engine
    pub enable_live_update: bool,
    /// Run the engine update on the calling thread instead of its own
    pub enable_synchronous_update: bool,
    /// Required alignment in bytes of in-memory bank buffers
    pub bank_alignment: usize,
    /// Upper bound on update/poll rounds while waiting for a bank to unload
    pub max_unload_polls: usize,
    /// Extension appended to standalone file names
    pub standalone_file_extension: String,
}

impl Default for SonoraImplDesc {
    fn default() -> Self {
        Self {
            asset_directory: PathBuf::new(),
            data_root: "sonora".to_string(),
            game_folder: PathBuf::new(),
            localization_folder: "localization".to_string(),
            language: "english".to_string(),
            max_channels: 512,
            doppler_scale: 1.0,
            distance_factor: 1.0,
            rolloff_scale: 1.0,
            enable_live_update: false,
            enable_synchronous_update: false,
            bank_alignment: 32,
            max_unload_polls: 10_000,
            standalone_file_extension: "mp3".to_string(),
        }
    }
}

impl SonoraImplDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.asset_directory = directory.into();
        self
    }

    pub fn data_root(mut self, root: impl Into<String>) -> Self {
        self.data_root = root.into();
        self
    }

    pub fn game_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.game_folder = folder.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn max_channels(mut self, max: u32) -> Self {
        self.max_channels = max;
        self
    }

    pub fn enable_live_update(mut self, enable: bool) -> Self {
        self.enable_live_update = enable;
        self
    }

    pub fn enable_synchronous_update(mut self, enable: bool) -> Self {
        self.enable_synchronous_update = enable;
        self
    }

    pub fn max_unload_polls(mut self, polls: usize) -> Self {
        self.max_unload_polls = polls;
        self
    }

    /// Folder holding the non-localized banks: `<asset_directory>/<data_root>`.
    pub fn regular_bank_folder(&self) -> PathBuf {
        self.asset_directory.join(&self.data_root)
    }

    /// Folder holding the banks for the active language.
    pub fn localized_bank_folder(&self) -> PathBuf {
        self.localized_folder().join(&self.data_root)
    }

    /// `<game_folder>/<localization_folder>/<language>`
    pub fn localized_folder(&self) -> PathBuf {
        self.game_folder
            .join(&self.localization_folder)
            .join(&self.language)
    }

    /// Resolves a standalone file name to the path handed to the engine.
    pub fn standalone_file_path(&self, file_name: &str, localized: bool) -> PathBuf {
        let file = format!("{}.{}", file_name, self.standalone_file_extension);
        if localized {
            self.localized_folder().join(file)
        } else {
            self.game_folder.join(file)
        }
    }
}
