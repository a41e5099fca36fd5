//! Runtime configuration of the viewer itself, as opposed to the scene's settings file.

pub const SETTINGS_ENV: &str = "BOOP_SETTINGS";
pub const ASSET_ROOT_ENV: &str = "BOOP_ASSET_ROOT";
pub const TITLE_ENV: &str = "BOOP_TITLE";

pub const DEFAULT_SETTINGS_PATH: &str = "settings.txt";
pub const DEFAULT_ASSET_ROOT: &str = "assets";
pub const DEFAULT_TITLE: &str = "boop";
pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 720);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Settings file, relative to `asset_root`.
    pub settings_path: String,
    /// Directory (native) or URL prefix relative to the page (web) every asset is fetched from.
    pub asset_root: String,
    pub title: String,
    /// Initial logical window size. Ignored on the web, where the canvas decides.
    pub window_size: (u32, u32),
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            settings_path: DEFAULT_SETTINGS_PATH.to_string(),
            asset_root: DEFAULT_ASSET_ROOT.to_string(),
            title: DEFAULT_TITLE.to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `BOOP_SETTINGS`, `BOOP_ASSET_ROOT` and `BOOP_TITLE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source. Empty values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            settings_path: var(SETTINGS_ENV).unwrap_or(defaults.settings_path),
            asset_root: var(ASSET_ROOT_ENV).unwrap_or(defaults.asset_root),
            title: var(TITLE_ENV).unwrap_or(defaults.title),
            window_size: defaults.window_size,
        }
    }
}
