// src/config.rs

//! Configuration loading utilities.
//!
//! Engine configuration lives in one `config.toml` (see [`Config`]); each
//! site has its own profile TOML in the sites directory, served by
//! [`ProfileStore`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::error::{AppError, Result};
use crate::models::{Config, IntelSiteProfile, PathsConfig};

static GLOBAL: OnceLock<ProfileStore> = OnceLock::new();

/// Load configuration from a TOML file.
///
/// Falls back to defaults if loading fails, but rejects a loaded file that
/// does not validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path);
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid config {}: {}", path.display(), e)))?;
    Ok(config)
}

/// Site profiles, loaded from disk once on first use.
pub struct ProfileStore {
    dir: Option<PathBuf>,
    profiles: RwLock<Option<BTreeMap<String, IntelSiteProfile>>>,
}

impl ProfileStore {
    /// Store reading `*.toml` profiles from `dir`. Nothing is read until the
    /// first lookup.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            profiles: RwLock::new(None),
        }
    }

    /// Store over a fixed set of profiles.
    pub fn from_profiles(profiles: impl IntoIterator<Item = IntelSiteProfile>) -> Self {
        let map = profiles
            .into_iter()
            .map(|p| (p.site.clone(), p))
            .collect::<BTreeMap<_, _>>();
        Self {
            dir: None,
            profiles: RwLock::new(Some(map)),
        }
    }

    /// Set the directory of the process-wide store. Returns `false` if the
    /// global store already exists.
    pub fn init_global(dir: impl Into<PathBuf>) -> bool {
        GLOBAL.set(Self::new(dir)).is_ok()
    }

    /// Process-wide store; uses the default sites directory unless
    /// [`ProfileStore::init_global`] ran first.
    pub fn global() -> &'static ProfileStore {
        GLOBAL.get_or_init(|| Self::new(PathsConfig::default().sites_dir))
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn get(&self, site: &str) -> Option<IntelSiteProfile> {
        self.with_profiles(|profiles| profiles.get(site).cloned())
    }

    /// Every profile, ordered by site key.
    pub fn all(&self) -> Vec<IntelSiteProfile> {
        self.with_profiles(|profiles| profiles.values().cloned().collect())
    }

    /// Re-read the directory. Returns the number of profiles now loaded.
    pub fn reload(&self) -> Result<usize> {
        let Some(dir) = &self.dir else {
            return Ok(self.with_profiles(|profiles| profiles.len()));
        };
        let loaded = load_profiles(dir)?;
        let count = loaded.len();
        *self.profiles.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded);
        log::info!("Reloaded {} site profiles from {}", count, dir.display());
        Ok(count)
    }

    fn with_profiles<T>(&self, f: impl FnOnce(&BTreeMap<String, IntelSiteProfile>) -> T) -> T {
        {
            let guard = self.profiles.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(profiles) = guard.as_ref() {
                return f(profiles);
            }
        }

        let mut guard = self.profiles.write().unwrap_or_else(PoisonError::into_inner);
        let profiles = guard.get_or_insert_with(|| match &self.dir {
            Some(dir) => load_profiles(dir).unwrap_or_else(|e| {
                log::warn!("Failed to load site profiles from {}: {}", dir.display(), e);
                BTreeMap::new()
            }),
            None => BTreeMap::new(),
        });
        f(profiles)
    }
}

/// Parse every `*.toml` in `dir`. Invalid files are logged and skipped; a
/// missing directory yields no profiles.
fn load_profiles(dir: &Path) -> Result<BTreeMap<String, IntelSiteProfile>> {
    let mut profiles = BTreeMap::new();
    if !dir.is_dir() {
        log::warn!("Site profile directory {} not found", dir.display());
        return Ok(profiles);
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    for path in paths {
        let profile = match fs::read_to_string(&path)
            .map_err(AppError::from)
            .and_then(|content| IntelSiteProfile::from_toml(&content))
        {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("Skipping site profile {}: {}", path.display(), e);
                continue;
            }
        };
        if profiles.contains_key(&profile.site) {
            log::warn!(
                "Duplicate site '{}' in {}, keeping the first",
                profile.site,
                path.display()
            );
            continue;
        }
        log::debug!("Loaded site profile '{}' from {}", profile.site, path.display());
        profiles.insert(profile.site.clone(), profile);
    }
    Ok(profiles)
}
