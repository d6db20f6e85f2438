// vultrctl - CLI for the Vultr VPS API
// Copyright (C) 2026 The vultrctl Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::client::DEFAULT_ENDPOINT;
use anyhow::{Context, Result};
use dirs::config_dir;
use std::collections::BTreeMap;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const DEFAULT_PROFILE: &str = "vultr.config";
pub const API_KEY: &str = "api_key";
pub const ENDPOINT: &str = "endpoint";

/// Key/value credentials stored under one profile name.
pub type Profile = BTreeMap<String, String>;

type Profiles = BTreeMap<String, Profile>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error("profile `{profile}` is missing required keys: {}", keys.join(", "))]
    MissingKeys { profile: String, keys: Vec<String> },
}

#[derive(Debug, PartialEq, Eq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    /// Uses `$VULTRCTL_CONFIG_DIR/config.yaml`, falling back to the
    /// platform config directory.
    pub fn locate() -> Result<Self> {
        let dir = match env::var("VULTRCTL_CONFIG_DIR") {
            Ok(custom) => PathBuf::from(custom),
            Err(_) => config_dir()
                .ok_or(ConfigError::MissingConfigDir)?
                .join("vultrctl"),
        };
        Ok(Self::at(dir.join("config.yaml")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn get(&self, profile: &str, required: &[&str]) -> Result<Profile> {
        let found = self.read()?.remove(profile).unwrap_or_default();
        let missing: Vec<String> = required
            .iter()
            .filter(|key| found.get(**key).is_none_or(|v| v.trim().is_empty()))
            .map(|key| key.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys {
                profile: profile.to_string(),
                keys: missing,
            }
            .into());
        }
        Ok(found)
    }

    /// Merges `values` into the named profile and writes the file back.
    pub fn set(&self, profile: &str, values: Profile) -> Result<&Path> {
        let mut profiles = self.read()?;
        profiles.entry(profile.to_string()).or_default().extend(values);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }
        let serialized = serde_yaml::to_string(&profiles).context("serializing profiles")?;
        fs::write(&self.path, serialized).with_context(|| format!("writing {:?}", self.path))?;
        Ok(&self.path)
    }

    /// Effective settings: explicit overrides win over the stored profile.
    pub fn resolve(
        &self,
        profile: &str,
        api_key_override: Option<String>,
        endpoint_override: Option<String>,
    ) -> Result<Settings> {
        let mut stored = self.get(profile, &[])?;

        let api_key = api_key_override
            .or_else(|| stored.remove(API_KEY))
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let endpoint = endpoint_override
            .or_else(|| stored.remove(ENDPOINT))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Settings { api_key, endpoint })
    }

    fn read(&self) -> Result<Profiles> {
        if !self.path.exists() {
            return Ok(Profiles::new());
        }

        let contents =
            fs::read_to_string(&self.path).with_context(|| format!("reading {:?}", self.path))?;
        if contents.trim().is_empty() {
            return Ok(Profiles::new());
        }
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {:?}", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use tempfile::tempdir;

    static ENV_LOCK: OnceLock<std::sync::Mutex<()>> = OnceLock::new();

    fn profile(pairs: &[(&str, &str)]) -> Profile {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn set_then_get_round_trips_and_merges() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join("nested").join("config.yaml"));

        store
            .set(DEFAULT_PROFILE, profile(&[(API_KEY, "first")]))
            .unwrap();
        store
            .set(DEFAULT_PROFILE, profile(&[(ENDPOINT, "https://api.example.test/")]))
            .unwrap();
        store.set("other", profile(&[(API_KEY, "second")])).unwrap();

        let loaded = store.get(DEFAULT_PROFILE, &[API_KEY]).unwrap();
        assert_eq!(loaded.get(API_KEY).map(String::as_str), Some("first"));
        assert_eq!(
            loaded.get(ENDPOINT).map(String::as_str),
            Some("https://api.example.test/")
        );
        assert_eq!(store.get("other", &[]).unwrap().len(), 1);
    }

    #[test]
    fn reports_missing_required_keys() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join("config.yaml"));
        store.set(DEFAULT_PROFILE, profile(&[(API_KEY, "  ")])).unwrap();

        let err = store.get(DEFAULT_PROFILE, &[API_KEY, ENDPOINT]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "profile `vultr.config` is missing required keys: api_key, endpoint"
        );
        assert!(store.get(DEFAULT_PROFILE, &[]).is_ok());
    }

    #[test]
    fn absent_file_yields_empty_profile() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join("config.yaml"));
        assert!(store.get(DEFAULT_PROFILE, &[]).unwrap().is_empty());
    }

    #[test]
    fn resolve_prefers_overrides_and_defaults_endpoint() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join("config.yaml"));

        let empty = store.resolve(DEFAULT_PROFILE, None, None).unwrap();
        assert_eq!(
            empty,
            Settings {
                api_key: None,
                endpoint: DEFAULT_ENDPOINT.to_string(),
            }
        );

        store
            .set(
                DEFAULT_PROFILE,
                profile(&[(API_KEY, "stored\n"), (ENDPOINT, "https://stored.test/")]),
            )
            .unwrap();
        let stored = store.resolve(DEFAULT_PROFILE, None, None).unwrap();
        assert_eq!(stored.api_key.as_deref(), Some("stored"));
        assert_eq!(stored.endpoint, "https://stored.test/");

        let overridden = store
            .resolve(
                DEFAULT_PROFILE,
                Some("flag".into()),
                Some("https://flag.test/".into()),
            )
            .unwrap();
        assert_eq!(overridden.api_key.as_deref(), Some("flag"));
        assert_eq!(overridden.endpoint, "https://flag.test/");
    }

    #[test]
    fn locate_honours_config_dir_override() {
        let _guard = ENV_LOCK
            .get_or_init(|| std::sync::Mutex::new(()))
            .lock()
            .unwrap();
        let dir = tempdir().unwrap();
        unsafe {
            env::set_var("VULTRCTL_CONFIG_DIR", dir.path());
        }

        let store = ProfileStore::locate().unwrap();
        let written = store.set(DEFAULT_PROFILE, Profile::new()).unwrap();
        assert_eq!(written, dir.path().join("config.yaml"));

        unsafe {
            env::remove_var("VULTRCTL_CONFIG_DIR");
        }
    }
}
