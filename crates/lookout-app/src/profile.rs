use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use lookout_config::Config;
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG: &str = "config.json";
pub const PROFILES_DIR: &str = "profiles";

/// A named config stored under `profiles/<name>.json`
#[derive(Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub value: Config,
}

/// Pick the config source: an explicit file, then a named profile, then
/// `./config.json`, then built-in defaults. Environment overrides apply to all.
pub fn resolve_config(path: Option<&Path>, profile: Option<&str>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        tracing::info!(path = %path.display(), "loading config");
        return Config::load(path).with_context(|| format!("Failed to load {}", path.display()));
    }

    if let Some(name) = profile {
        return load_profile(Path::new(PROFILES_DIR), name);
    }

    let default = Path::new(DEFAULT_CONFIG);
    if default.exists() {
        tracing::info!(path = DEFAULT_CONFIG, "loading config");
        return Config::load(default).context("Failed to load config.json");
    }

    tracing::info!("no config file found, using defaults");
    Ok(Config::new())
}

fn profile_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

/// Load a profile by name
pub fn load_profile(dir: &Path, name: &str) -> anyhow::Result<Config> {
    let file = profile_path(dir, name);
    let data = fs::read_to_string(&file)
        .with_context(|| format!("Profile '{name}' not found at {}", file.display()))?;
    let profile: Profile =
        serde_json::from_str(&data).with_context(|| format!("Profile '{name}' is not valid JSON"))?;

    tracing::info!(profile = %profile.name, "loaded profile");
    let mut config = profile.value;
    config.apply_env();
    Ok(config)
}

/// Write `config` as a named profile, creating the directory if needed
pub fn save_profile(dir: &Path, name: &str, config: &Config) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let profile = Profile {
        name: name.into(),
        value: config.clone(),
    };
    let file = profile_path(dir, name);
    fs::write(&file, serde_json::to_string_pretty(&profile)?)?;
    tracing::info!("Created profile: {name}");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lookout-{test}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_profile_round_trip_keeps_settings() {
        let dir = scratch_dir("profile");
        let mut config = Config::default();
        config.session.context_label = "Biology midterm".into();
        config.session.max_questions = Some(12);

        let path = save_profile(&dir, "biology", &config).unwrap();
        assert!(path.ends_with("biology.json"));

        let loaded = load_profile(&dir, "biology").unwrap();
        assert_eq!(loaded.session.context_label, "Biology midterm");
        assert_eq!(loaded.session.max_questions, Some(12));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_profile_is_an_error() {
        let dir = scratch_dir("missing");
        let err = load_profile(&dir, "nope").unwrap_err();
        assert!(format!("{err:#}").contains("Profile 'nope' not found"));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = scratch_dir("explicit");
        assert!(resolve_config(Some(&dir.join("absent.json")), None).is_err());
    }
}
