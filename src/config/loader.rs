// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Locating and reading the config file layers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::{StageOverride, WorkspaceConfig};

/// Workspace config names, first match wins.
pub const WORKSPACE_CONFIG_FILES: &[&str] = &[
    ".repo-expert.json",
    ".repo-expert.yaml",
    ".repo-expert/config.json",
    "repo-expert.config.json",
];

/// Personal overrides, kept out of version control.
pub const LOCAL_CONFIG_FILE: &str = ".repo-expert.local.json";

/// `~/.repo-expert/config.json`, if a home directory is known.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".repo-expert").join("config.json"))
}

/// The workspace config file under `root` that would be loaded.
pub fn workspace_config_path(root: &Path) -> Option<PathBuf> {
    WORKSPACE_CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// The file layers found for a workspace, lowest precedence first.
#[derive(Debug, Default)]
pub struct ConfigLayers {
    pub global: Option<WorkspaceConfig>,
    pub workspace: Option<WorkspaceConfig>,
    pub local: Option<WorkspaceConfig>,
}

impl ConfigLayers {
    /// Read every layer present for `root`. A missing file is skipped; a file
    /// that exists but does not parse is an error.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            global: read_layer(global_config_path())?,
            workspace: read_layer(workspace_config_path(root))?,
            local: read_layer(Some(root.join(LOCAL_CONFIG_FILE)))?,
        })
    }
}

fn read_layer(path: Option<PathBuf>) -> Result<Option<WorkspaceConfig>, ConfigError> {
    match path {
        Some(path) if path.is_file() => read_config_file(&path).map(Some),
        _ => Ok(None),
    }
}

/// Parse one config file. `.yaml`/`.yml` are YAML, anything else JSON.
pub fn read_config_file(path: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::from(err).in_file(path))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml")
    );

    let parsed = if is_yaml {
        serde_yaml::from_str(&content).map_err(ConfigError::from)
    } else {
        serde_json::from_str(&content).map_err(ConfigError::from)
    };
    parsed.map_err(|err| err.in_file(path))
}

/// Nearest ancestor of `start` (inclusive) holding a workspace or local config.
///
/// The global file also matches `.repo-expert/config.json`, so it never marks
/// the home directory as a workspace.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    find_root_excluding(start, global_config_path().as_deref())
}

fn find_root_excluding(start: &Path, global: Option<&Path>) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| {
            let workspace = workspace_config_path(dir).filter(|path| Some(path.as_path()) != global);
            workspace.is_some() || dir.join(LOCAL_CONFIG_FILE).is_file()
        })
        .map(Path::to_path_buf)
}

/// Write [`example_config`] to `root/.repo-expert.json`.
///
/// Refuses to replace any workspace config already present.
pub fn init_config(root: &Path) -> Result<PathBuf, ConfigError> {
    if let Some(existing) = workspace_config_path(root) {
        return Err(ConfigError::AlreadyExists(existing.display().to_string()));
    }
    let path = root.join(WORKSPACE_CONFIG_FILES[0]);
    let mut content = serde_json::to_string_pretty(&example_config())?;
    content.push('\n');
    fs::write(&path, content)?;
    Ok(path)
}

/// Starter config written by `repo-expert init`.
pub fn example_config() -> WorkspaceConfig {
    WorkspaceConfig {
        agent_command: Some("claude".to_string()),
        max_iterations: Some(3),
        max_turns: Some(5),
        timeout_seconds: Some(300),
        validator: Some(StageOverride {
            max_turns: Some(3),
            timeout_seconds: None,
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_global_config_path_under_home() {
        if let Some(path) = global_config_path() {
            assert!(path.ends_with(".repo-expert/config.json"));
        }
    }

    #[test]
    fn test_no_layers_in_empty_dir() {
        let temp = TempDir::new().unwrap();
        let layers = ConfigLayers::load(temp.path()).unwrap();
        assert!(layers.workspace.is_none());
        assert!(layers.local.is_none());
    }

    #[test]
    fn test_workspace_json_layer() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(".repo-expert.json"),
            r#"{"agentCommand": "claude-beta", "maxIterations": 5}"#,
        )
        .unwrap();

        let config = ConfigLayers::load(temp.path()).unwrap().workspace.unwrap();
        assert_eq!(config.agent_command.as_deref(), Some("claude-beta"));
        assert_eq!(config.max_iterations, Some(5));
    }

    #[test]
    fn test_workspace_yaml_layer() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(".repo-expert.yaml"),
            "agentCommand: claude\ntimeoutSeconds: 90\n",
        )
        .unwrap();

        let config = ConfigLayers::load(temp.path()).unwrap().workspace.unwrap();
        assert_eq!(config.timeout_seconds, Some(90));
    }

    #[test]
    fn test_first_workspace_file_wins() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".repo-expert")).unwrap();
        fs::write(temp.path().join(".repo-expert/config.json"), r#"{"port": 9100}"#).unwrap();
        fs::write(temp.path().join(".repo-expert.yaml"), "port: 9200\n").unwrap();

        let path = workspace_config_path(temp.path()).unwrap();
        assert!(path.ends_with(".repo-expert.yaml"));
        let config = ConfigLayers::load(temp.path()).unwrap().workspace.unwrap();
        assert_eq!(config.port, Some(9200));
    }

    #[test]
    fn test_invalid_file_names_its_path() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".repo-expert.json"), "{ nope").unwrap();

        match ConfigLayers::load(temp.path()) {
            Err(ConfigError::JsonError(message)) => assert!(message.contains(".repo-expert.json")),
            other => panic!("expected JSON error, got {other:?}"),
        }
    }

    #[test]
    fn test_local_layer() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(LOCAL_CONFIG_FILE), r#"{"skipPermissions": false}"#).unwrap();

        let layers = ConfigLayers::load(temp.path()).unwrap();
        assert!(layers.workspace.is_none());
        assert_eq!(layers.local.unwrap().skip_permissions, Some(false));
    }

    #[test]
    fn test_find_workspace_root_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp.path().join("repo-expert.config.json"), "{}").unwrap();

        assert_eq!(find_workspace_root(&nested).as_deref(), Some(temp.path()));
    }

    #[test]
    fn test_find_workspace_root_accepts_local_only() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("src");
        fs::create_dir(&nested).unwrap();
        fs::write(temp.path().join(LOCAL_CONFIG_FILE), "{}").unwrap();

        assert_eq!(find_workspace_root(&nested).as_deref(), Some(temp.path()));
    }

    #[test]
    fn test_global_file_does_not_mark_workspace() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().join("home");
        let project = home.join("project");
        fs::create_dir_all(home.join(".repo-expert")).unwrap();
        fs::create_dir(&project).unwrap();
        let global = home.join(".repo-expert").join("config.json");
        fs::write(&global, "{}").unwrap();

        assert_eq!(find_root_excluding(&project, Some(&global)), None);
        assert_eq!(find_root_excluding(&project, None).as_deref(), Some(home.as_path()));
    }

    #[test]
    fn test_init_config_writes_example() {
        let temp = TempDir::new().unwrap();
        let path = init_config(temp.path()).unwrap();

        assert_eq!(path.file_name().unwrap(), ".repo-expert.json");
        assert_eq!(read_config_file(&path).unwrap(), example_config());
        assert_eq!(find_workspace_root(temp.path()).as_deref(), Some(temp.path()));
    }

    #[test]
    fn test_init_config_keeps_existing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".repo-expert.yaml"), "port: 9300\n").unwrap();

        let result = init_config(temp.path());
        assert!(matches!(result, Err(ConfigError::AlreadyExists(_))));
        assert!(!temp.path().join(".repo-expert.json").exists());
    }
}
