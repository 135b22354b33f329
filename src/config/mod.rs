// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for the repository expert.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.repo-expert/config.json
//! - Workspace config: .repo-expert.json, .repo-expert.yaml, .repo-expert/config.json, or repo-expert.config.json
//! - Local config: .repo-expert.local.json (gitignored, for personal overrides)
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > local > workspace > global > defaults).

mod loader;
mod merger;
mod types;

// Re-export public types
pub use loader::{
    example_config, find_workspace_root, global_config_path, init_config, read_config_file,
    workspace_config_path, ConfigLayers, LOCAL_CONFIG_FILE, WORKSPACE_CONFIG_FILES,
};

pub use merger::{default_config, merge_config, CliOptions};

pub use types::{ResolvedConfig, StageOverride, WorkspaceConfig, DEFAULT_HOST, DEFAULT_PORT};

use crate::error::ConfigError;
use std::path::Path;

/// Load, merge and validate all configuration sources for a workspace.
///
/// This is the main entry point for configuration loading.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let layers = ConfigLayers::load(workspace_root)?;
    let config = merge_config(layers.global, layers.workspace, layers.local, cli_options);
    config.validate()?;
    Ok(config)
}
