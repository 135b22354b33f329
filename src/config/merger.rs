// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::PathBuf;

use super::types::{ResolvedConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub agent_command: Option<String>,
    pub max_iterations: Option<u32>,
    pub max_turns: Option<u32>,
    pub timeout_seconds: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.repo-expert.local.json)
/// 3. Workspace config (.repo-expert.json)
/// 4. Global config (~/.repo-expert/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_workspace_config(&mut result, &config);
    }

    // Apply CLI options (highest precedence)
    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if let Some(ref command) = config.agent_command {
        result.agent_command = command.clone();
    }

    if let Some(ref args) = config.agent_args {
        result.agent_args = args.clone();
    }

    if let Some(skip) = config.skip_permissions {
        result.skip_permissions = skip;
    }

    if let Some(max_iterations) = config.max_iterations {
        result.max_iterations = max_iterations;
    }

    if let Some(max_turns) = config.max_turns {
        result.max_turns = max_turns;
    }

    if let Some(timeout) = config.timeout_seconds {
        result.timeout_seconds = timeout;
    }

    if let Some(ref generator) = config.generator {
        result.generator.merge(generator);
    }

    if let Some(ref validator) = config.validator {
        result.validator.merge(validator);
    }

    if config.log_dir.is_some() {
        result.log_dir = config.log_dir.clone();
    }

    if let Some(ref host) = config.host {
        result.host = host.clone();
    }

    if let Some(port) = config.port {
        result.port = port;
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref command) = cli.agent_command {
        result.agent_command = command.clone();
    }

    if let Some(max_iterations) = cli.max_iterations {
        result.max_iterations = max_iterations;
    }

    // CLI bounds apply to both stages, overriding per-stage file settings.
    if let Some(max_turns) = cli.max_turns {
        result.max_turns = max_turns;
        result.generator.max_turns = None;
        result.validator.max_turns = None;
    }

    if let Some(timeout) = cli.timeout_seconds {
        result.timeout_seconds = timeout;
        result.generator.timeout_seconds = None;
        result.validator.timeout_seconds = None;
    }

    if cli.log_dir.is_some() {
        result.log_dir = cli.log_dir.clone();
    }

    if let Some(ref host) = cli.host {
        result.host = host.clone();
    }

    if let Some(port) = cli.port {
        result.port = port;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageOverride;

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert_eq!(config.agent_command, "claude");
        assert_eq!(config.max_iterations, 3);
    }

    #[test]
    fn test_merge_config_precedence() {
        let global = WorkspaceConfig {
            agent_command: Some("global-agent".to_string()),
            max_turns: Some(4),
            port: Some(9000),
            ..Default::default()
        };

        let workspace = WorkspaceConfig {
            agent_command: Some("workspace-agent".to_string()),
            max_iterations: Some(5),
            ..Default::default()
        };

        let local = WorkspaceConfig {
            max_iterations: Some(2),
            ..Default::default()
        };

        let result = merge_config(Some(global), Some(workspace), Some(local), CliOptions::default());

        assert_eq!(result.agent_command, "workspace-agent"); // Workspace overrides global
        assert_eq!(result.max_iterations, 2); // Local overrides workspace
        assert_eq!(result.max_turns, 4); // From global
        assert_eq!(result.port, 9000);
    }

    #[test]
    fn test_merge_stage_overrides() {
        let workspace = WorkspaceConfig {
            generator: Some(StageOverride {
                max_turns: Some(10),
                timeout_seconds: Some(600),
            }),
            ..Default::default()
        };
        let local = WorkspaceConfig {
            generator: Some(StageOverride {
                max_turns: None,
                timeout_seconds: Some(900),
            }),
            ..Default::default()
        };

        let result = merge_config(None, Some(workspace), Some(local), CliOptions::default());
        assert_eq!(result.generator.max_turns, Some(10));
        assert_eq!(result.generator.timeout_seconds, Some(900));
        assert_eq!(result.validator, StageOverride::default());
    }

    #[test]
    fn test_cli_options_override() {
        let workspace = WorkspaceConfig {
            agent_command: Some("workspace-agent".to_string()),
            validator: Some(StageOverride {
                max_turns: Some(9),
                timeout_seconds: None,
            }),
            ..Default::default()
        };

        let cli = CliOptions {
            agent_command: Some("cli-agent".to_string()),
            max_turns: Some(2),
            timeout_seconds: Some(30),
            host: Some("127.0.0.1".to_string()),
            ..Default::default()
        };

        let result = merge_config(None, Some(workspace), None, cli);
        assert_eq!(result.agent_command, "cli-agent");
        assert_eq!(result.validator_settings().max_turns, 2);
        assert_eq!(result.generator_settings().timeout_secs, 30);
        assert_eq!(result.bind_address(), "127.0.0.1:8001");
    }
}
