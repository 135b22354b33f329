// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of workspace and resolved configuration,
//! supporting JSON and YAML formats.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::invoker::{InvokerConfig, DEFAULT_AGENT_COMMAND, DEFAULT_MAX_TURNS, DEFAULT_TIMEOUT_SECS};
use crate::stages::StageSettings;
use crate::workflow::{WorkflowConfig, DEFAULT_MAX_ITERATIONS};

/// Default bind host for the HTTP transport.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default port for the HTTP transport.
pub const DEFAULT_PORT: u16 = 8001;

/// Workspace configuration for the repository expert.
/// Can be defined in .repo-expert.json or .repo-expert/config.json in the project root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Agent executable (default: claude)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_command: Option<String>,

    /// Extra arguments placed before the generated ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_args: Option<Vec<String>>,

    /// Run the agent without permission prompts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_permissions: Option<bool>,

    /// Generator rounds per question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// Agent turns per invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,

    /// Wall-clock bound per invocation in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<StageOverride>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator: Option<StageOverride>,

    /// Directory for per-task trace logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Per-stage overrides of the invocation bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl StageOverride {
    /// Layer `other` on top of this override.
    pub fn merge(&mut self, other: &StageOverride) {
        if other.max_turns.is_some() {
            self.max_turns = other.max_turns;
        }
        if other.timeout_seconds.is_some() {
            self.timeout_seconds = other.timeout_seconds;
        }
    }
}

/// Resolved configuration with all values set.
/// This is the merged result of global, workspace, local, and CLI configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub agent_command: String,
    pub agent_args: Vec<String>,
    pub skip_permissions: bool,
    pub max_iterations: u32,
    pub max_turns: u32,
    pub timeout_seconds: u64,
    pub generator: StageOverride,
    pub validator: StageOverride,
    pub log_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            agent_command: DEFAULT_AGENT_COMMAND.to_string(),
            agent_args: Vec::new(),
            skip_permissions: true,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_turns: DEFAULT_MAX_TURNS,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            generator: StageOverride::default(),
            validator: StageOverride::default(),
            log_dir: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ResolvedConfig {
    /// Reject values the workflow cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_command.trim().is_empty() {
            return Err(ConfigError::invalid("agentCommand", "must not be empty"));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid("maxIterations", "must be at least 1"));
        }
        for (field, settings) in [
            ("generator", self.generator_settings()),
            ("validator", self.validator_settings()),
        ] {
            if settings.max_turns == 0 {
                return Err(ConfigError::invalid(
                    format!("{field}.maxTurns"),
                    "must be at least 1",
                ));
            }
            if settings.timeout_secs == 0 {
                return Err(ConfigError::invalid(
                    format!("{field}.timeoutSeconds"),
                    "must be at least 1",
                ));
            }
        }
        Ok(())
    }

    pub fn generator_settings(&self) -> StageSettings {
        self.stage_settings(&self.generator)
    }

    pub fn validator_settings(&self) -> StageSettings {
        self.stage_settings(&self.validator)
    }

    fn stage_settings(&self, stage: &StageOverride) -> StageSettings {
        StageSettings::new(
            stage.max_turns.unwrap_or(self.max_turns),
            stage.timeout_seconds.unwrap_or(self.timeout_seconds),
        )
    }

    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            max_iterations: self.max_iterations,
            generator: self.generator_settings(),
            validator: self.validator_settings(),
        }
    }

    pub fn invoker_config(&self) -> InvokerConfig {
        InvokerConfig::new(self.agent_command.clone())
            .with_base_args(self.agent_args.clone())
            .with_skip_permissions(self.skip_permissions)
    }

    /// `host:port` for the HTTP transport.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
