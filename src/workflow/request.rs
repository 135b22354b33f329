// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Validated workflow input.

use std::path::{Path, PathBuf};

use crate::error::RequestError;

/// A question about one repository. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRequest {
    question: String,
    repository_path: PathBuf,
}

impl WorkflowRequest {
    /// Validate the input and resolve the repository to an absolute path.
    pub fn new(
        question: impl Into<String>,
        repository_path: impl AsRef<Path>,
    ) -> Result<Self, RequestError> {
        let question = question.into().trim().to_string();
        if question.is_empty() {
            return Err(RequestError::EmptyQuestion);
        }

        let path = repository_path.as_ref();
        let display = path.display().to_string();
        if display.trim().is_empty() {
            return Err(RequestError::EmptyRepositoryPath);
        }
        if !path.exists() {
            return Err(RequestError::RepositoryNotFound(display));
        }
        if !path.is_dir() {
            return Err(RequestError::NotADirectory(display));
        }
        let repository_path = path
            .canonicalize()
            .map_err(|e| RequestError::Unresolvable(format!("{display}: {e}")))?;

        Ok(Self {
            question,
            repository_path,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }
}
