//! Seams to the validator's external collaborators: the plugin command
//! registry, the worker distro catalog, and the cron evaluator.
//!
//! Failures crossing these seams never abort a validation pass; the
//! caller turns them into findings and keeps going.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::types::PluginCommand;

/// Error reported by a collaborator. The text ends up verbatim inside a
/// finding, so it should name the entity it is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorError {
    pub message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        CollaboratorError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CollaboratorError {}

// =============================================================================
// COMMAND REGISTRY
// =============================================================================

pub trait CommandRegistry {
    /// Resolves a command specification against the project's function map
    /// to an executable plugin binding.
    fn render(
        &self,
        cmd: &PluginCommand,
        functions: &BTreeMap<String, Vec<PluginCommand>>,
    ) -> Result<(), CollaboratorError>;
}

/// Registry backed by a fixed set of known command identifiers.
#[derive(Debug, Clone, Default)]
pub struct BuiltinCommandRegistry {
    known: BTreeSet<String>,
}

impl BuiltinCommandRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BuiltinCommandRegistry {
            known: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The commands every worker ships with.
    pub fn standard() -> Self {
        Self::new([
            "shell.exec",
            "subprocess.exec",
            "git.get_project",
            "archive.targz_pack",
            "archive.targz_extract",
            crate::model::ATTACH_RESULTS_COMMAND,
            crate::model::ATTACH_ARTIFACTS_COMMAND,
            crate::model::S3_PUSH_COMMAND,
            crate::model::S3_PULL_COMMAND,
            crate::model::CREATE_HOST_COMMAND,
            crate::model::GENERATE_TASKS_COMMAND,
        ])
    }
}

impl CommandRegistry for BuiltinCommandRegistry {
    fn render(
        &self,
        cmd: &PluginCommand,
        functions: &BTreeMap<String, Vec<PluginCommand>>,
    ) -> Result<(), CollaboratorError> {
        if !cmd.function.is_empty() {
            if !cmd.command.is_empty() {
                return Err(CollaboratorError::new(format!(
                    "cannot specify both command '{}' and function '{}'",
                    cmd.command, cmd.function
                )));
            }
            let Some(body) = functions.get(&cmd.function) else {
                return Err(CollaboratorError::new(format!(
                    "function '{}' does not exist in project",
                    cmd.function
                )));
            };
            for inner in body {
                if !inner.command.is_empty() && !self.known.contains(&inner.command) {
                    return Err(CollaboratorError::new(format!(
                        "function '{}' refers to unknown command '{}'",
                        cmd.function, inner.command
                    )));
                }
            }
            return Ok(());
        }
        if cmd.command.is_empty() {
            return Err(CollaboratorError::new(
                "every command must specify either a command name or a function",
            ));
        }
        if !self.known.contains(&cmd.command) {
            return Err(CollaboratorError::new(format!(
                "command '{}' is not registered",
                cmd.command
            )));
        }
        Ok(())
    }
}

// =============================================================================
// DISTRO CATALOG
// =============================================================================

/// A registered worker distro.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Distro {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// When non-empty, only the listed projects may target this distro.
    #[serde(default)]
    pub valid_projects: Vec<String>,
}

pub trait DistroCatalog {
    fn find_all(&self) -> Result<Vec<Distro>, CollaboratorError>;
}

/// Distro ids and aliases visible to a project. Distros restricted via
/// `valid_projects` are filtered out for other projects; an empty project
/// id sees everything.
pub fn distros_for_project(
    catalog: &dyn DistroCatalog,
    project_id: &str,
) -> Result<(Vec<String>, Vec<String>), CollaboratorError> {
    let mut ids = Vec::new();
    let mut aliases: Vec<String> = Vec::new();
    for distro in catalog.find_all()? {
        let visible = project_id.is_empty()
            || distro.valid_projects.is_empty()
            || distro.valid_projects.iter().any(|p| p == project_id);
        if !visible {
            continue;
        }
        ids.push(distro.id);
        for alias in distro.aliases {
            if !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
    }
    Ok((ids, aliases))
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticDistroCatalog {
    pub distros: Vec<Distro>,
}

impl StaticDistroCatalog {
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticDistroCatalog {
            distros: ids
                .into_iter()
                .map(|id| Distro {
                    id: id.into(),
                    ..Default::default()
                })
                .collect(),
        }
    }
}

impl DistroCatalog for StaticDistroCatalog {
    fn find_all(&self) -> Result<Vec<Distro>, CollaboratorError> {
        Ok(self.distros.clone())
    }
}

// =============================================================================
// CRON EVALUATOR
// =============================================================================

pub trait CronEvaluator {
    /// Next activation of a cron expression after `now`. The validator
    /// only consumes the error side, as a parsing probe.
    fn next_activation(
        &self,
        now: DateTime<Utc>,
        expr: &str,
    ) -> Result<DateTime<Utc>, CollaboratorError>;
}

/// Structural probe that accepts any well-formed five-field expression.
/// It computes no schedule; a valid expression just echoes `now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiveFieldCron;

impl CronEvaluator for FiveFieldCron {
    fn next_activation(
        &self,
        now: DateTime<Utc>,
        expr: &str,
    ) -> Result<DateTime<Utc>, CollaboratorError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CollaboratorError::new(format!(
                "cron expression '{}' must have 5 fields, found {}",
                expr,
                fields.len()
            )));
        }
        for field in fields {
            if !field
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '*' | ',' | '-' | '/'))
            {
                return Err(CollaboratorError::new(format!(
                    "cron expression '{}' has malformed field '{}'",
                    expr, field
                )));
            }
        }
        Ok(now)
    }
}
