//! Serde types mirroring the project configuration document.
//!
//! These types are the serde target for the YAML a repository ships to
//! describe its build variants, tasks, task groups and plugin commands.
//! Every struct denies unknown fields so that `check_yaml_strict` can
//! surface typos as findings; the production parser that tolerates them
//! lives upstream of this crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// TOP-LEVEL PROJECT
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    #[serde(default)]
    pub identifier: String,
    #[serde(default, rename = "batchtime")]
    pub batch_time: i64,
    #[serde(default)]
    pub command_type: Option<String>,
    #[serde(default)]
    pub pre: Option<Vec<PluginCommand>>,
    #[serde(default)]
    pub post: Option<Vec<PluginCommand>>,
    #[serde(default)]
    pub timeout: Option<Vec<PluginCommand>>,
    /// Named command sequences, callable from any command site.
    #[serde(default)]
    pub functions: BTreeMap<String, Vec<PluginCommand>>,
    #[serde(default)]
    pub tasks: Vec<ProjectTask>,
    #[serde(default, rename = "buildvariants")]
    pub build_variants: Vec<BuildVariant>,
    #[serde(default)]
    pub task_groups: Vec<TaskGroup>,
    #[serde(default)]
    pub loggers: Option<LoggerConfig>,
    /// Scratch space for YAML anchors. Never interpreted; present only so
    /// a strict parse does not reject configurations that use it.
    #[serde(default)]
    pub variables: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectTask {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<TaskUnitDependency>,
    #[serde(default)]
    pub requires: Vec<TaskUnitRequirement>,
    #[serde(default)]
    pub commands: Vec<PluginCommand>,
    #[serde(default)]
    pub patchable: Option<bool>,
    #[serde(default)]
    pub patch_only: Option<bool>,
    #[serde(default)]
    pub git_tag_only: Option<bool>,
}

// =============================================================================
// BUILD VARIANTS
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildVariant {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// Default distros for task units that do not list their own.
    #[serde(default)]
    pub run_on: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<BuildVariantTaskUnit>,
    #[serde(default)]
    pub display_tasks: Vec<DisplayTask>,
    #[serde(default, rename = "batchtime")]
    pub batch_time: Option<i64>,
    #[serde(default, rename = "cron")]
    pub cron_batch_time: Option<String>,
}

/// The occurrence of a task (or task group) inside a build variant,
/// possibly overriding the task-level spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildVariantTaskUnit {
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
    /// Fixed to the enclosing build variant during expansion; never read
    /// from the document itself.
    #[serde(skip)]
    pub variant: String,
    #[serde(default)]
    pub distros: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<TaskUnitDependency>,
    #[serde(default)]
    pub requires: Vec<TaskUnitRequirement>,
    #[serde(default)]
    pub patchable: Option<bool>,
    #[serde(default)]
    pub patch_only: Option<bool>,
    #[serde(default)]
    pub git_tag_only: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplayTask {
    pub name: String,
    #[serde(default)]
    pub execution_tasks: Vec<String>,
}

// =============================================================================
// TASK GROUPS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskGroup {
    pub name: String,
    /// Ordered member task names.
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default = "default_max_hosts")]
    pub max_hosts: i64,
    #[serde(default)]
    pub setup_group: Option<Vec<PluginCommand>>,
    #[serde(default)]
    pub setup_task: Option<Vec<PluginCommand>>,
    #[serde(default)]
    pub teardown_group: Option<Vec<PluginCommand>>,
    #[serde(default)]
    pub teardown_task: Option<Vec<PluginCommand>>,
}

fn default_max_hosts() -> i64 {
    1
}

impl Default for TaskGroup {
    fn default() -> Self {
        TaskGroup {
            name: String::new(),
            tasks: Vec::new(),
            max_hosts: default_max_hosts(),
            setup_group: None,
            setup_task: None,
            teardown_group: None,
            teardown_task: None,
        }
    }
}

// =============================================================================
// DEPENDENCIES & REQUIREMENTS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskUnitDependency {
    pub name: String,
    #[serde(default)]
    pub variant: String,
    /// Terminal status required of the dependency. Empty means "success".
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub patch_optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskUnitRequirement {
    pub name: String,
    #[serde(default)]
    pub variant: String,
}

// =============================================================================
// PLUGIN COMMANDS
// =============================================================================

/// One plugin command invocation: either a concrete `command` identifier
/// or a `function` reference, never both meaningfully.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginCommand {
    #[serde(default)]
    pub command: String,
    #[serde(default, rename = "func")]
    pub function: String,
    #[serde(default, rename = "type")]
    pub command_type: Option<String>,
    #[serde(default)]
    pub display_name: String,
    /// Heterogeneous plugin parameters; probed only through
    /// [`PluginCommand::string_param`].
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    /// Build variant allow-list. Empty means the command runs everywhere.
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub loggers: Option<LoggerConfig>,
}

/// Result of probing the parameter map for a string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringParam<'a> {
    Absent,
    NotAString,
    Value(&'a str),
}

impl PluginCommand {
    /// Whether this command runs on the given build variant.
    pub fn runs_on_variant(&self, bv: &str) -> bool {
        self.variants.is_empty() || self.variants.iter().any(|v| v == bv)
    }

    /// Typed accessor over the opaque parameter map.
    pub fn string_param(&self, key: &str) -> StringParam<'_> {
        match self.params.get(key) {
            None => StringParam::Absent,
            Some(Value::String(s)) => StringParam::Value(s),
            Some(_) => StringParam::NotAString,
        }
    }

    /// Display identifier used in findings: the command identifier, or the
    /// function reference when the site is a function call.
    pub fn described(&self) -> String {
        if !self.function.is_empty() {
            format!("'{}' function", self.function)
        } else {
            format!("'{}' command", self.command)
        }
    }
}

// =============================================================================
// LOGGER CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    #[serde(default)]
    pub agent: Vec<LogOpts>,
    #[serde(default)]
    pub system: Vec<LogOpts>,
    #[serde(default)]
    pub task: Vec<LogOpts>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogOpts {
    #[serde(default, rename = "type")]
    pub log_type: String,
    #[serde(default)]
    pub splunk_server: Option<String>,
    #[serde(default)]
    pub log_directory: Option<String>,
}

impl LoggerConfig {
    /// Verifies every configured logger names a known type and carries the
    /// fields that type needs.
    pub fn is_valid(&self) -> Result<(), String> {
        for opts in self
            .agent
            .iter()
            .chain(self.system.iter())
            .chain(self.task.iter())
        {
            opts.is_valid()?;
        }
        Ok(())
    }
}

impl LogOpts {
    fn is_valid(&self) -> Result<(), String> {
        match self.log_type.as_str() {
            crate::model::LOG_TYPE_SERVICE => Ok(()),
            crate::model::LOG_TYPE_FILE => {
                if self.log_directory.as_deref().unwrap_or("").is_empty() {
                    Err(format!(
                        "logger type '{}' requires a log directory",
                        self.log_type
                    ))
                } else {
                    Ok(())
                }
            }
            crate::model::LOG_TYPE_SPLUNK => {
                if self.splunk_server.as_deref().unwrap_or("").is_empty() {
                    Err(format!(
                        "logger type '{}' requires a splunk server",
                        self.log_type
                    ))
                } else {
                    Ok(())
                }
            }
            other => Err(format!("'{}' is not a valid logger type", other)),
        }
    }
}

// =============================================================================
// PROJECT SETTINGS (external, mutable per-project document)
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub task_sync: TaskSyncOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSyncOptions {
    /// Whether the project configuration may use the task data-transfer
    /// commands at all.
    #[serde(default)]
    pub config_enabled: bool,
}
