//! In-memory project model: serde types, lookup helpers and the
//! dependency graph built over task × variant pairs.

pub mod graph;
mod project;
pub mod types;

pub use graph::{dependencies_for_task_unit, DepEdge, DependencyGraph, TVPair};
pub use types::*;

// Sentinels recognized inside dependency specifications.
pub const ALL_DEPENDENCIES: &str = "*";
pub const ALL_VARIANTS: &str = "*";
pub const ALL_STATUSES: &str = "*";

// Terminal task statuses a dependency may require.
pub const TASK_SUCCEEDED: &str = "success";
pub const TASK_FAILED: &str = "failed";

// Plugin command identifiers with validator-enforced contracts.
pub const S3_PUSH_COMMAND: &str = "s3.push";
pub const S3_PULL_COMMAND: &str = "s3.pull";
pub const CREATE_HOST_COMMAND: &str = "createHost";
pub const GENERATE_TASKS_COMMAND: &str = "generateTasks";
pub const ATTACH_RESULTS_COMMAND: &str = "attach.results";
pub const ATTACH_ARTIFACTS_COMMAND: &str = "attach.artifacts";

/// Command types a project or plugin command may declare.
pub const VALID_COMMAND_TYPES: &[&str] = &["system", "setup", "test"];

/// Characters forbidden in build variant names. Task names additionally
/// forbid whitespace.
pub const UNAUTHORIZED_CHARACTERS: &str = "|";

/// Characters that task names and tags may not start with; they collide
/// with the selector syntax used to address tasks by criterion.
pub const INVALID_CRITERION_START_CHARS: &[char] = &['!', '.'];

/// Reserved prefix for display task names.
pub const DISPLAY_TASK_PREFIX: &str = "display_";

// Logger types accepted in a `LoggerConfig`.
pub const LOG_TYPE_SERVICE: &str = "service";
pub const LOG_TYPE_FILE: &str = "file";
pub const LOG_TYPE_SPLUNK: &str = "splunk";

// Call-count caps on specially metered commands.
pub const MAX_CREATE_HOSTS_PER_TASK: usize = 3;
pub const MAX_CREATE_HOSTS_TOTAL: usize = 50;
