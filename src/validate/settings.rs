//! Settings battery: cross-checks between the project configuration and
//! the per-project settings document.

use crate::error::ValidationErrors;
use crate::model::types::{Project, ProjectRef};
use crate::model::{S3_PULL_COMMAND, S3_PUSH_COMMAND};

/// Task sync commands may only appear in the configuration when the
/// project settings have task sync enabled for the config.
pub fn validate_task_sync_settings(project: &Project, project_ref: &ProjectRef) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    if project_ref.task_sync.config_enabled {
        return errs;
    }
    for command in [S3_PUSH_COMMAND, S3_PULL_COMMAND] {
        if !project.tasks_that_call_command(command).is_empty() {
            errs.error(format!(
                "cannot use command '{}' in the project configuration when it is disabled by \
                 the project settings",
                command
            ));
        }
    }
    errs
}
