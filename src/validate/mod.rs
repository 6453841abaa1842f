//! Validation entry points.
//!
//! Three batteries of independent checks run over a parsed project: the
//! syntax battery (structural errors that block acceptance, followed by
//! the referential-integrity pass against the distro catalog), the
//! semantic battery (warnings), and the settings battery (cross-checks
//! against the per-project settings document). Findings come back in a
//! deterministic order fixed by the battery lists below.

pub mod semantic;
pub mod settings;
pub mod syntax;
pub mod task_sync;

use tracing::debug;

use crate::error::{ValidationErrors, ValidationLevel};
use crate::model::types::{Project, ProjectRef};
use crate::registry::{self, CommandRegistry, CronEvaluator, DistroCatalog};

/// Runs the syntax battery, then resolves distro references against the
/// catalog. A catalog failure yields a single error finding and skips the
/// referential-integrity pass.
pub fn check_project_syntax(
    project: &Project,
    commands: &dyn CommandRegistry,
    cron: &dyn CronEvaluator,
    distros: &dyn DistroCatalog,
) -> ValidationErrors {
    debug!(project = %project.identifier, "running syntax battery");
    let mut errs = ValidationErrors::new();
    errs.extend(syntax::ensure_has_necessary_bv_fields(project));
    errs.extend(syntax::check_dependency_graph(project));
    errs.extend(syntax::validate_plugin_commands(project, commands));
    errs.extend(syntax::ensure_has_necessary_project_fields(project));
    errs.extend(syntax::verify_task_dependencies(project));
    errs.extend(syntax::verify_task_requirements(project));
    errs.extend(syntax::validate_task_names(project));
    errs.extend(syntax::validate_bv_names(project));
    errs.extend(syntax::validate_bv_batch_times(project, cron));
    errs.extend(syntax::validate_display_task_names(project));
    errs.extend(syntax::validate_bv_task_names(project));
    errs.extend(syntax::validate_bvs_contain_tasks(project));
    errs.extend(syntax::check_all_dependencies_spec(project));
    errs.extend(syntax::validate_project_task_names(project));
    errs.extend(syntax::validate_project_task_ids_and_tags(project));
    errs.extend(syntax::validate_task_groups(project));
    errs.extend(syntax::validate_create_hosts(project));
    errs.extend(syntax::validate_duplicate_bv_tasks(project));
    errs.extend(syntax::validate_generate_tasks(project));
    errs.extend(task_sync::validate_task_sync_commands(project));

    match registry::distros_for_project(distros, &project.identifier) {
        Ok((ids, aliases)) => {
            errs.extend(syntax::ensure_referential_integrity(project, &ids, &aliases));
        }
        Err(err) => {
            debug!(error = %err, "distro catalog query failed; skipping referential integrity");
            errs.error(format!("can't get distros from the catalog: {}", err));
        }
    }
    errs
}

/// Runs the semantic battery.
pub fn check_project_semantics(project: &Project) -> ValidationErrors {
    debug!(project = %project.identifier, "running semantic battery");
    let mut errs = ValidationErrors::new();
    errs.extend(semantic::check_task_commands(project));
    errs.extend(semantic::check_task_groups(project));
    errs.extend(semantic::check_logger_config(project));
    errs
}

/// Runs the settings battery against the per-project settings document.
pub fn check_project_settings(project: &Project, project_ref: &ProjectRef) -> ValidationErrors {
    debug!(project = %project.identifier, "running settings battery");
    let mut errs = ValidationErrors::new();
    errs.extend(settings::validate_task_sync_settings(project, project_ref));
    errs
}

/// Strict re-parse of the raw configuration document. Unknown fields and
/// malformed structure come back as a single warning finding; the lenient
/// production parser may still accept the document.
pub fn check_yaml_strict(yaml: &[u8]) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    if let Err(err) = serde_yaml::from_slice::<Project>(yaml) {
        errs.warning(err.to_string());
    }
    errs
}

/// The error-level findings of all three batteries, labeled per battery.
/// Warning-only configurations produce no `ConfigurationError`.
#[derive(Debug, Clone)]
pub struct ConfigurationError {
    pub syntax: ValidationErrors,
    pub semantic: ValidationErrors,
    pub settings: ValidationErrors,
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sections = Vec::new();
        if !self.syntax.is_empty() {
            sections.push(format!("project contains syntax errors: {}", self.syntax.messages()));
        }
        if !self.semantic.is_empty() {
            sections.push(format!(
                "project contains semantic errors: {}",
                self.semantic.messages()
            ));
        }
        if !self.settings.is_empty() {
            sections.push(format!(
                "project contains errors related to project settings: {}",
                self.settings.messages()
            ));
        }
        write!(f, "{}", sections.join("\n"))
    }
}

impl std::error::Error for ConfigurationError {}

/// Runs all three batteries and collapses their error-level findings into
/// one combined error. Warnings are dropped at this boundary.
pub fn check_project_configuration_is_valid(
    project: &Project,
    project_ref: &ProjectRef,
    commands: &dyn CommandRegistry,
    cron: &dyn CronEvaluator,
    distros: &dyn DistroCatalog,
) -> Result<(), ConfigurationError> {
    let syntax = check_project_syntax(project, commands, cron, distros).at_level(ValidationLevel::Error);
    let semantic = check_project_semantics(project).at_level(ValidationLevel::Error);
    let settings = check_project_settings(project, project_ref).at_level(ValidationLevel::Error);

    if syntax.is_empty() && semantic.is_empty() && settings.is_empty() {
        return Ok(());
    }
    Err(ConfigurationError {
        syntax,
        semantic,
        settings,
    })
}
