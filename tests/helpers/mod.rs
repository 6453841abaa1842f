//! Shared builders for validator integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::json;

use validator::error::{ValidationErrors, ValidationLevel};
use validator::model::types::*;
use validator::registry::{
    BuiltinCommandRegistry, CollaboratorError, CronEvaluator, Distro, DistroCatalog,
    FiveFieldCron, StaticDistroCatalog,
};
use validator::validate;

pub const DISTRO: &str = "ubuntu2204";

// =============================================================================
// Model builders
// =============================================================================

pub fn shell_exec() -> PluginCommand {
    PluginCommand {
        command: "shell.exec".into(),
        ..Default::default()
    }
}

pub fn cmd(name: &str) -> PluginCommand {
    PluginCommand {
        command: name.into(),
        ..Default::default()
    }
}

pub fn s3_push() -> PluginCommand {
    cmd("s3.push")
}

pub fn s3_pull(task: &str, from_build_variant: Option<&str>) -> PluginCommand {
    let mut pull = cmd("s3.pull");
    pull.params.insert("task".into(), json!(task));
    if let Some(bv) = from_build_variant {
        pull.params.insert("from_build_variant".into(), json!(bv));
    }
    pull
}

pub fn task(name: &str) -> ProjectTask {
    ProjectTask {
        name: name.into(),
        commands: vec![shell_exec()],
        ..Default::default()
    }
}

pub fn task_depending_on(name: &str, dependency: &str) -> ProjectTask {
    let mut t = task(name);
    t.depends_on = vec![dep(dependency)];
    t
}

pub fn dep(name: &str) -> TaskUnitDependency {
    TaskUnitDependency {
        name: name.into(),
        ..Default::default()
    }
}

pub fn unit(name: &str) -> BuildVariantTaskUnit {
    BuildVariantTaskUnit {
        name: name.into(),
        ..Default::default()
    }
}

pub fn variant(name: &str, task_names: &[&str]) -> BuildVariant {
    BuildVariant {
        name: name.into(),
        run_on: vec![DISTRO.into()],
        tasks: task_names.iter().map(|n| unit(n)).collect(),
        ..Default::default()
    }
}

/// The acyclic baseline: tasks `a` and `b` with `b` depending on `a`,
/// both scheduled on `v1` with a catalog-known distro.
pub fn baseline_project() -> Project {
    Project {
        identifier: "p".into(),
        tasks: vec![task("a"), task_depending_on("b", "a")],
        build_variants: vec![variant("v1", &["a", "b"])],
        ..Default::default()
    }
}

pub fn sync_enabled_ref() -> ProjectRef {
    ProjectRef {
        identifier: "p".into(),
        task_sync: TaskSyncOptions {
            config_enabled: true,
        },
    }
}

// =============================================================================
// Collaborator wiring
// =============================================================================

pub fn standard_registry() -> BuiltinCommandRegistry {
    BuiltinCommandRegistry::standard()
}

pub fn standard_catalog() -> StaticDistroCatalog {
    StaticDistroCatalog {
        distros: vec![Distro {
            id: DISTRO.into(),
            aliases: vec!["linux".into()],
            valid_projects: vec![],
        }],
    }
}

pub struct FailingCatalog;

impl DistroCatalog for FailingCatalog {
    fn find_all(&self) -> Result<Vec<Distro>, CollaboratorError> {
        Err(CollaboratorError::new("catalog connection refused"))
    }
}

pub struct RejectingCron;

impl CronEvaluator for RejectingCron {
    fn next_activation(
        &self,
        _now: DateTime<Utc>,
        expr: &str,
    ) -> Result<DateTime<Utc>, CollaboratorError> {
        Err(CollaboratorError::new(format!("unparseable cron '{}'", expr)))
    }
}

/// Syntax battery with the standard collaborators wired in.
pub fn check_syntax(project: &Project) -> ValidationErrors {
    validate::check_project_syntax(
        project,
        &standard_registry(),
        &FiveFieldCron,
        &standard_catalog(),
    )
}

// =============================================================================
// Assertions
// =============================================================================

pub fn assert_clean(errs: &ValidationErrors) {
    assert!(errs.is_empty(), "expected no findings, got:\n{}", errs);
}

pub fn assert_error_containing(errs: &ValidationErrors, fragments: &[&str]) {
    assert_finding_containing(errs, ValidationLevel::Error, fragments);
}

pub fn assert_warning_containing(errs: &ValidationErrors, fragments: &[&str]) {
    assert_finding_containing(errs, ValidationLevel::Warning, fragments);
}

fn assert_finding_containing(errs: &ValidationErrors, level: ValidationLevel, fragments: &[&str]) {
    let found = errs
        .iter()
        .any(|e| e.level == level && fragments.iter().all(|f| e.message.contains(f)));
    assert!(
        found,
        "no {} finding containing {:?}; findings were:\n{}",
        level, fragments, errs
    );
}

pub fn assert_no_finding_containing(errs: &ValidationErrors, fragment: &str) {
    assert!(
        !errs.iter().any(|e| e.message.contains(fragment)),
        "unexpected finding containing {:?}; findings were:\n{}",
        fragment,
        errs
    );
}
