//! Syntax battery: structural and intra-document checks, plus the
//! referential-integrity pass against the distro catalog.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;

use crate::error::{ValidationErrors, ValidationLevel};
use crate::model::graph::DependencyGraph;
use crate::model::types::*;
use crate::model::{
    ALL_DEPENDENCIES, ALL_STATUSES, ALL_VARIANTS, ATTACH_ARTIFACTS_COMMAND,
    ATTACH_RESULTS_COMMAND, CREATE_HOST_COMMAND, DISPLAY_TASK_PREFIX, GENERATE_TASKS_COMMAND,
    INVALID_CRITERION_START_CHARS, MAX_CREATE_HOSTS_PER_TASK, MAX_CREATE_HOSTS_TOTAL,
    TASK_FAILED, TASK_SUCCEEDED, UNAUTHORIZED_CHARACTERS, VALID_COMMAND_TYPES,
};
use crate::registry::{CommandRegistry, CronEvaluator};

/// Every build variant needs a name, at least one task, and a distro for
/// each task (its own or the variant-level default).
pub fn ensure_has_necessary_bv_fields(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    if project.build_variants.is_empty() {
        errs.error(format!(
            "project '{}' must specify at least one build variant",
            project.identifier
        ));
        return errs;
    }
    for bv in &project.build_variants {
        if bv.name.is_empty() {
            errs.error(format!(
                "project '{}' has a build variant without a name",
                project.identifier
            ));
        }
        if bv.tasks.is_empty() {
            errs.error(format!(
                "build variant '{}' in project '{}' must have at least one task",
                bv.name, project.identifier
            ));
        }
        let has_task_without_distro = bv.tasks.iter().any(|unit| unit.distros.is_empty());
        if has_task_without_distro && bv.run_on.is_empty() {
            errs.error(format!(
                "build variant '{}' in project '{}' must either specify run_on or have every \
                 task specify its own distros",
                bv.name, project.identifier
            ));
        }
    }
    errs
}

/// The dependency graph over task × variant pairs must be acyclic and
/// reference only defined pairs.
pub fn check_dependency_graph(project: &Project) -> ValidationErrors {
    let graph = DependencyGraph::build(project);
    let mut errs = ValidationErrors::new();
    for (start, description) in graph.cycle_errors() {
        errs.error(format!(
            "dependency error for task '{}': {}",
            start.task_name, description
        ));
    }
    errs
}

/// Renders a command list against the registry, attributing findings to
/// the named configuration section.
fn validate_commands(
    section: &str,
    project: &Project,
    registry: &dyn CommandRegistry,
    cmds: &[PluginCommand],
) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for cmd in cmds {
        if let Err(err) = registry.render(cmd, &project.functions) {
            errs.error(format!("{} section in {}: {}", section, cmd.described(), err));
        }
        if let Some(cmd_type) = &cmd.command_type {
            if !cmd_type.is_empty() && !VALID_COMMAND_TYPES.contains(&cmd_type.as_str()) {
                errs.error(format!(
                    "{} section in {}: invalid command type '{}'",
                    section,
                    cmd.described(),
                    cmd_type
                ));
            }
        }
    }
    errs
}

/// Every command site must render against the registry; function bodies
/// must be non-empty and may not reference other functions.
///
/// Duplicate function names cannot survive parsing (the function map is
/// keyed by name), so no check for them is needed here.
pub fn validate_plugin_commands(
    project: &Project,
    registry: &dyn CommandRegistry,
) -> ValidationErrors {
    let mut errs = ValidationErrors::new();

    for (func_name, body) in &project.functions {
        if body.is_empty() {
            errs.error(format!(
                "project '{}' function '{}' contains no commands",
                project.identifier, func_name
            ));
            continue;
        }
        for err in validate_commands("functions", project, registry, body) {
            errs.push(crate::error::ValidationError {
                level: err.level,
                message: format!(
                    "project '{}' function '{}' definition: {}",
                    project.identifier, func_name, err.message
                ),
            });
        }
        for cmd in body {
            if !cmd.function.is_empty() {
                errs.error(format!(
                    "cannot reference a function within a function: '{}' referenced within '{}'",
                    cmd.function, func_name
                ));
            }
        }
    }

    if let Some(pre) = &project.pre {
        errs.extend(validate_commands("pre", project, registry, pre));
    }
    if let Some(post) = &project.post {
        errs.extend(validate_commands("post", project, registry, post));
    }
    if let Some(timeout) = &project.timeout {
        errs.extend(validate_commands("timeout", project, registry, timeout));
    }
    for task in &project.tasks {
        errs.extend(validate_commands("tasks", project, registry, &task.commands));
    }
    errs
}

/// Project-level batchtime and command type sanity.
pub fn ensure_has_necessary_project_fields(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();

    if project.batch_time < 0 {
        errs.error(format!(
            "project '{}' must have a non-negative 'batchtime' set",
            project.identifier
        ));
    }
    if project.batch_time > i32::MAX as i64 {
        // warning for compatibility with existing projects; the scheduler
        // caps the effective value at i32::MAX
        errs.warning(format!(
            "project '{}' field 'batchtime' should not exceed {}",
            project.identifier,
            i32::MAX
        ));
    }

    if let Some(cmd_type) = &project.command_type {
        if !cmd_type.is_empty() && !VALID_COMMAND_TYPES.contains(&cmd_type.as_str()) {
            errs.error(format!(
                "project '{}' contains an invalid command type: '{}'",
                project.identifier, cmd_type
            ));
        }
    }
    errs
}

/// Task dependency lists may not contain duplicates, unknown task names,
/// or invalid status sentinels.
pub fn verify_task_dependencies(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    let task_names: HashSet<&str> = project.tasks.iter().map(|t| t.name.as_str()).collect();

    for task in &project.tasks {
        let mut dep_names = HashSet::new();
        for dep in &task.depends_on {
            if !dep_names.insert((dep.name.as_str(), dep.variant.as_str())) {
                errs.error(format!(
                    "project '{}' contains a duplicate dependency '{}' specified for task '{}'",
                    project.identifier, dep.name, task.name
                ));
            }

            match dep.status.as_str() {
                "" | TASK_SUCCEEDED | TASK_FAILED | ALL_STATUSES => {}
                status => errs.error(format!(
                    "project '{}' contains an invalid dependency status for task '{}': '{}'",
                    project.identifier, task.name, status
                )),
            }

            if dep.name != ALL_DEPENDENCIES && !task_names.contains(dep.name.as_str()) {
                errs.error(format!(
                    "project '{}' contains a non-existent task name '{}' in dependencies for \
                     task '{}'",
                    project.identifier, dep.name, task.name
                ));
            }
        }
    }
    errs
}

/// Task requirements must reference existing tasks present on the
/// requested (or current) variant.
pub fn verify_task_requirements(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for bvt in project.find_all_build_variant_tasks() {
        for req in &bvt.requires {
            if project.find_project_task(&req.name).is_none() {
                if req.name == ALL_DEPENDENCIES {
                    errs.error(format!(
                        "task '{}': '*' is not supported for requirement selectors",
                        bvt.name
                    ));
                } else {
                    errs.error(format!(
                        "task '{}' requires non-existent task '{}'",
                        bvt.name, req.name
                    ));
                }
            }
            if !req.variant.is_empty()
                && req.variant != ALL_VARIANTS
                && project.find_build_variant(&req.variant).is_none()
            {
                errs.error(format!(
                    "task '{}' requires non-existent variant '{}'",
                    bvt.name, req.variant
                ));
            }
            let variants_with_task = project.find_variants_with_task(&req.name);
            if !req.variant.is_empty() && req.variant != ALL_VARIANTS {
                if !variants_with_task.contains(&req.variant) {
                    errs.error(format!(
                        "task '{}' requires task '{}' on variant '{}'",
                        bvt.name, req.name, req.variant
                    ));
                }
            } else if !variants_with_task.contains(&bvt.variant) {
                errs.error(format!(
                    "task '{}' requires task '{}' on variant '{}'",
                    bvt.name, req.name, bvt.variant
                ));
            }
        }
    }
    errs
}

/// Task names may not contain the reserved separator or whitespace.
pub fn validate_task_names(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for task in &project.tasks {
        let trimmed = task.name.trim();
        if trimmed
            .chars()
            .any(|c| UNAUTHORIZED_CHARACTERS.contains(c) || c.is_whitespace())
        {
            errs.error(format!(
                "task name '{}' contains unauthorized characters ('{}' or whitespace)",
                task.name, UNAUTHORIZED_CHARACTERS
            ));
        }
    }
    errs
}

/// Build variant names must be unique and free of reserved characters;
/// shared display names are worth a warning once the names are sound.
pub fn validate_bv_names(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    let mut names = HashSet::new();
    let mut display_names: BTreeMap<&str, usize> = BTreeMap::new();

    for bv in &project.build_variants {
        if !names.insert(bv.name.as_str()) {
            errs.error(format!(
                "project '{}' build variant '{}' already exists",
                project.identifier, bv.name
            ));
        }
        let display = if bv.display_name.is_empty() {
            bv.name.as_str()
        } else {
            bv.display_name.as_str()
        };
        *display_names.entry(display).or_insert(0) += 1;

        if bv.name.chars().any(|c| UNAUTHORIZED_CHARACTERS.contains(c)) {
            errs.error(format!(
                "build variant name '{}' contains unauthorized characters ('{}')",
                bv.name, UNAUTHORIZED_CHARACTERS
            ));
        }
    }

    // the display-name warnings only matter once the names themselves are sound
    if !errs.is_empty() {
        return errs;
    }
    for (display, count) in display_names {
        if count > 1 {
            errs.warning(format!(
                "{} build variants share the same display name: '{}'",
                count, display
            ));
        }
    }
    errs
}

/// A build variant may schedule by cron or by batchtime, not both, and a
/// cron expression has to parse.
pub fn validate_bv_batch_times(project: &Project, cron: &dyn CronEvaluator) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for bv in &project.build_variants {
        let Some(expr) = bv.cron_batch_time.as_deref().filter(|e| !e.is_empty()) else {
            continue;
        };
        if bv.batch_time.is_some() {
            errs.error(format!(
                "build variant '{}' cannot specify both cron and batchtime",
                bv.name
            ));
        }
        if let Err(err) = cron.next_activation(Utc::now(), expr) {
            errs.error(format!(
                "cron batchtime '{}' has invalid syntax: {}",
                expr, err
            ));
        }
    }
    errs
}

/// Execution tasks inside a display task may not carry the reserved
/// display prefix themselves.
pub fn validate_display_task_names(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for bv in &project.build_variants {
        for display_task in &bv.display_tasks {
            for exec_task in &display_task.execution_tasks {
                if exec_task.starts_with(DISPLAY_TASK_PREFIX) {
                    errs.error(format!(
                        "execution task '{}' has invalid prefix '{}'",
                        exec_task, DISPLAY_TASK_PREFIX
                    ));
                }
            }
        }
    }
    errs
}

/// Task unit names must be unique within each build variant.
pub fn validate_bv_task_names(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for bv in &project.build_variants {
        let mut seen = HashSet::new();
        for unit in &bv.tasks {
            if !seen.insert(unit.name.as_str()) {
                errs.error(format!(
                    "task '{}' in build variant '{}' in project '{}' already exists",
                    unit.name, bv.name, project.identifier
                ));
            }
        }
    }
    errs
}

/// Variants with no tasks are tolerated but suspicious.
pub fn validate_bvs_contain_tasks(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for bv in &project.build_variants {
        if bv.tasks.is_empty() {
            errs.warning(format!("build variant '{}' contains no tasks", bv.name));
        }
    }
    errs
}

/// An all-dependencies sentinel must be the sole dependency for its
/// variant; mixing it with explicit entries is ambiguous.
pub fn check_all_dependencies_spec(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for task in &project.tasks {
        if task.depends_on.len() <= 1 {
            continue;
        }
        let mut covered_variants = HashSet::new();
        for dep in &task.depends_on {
            if dep.name != ALL_DEPENDENCIES {
                continue;
            }
            if dep.variant.is_empty() || covered_variants.contains(dep.variant.as_str()) {
                errs.error(format!(
                    "task '{}' in project '{}' combines the all-dependencies sentinel ('{}') \
                     with other explicit dependencies or duplicate variants",
                    task.name, project.identifier, ALL_DEPENDENCIES
                ));
            }
            covered_variants.insert(dep.variant.as_str());
        }
    }
    errs
}

/// Task names must be unique project-wide.
pub fn validate_project_task_names(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    let mut seen = HashSet::new();
    for task in &project.tasks {
        if !seen.insert(task.name.as_str()) {
            errs.error(format!(
                "task '{}' in project '{}' already exists",
                task.name, project.identifier
            ));
        }
    }
    errs
}

/// Task names and tags may not start with selector syntax characters, and
/// tags may not contain whitespace.
pub fn validate_project_task_ids_and_tags(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for task in &project.tasks {
        if let Some(first) = task.name.chars().next() {
            if INVALID_CRITERION_START_CHARS.contains(&first) {
                errs.error(format!(
                    "task '{}' has an invalid name: starts with invalid character '{}'",
                    task.name, first
                ));
            }
        }
        for tag in &task.tags {
            if let Some(first) = tag.chars().next() {
                if INVALID_CRITERION_START_CHARS.contains(&first) {
                    errs.error(format!(
                        "task '{}' has invalid tag '{}': starts with invalid character '{}'",
                        task.name, tag, first
                    ));
                }
            }
            if tag.chars().any(char::is_whitespace) {
                errs.error(format!(
                    "task '{}' has invalid tag '{}': tag contains white space",
                    task.name, tag
                ));
            }
        }
    }
    errs
}

/// Task group structure: members exist once, the group name does not
/// shadow a task, and teardown-group does not attach results.
pub fn validate_task_groups(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for tg in &project.task_groups {
        if tg.tasks.is_empty() {
            errs.error(format!(
                "task group '{}' must have at least one task",
                tg.name
            ));
        }
        if project.tasks.iter().any(|t| t.name == tg.name) {
            errs.error(format!(
                "'{}' is used as a name for both a task and a task group",
                tg.name
            ));
        }
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for member in &tg.tasks {
            *counts.entry(member.as_str()).or_insert(0) += 1;
        }
        for (member, count) in counts {
            if count > 1 {
                errs.error(format!(
                    "task '{}' is listed in task group '{}' {} times",
                    member, tg.name, count
                ));
            }
        }
        if let Some(teardown) = &tg.teardown_group {
            for cmd in teardown {
                if cmd.command == ATTACH_RESULTS_COMMAND || cmd.command == ATTACH_ARTIFACTS_COMMAND
                {
                    errs.error(format!(
                        "'{}' cannot be used in the group teardown stage",
                        cmd.command
                    ));
                }
            }
        }
    }
    errs
}

/// Per-task cap findings for a specially metered command. Iterates every
/// build variant × task unit occurrence, so a task scheduled on several
/// variants is reported once per occurrence.
pub(super) fn validate_times_called_per_task(
    project: &Project,
    counts: &BTreeMap<String, usize>,
    command_name: &str,
    times: usize,
    level: ValidationLevel,
) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for bv in &project.build_variants {
        for unit in &bv.tasks {
            if let Some(&count) = counts.get(&unit.name) {
                if count > times {
                    errs.push(crate::error::ValidationError {
                        level,
                        message: format!(
                            "build variant '{}' with task '{}' may only call {} {} time(s) \
                             but calls it {} time(s)",
                            bv.name, unit.name, command_name, times, count
                        ),
                    });
                }
            }
        }
    }
    errs
}

/// Project-total cap finding for a specially metered command, summed over
/// every build variant × task unit occurrence.
pub(super) fn validate_times_called_total(
    project: &Project,
    counts: &BTreeMap<String, usize>,
    command_name: &str,
    times: usize,
) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    let mut total = 0;
    for bv in &project.build_variants {
        for unit in &bv.tasks {
            if let Some(&count) = counts.get(&unit.name) {
                total += count;
            }
        }
    }
    if total > times {
        errs.error(format!(
            "project configuration may only call {} {} time(s) but it is called {} time(s)",
            command_name, times, total
        ));
    }
    errs
}

/// The host-creation command is capped per task and per project.
pub fn validate_create_hosts(project: &Project) -> ValidationErrors {
    let counts = project.tasks_that_call_command(CREATE_HOST_COMMAND);
    let mut errs = validate_times_called_per_task(
        project,
        &counts,
        CREATE_HOST_COMMAND,
        MAX_CREATE_HOSTS_PER_TASK,
        ValidationLevel::Error,
    );
    errs.extend(validate_times_called_total(
        project,
        &counts,
        CREATE_HOST_COMMAND,
        MAX_CREATE_HOSTS_TOTAL,
    ));
    errs
}

/// No task may appear more than once in a build variant, counting the
/// members that task groups expand to.
pub fn validate_duplicate_bv_tasks(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for bv in &project.build_variants {
        let mut seen = HashSet::new();
        for unit in &bv.tasks {
            if let Some(tg) = project.find_task_group(&unit.name) {
                for member in &tg.tasks {
                    check_or_add_task(member, &bv.name, &mut seen, &mut errs);
                }
            } else {
                check_or_add_task(&unit.name, &bv.name, &mut seen, &mut errs);
            }
        }
    }
    errs
}

fn check_or_add_task(
    task: &str,
    variant: &str,
    seen: &mut HashSet<String>,
    errs: &mut ValidationErrors,
) {
    if !seen.insert(task.to_string()) {
        errs.error(format!(
            "task '{}' in '{}' is listed more than once, likely through a task group",
            task, variant
        ));
    }
}

/// Task generation is nooped by the service after the first call, so more
/// than one per task is a configuration error.
pub fn validate_generate_tasks(project: &Project) -> ValidationErrors {
    let counts = project.tasks_that_call_command(GENERATE_TASKS_COMMAND);
    validate_times_called_per_task(project, &counts, GENERATE_TASKS_COMMAND, 1, ValidationLevel::Error)
}

/// Referential-integrity pass: every task unit resolves to a task or task
/// group, and every distro reference is known to the catalog.
pub fn ensure_referential_integrity(
    project: &Project,
    distro_ids: &[String],
    distro_aliases: &[String],
) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    let mut all_task_names: HashSet<&str> =
        project.tasks.iter().map(|t| t.name.as_str()).collect();
    all_task_names.extend(project.task_groups.iter().map(|tg| tg.name.as_str()));

    let known_distro =
        |name: &str| distro_ids.iter().any(|d| d == name) || distro_aliases.iter().any(|d| d == name);

    for bv in &project.build_variants {
        for unit in &bv.tasks {
            if !all_task_names.contains(unit.name.as_str()) {
                if unit.name.is_empty() {
                    errs.error(format!(
                        "tasks for build variant '{}' in project '{}' must each have a name",
                        bv.name, project.identifier
                    ));
                } else {
                    errs.error(format!(
                        "build variant '{}' in project '{}' references a non-existent task '{}'",
                        bv.name, project.identifier, unit.name
                    ));
                }
            }
            for distro in &unit.distros {
                if !known_distro(distro) {
                    errs.warning(format!(
                        "task '{}' in build variant '{}' in project '{}' references a \
                         nonexistent distro '{}'",
                        unit.name, bv.name, project.identifier, distro
                    ));
                }
            }
        }
        for distro in &bv.run_on {
            if !known_distro(distro) {
                errs.warning(format!(
                    "build variant '{}' in project '{}' references a nonexistent distro '{}'",
                    bv.name, project.identifier, distro
                ));
            }
        }
    }
    errs
}
