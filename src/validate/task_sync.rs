//! Cross-task data-transfer contract between `s3.push` and `s3.pull`.
//!
//! A task pulling another task's output can only be scheduled correctly
//! when the push task exists, actually pushes, and is guaranteed to have
//! run and succeeded first in every runtime mode the pulling task runs
//! in. The last part is a reachability search through the dependency
//! graph under the pulling task's mode requirements.

use std::collections::BTreeMap;

use crate::error::ValidationErrors;
use crate::model::graph::{DependencyGraph, TVPair};
use crate::model::types::{PluginCommand, Project, StringParam};
use crate::model::{S3_PULL_COMMAND, S3_PUSH_COMMAND};
use crate::validate::syntax::validate_times_called_per_task;

/// Validates the project's task sync commands: `s3.push` at most once per
/// task, and every `s3.pull` referring to a reachable pushing task.
/// Whether the project settings allow task sync at all is checked by the
/// settings battery.
pub fn validate_task_sync_commands(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();

    let push_counts = project.tasks_that_call_command(S3_PUSH_COMMAND);
    errs.extend(validate_times_called_per_task(
        project,
        &push_counts,
        S3_PUSH_COMMAND,
        1,
        crate::error::ValidationLevel::Warning,
    ));

    let (pull_sites, map_errs) = bvs_with_tasks_that_call_command(project, S3_PULL_COMMAND);
    if !map_errs.is_empty() {
        errs.error(format!(
            "could not map build variants to tasks that call command '{}': {}",
            S3_PULL_COMMAND,
            map_errs.join("; ")
        ));
    }

    let graph = DependencyGraph::build(project);
    for (bv, task_cmds) in &pull_sites {
        for (task, cmds) in task_cmds {
            for cmd in cmds {
                let (push_task, push_bv) = match parse_s3_pull_parameters(cmd) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        errs.error(format!(
                            "could not parse parameters for command '{}': {}",
                            cmd.command, err
                        ));
                        continue;
                    }
                };

                // absent build variant parameter: the push ran on the same
                // variant as the pull
                let push_bv = push_bv.unwrap_or_else(|| bv.clone());

                let source = TVPair::new(bv.clone(), task.clone());
                let target = TVPair::new(push_bv, push_task);

                if let Err(err) = graph.depends_on(&source, &target) {
                    errs.error(format!(
                        "problem validating that task running command '{}' depends on task \
                         running command '{}': {}",
                        S3_PULL_COMMAND, S3_PUSH_COMMAND, err
                    ));
                }

                match project.commands_run_on_tv(&target, S3_PUSH_COMMAND) {
                    Err(err) => errs.error(format!(
                        "problem verifying that task '{}' runs command '{}': {}",
                        target.task_name, S3_PUSH_COMMAND, err
                    )),
                    Ok(push_cmds) if push_cmds.is_empty() => errs.error(format!(
                        "task '{}' in build variant '{}' does not run command '{}'",
                        target.task_name, target.variant, S3_PUSH_COMMAND
                    )),
                    Ok(_) => {}
                }
            }
        }
    }

    errs
}

/// Maps build variants to tasks that run the given command on that
/// variant, with the full per-task command list: project pre/post for
/// plain tasks, group setup/teardown for group members, plus the task's
/// own commands, all variant-filtered.
///
/// Lookup failures along the way are collected as messages rather than
/// aborting the walk.
pub fn bvs_with_tasks_that_call_command<'a>(
    project: &'a Project,
    command_name: &str,
) -> (
    BTreeMap<String, BTreeMap<String, Vec<&'a PluginCommand>>>,
    Vec<String>,
) {
    let mut sites: BTreeMap<String, BTreeMap<String, Vec<&'a PluginCommand>>> = BTreeMap::new();
    let mut problems = Vec::new();

    for bv in &project.build_variants {
        let mut pre_and_post = Vec::new();
        if let Some(pre) = &project.pre {
            pre_and_post.extend(project.commands_run_on_bv(pre, command_name, &bv.name));
        }
        if let Some(post) = &project.post {
            pre_and_post.extend(project.commands_run_on_bv(post, command_name, &bv.name));
        }

        for unit in &bv.tasks {
            if unit.is_group || project.find_task_group(&unit.name).is_some() {
                let Some(tg) = project.find_task_group(&unit.name) else {
                    problems.push(format!(
                        "cannot find definition of task group '{}' used in build variant '{}'",
                        unit.name, bv.name
                    ));
                    continue;
                };
                // every setup/teardown command that applies on this build
                // variant runs for each member task
                let mut lifecycle = Vec::new();
                for cmds in [&tg.setup_group, &tg.setup_task, &tg.teardown_group, &tg.teardown_task]
                    .into_iter()
                    .flatten()
                {
                    lifecycle.extend(project.commands_run_on_bv(cmds, command_name, &bv.name));
                }

                let mut group_unit = unit.clone();
                group_unit.variant = bv.name.clone();
                for member in project.tasks_from_group(&group_unit) {
                    add_cmds_for_task(&mut sites, &bv.name, &member.name, &lifecycle);
                    match project.find_project_task(&member.name) {
                        Some(task) => {
                            let own =
                                project.commands_run_on_bv(&task.commands, command_name, &bv.name);
                            add_cmds_for_task(&mut sites, &bv.name, &member.name, &own);
                        }
                        None => problems.push(format!(
                            "cannot find definition of task '{}' used in task group '{}'",
                            member.name, tg.name
                        )),
                    }
                }
            } else {
                add_cmds_for_task(&mut sites, &bv.name, &unit.name, &pre_and_post);
                let Some(task) = project.find_project_task(&unit.name) else {
                    problems.push(format!("cannot find definition of task '{}'", unit.name));
                    continue;
                };
                let own = project.commands_run_on_bv(&task.commands, command_name, &bv.name);
                add_cmds_for_task(&mut sites, &bv.name, &unit.name, &own);
            }
        }
    }

    (sites, problems)
}

fn add_cmds_for_task<'a>(
    sites: &mut BTreeMap<String, BTreeMap<String, Vec<&'a PluginCommand>>>,
    bv: &str,
    task: &str,
    cmds: &[&'a PluginCommand],
) {
    if cmds.is_empty() {
        return;
    }
    sites
        .entry(bv.to_string())
        .or_default()
        .entry(task.to_string())
        .or_default()
        .extend(cmds.iter().copied());
}

/// Extracts the push-task reference from an `s3.pull` invocation: the
/// required string parameter `task` and the optional string parameter
/// `from_build_variant`.
pub fn parse_s3_pull_parameters(cmd: &PluginCommand) -> Result<(String, Option<String>), String> {
    if cmd.params.is_empty() {
        return Err(format!("command '{}' has no parameters", cmd.command));
    }
    let task = match cmd.string_param("task") {
        StringParam::Value(task) => task.to_string(),
        StringParam::Absent => {
            return Err(format!(
                "command '{}' needs parameter 'task' defined",
                cmd.command
            ))
        }
        StringParam::NotAString => {
            return Err(format!(
                "command '{}' was supplied parameter 'task' but it is not a string",
                cmd.command
            ))
        }
    };
    let from_bv = match cmd.string_param("from_build_variant") {
        StringParam::Value(bv) => Some(bv.to_string()),
        StringParam::Absent => None,
        StringParam::NotAString => {
            return Err(format!(
                "command '{}' was supplied parameter 'from_build_variant' but it is not a string",
                cmd.command
            ))
        }
    };
    Ok((task, from_bv))
}
