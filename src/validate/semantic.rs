//! Semantic battery: sanity and best-practice checks. Everything here is
//! warning-level; the configuration still runs, just probably not the way
//! its author expects.

use std::collections::BTreeMap;

use crate::error::ValidationErrors;
use crate::model::types::Project;

/// A task with no commands runs and immediately succeeds, which is rarely
/// what anyone wants.
pub fn check_task_commands(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    for task in &project.tasks {
        if task.commands.is_empty() {
            errs.warning(format!(
                "task '{}' in project '{}' does not contain any commands",
                task.name, project.identifier
            ));
        }
    }
    errs
}

/// Task group hosting heuristics: a host cap below one or above half the
/// member count defeats the point of grouping, and members with their own
/// dependencies can be scheduled out of order.
pub fn check_task_groups(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    let mut tasks_in_groups: BTreeMap<&str, &str> = BTreeMap::new();

    for tg in &project.task_groups {
        if tg.max_hosts < 1 {
            errs.warning(format!(
                "task group '{}' has number of hosts {} less than 1",
                tg.name, tg.max_hosts
            ));
        }
        if tg.tasks.len() == 1 {
            continue;
        }
        if tg.max_hosts > (tg.tasks.len() / 2) as i64 {
            errs.warning(format!(
                "task group '{}' has max number of hosts {} greater than half the number of \
                 tasks {}",
                tg.name,
                tg.max_hosts,
                tg.tasks.len()
            ));
        }
        for member in &tg.tasks {
            tasks_in_groups.insert(member.as_str(), tg.name.as_str());
        }
    }

    for (member, group) in tasks_in_groups {
        let spec = project.get_spec_for_task(member);
        if spec.depends_on.is_empty() {
            continue;
        }
        let dependencies: Vec<&str> = spec.depends_on.iter().map(|d| d.name.as_str()).collect();
        errs.warning(format!(
            "task '{}' in task group '{}' has a dependency on another task ({}), which can \
             cause task group tasks to be scheduled out of order",
            member,
            group,
            dependencies.join(", ")
        ));
    }
    errs
}

/// Logger blocks have to name known logger types with the fields those
/// types need; broken ones fall back to the default logger at runtime.
pub fn check_logger_config(project: &Project) -> ValidationErrors {
    let mut errs = ValidationErrors::new();
    let Some(loggers) = &project.loggers else {
        return errs;
    };
    if let Err(err) = loggers.is_valid() {
        errs.warning(format!("error in project-level logger config: {}", err));
    }
    for task in &project.tasks {
        for command in &task.commands {
            if let Some(cmd_loggers) = &command.loggers {
                if let Err(err) = cmd_loggers.is_valid() {
                    errs.warning(format!(
                        "error in logger config for command '{}' in task '{}': {}",
                        command.display_name, task.name, err
                    ));
                }
            }
        }
    }
    errs
}
