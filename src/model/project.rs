//! Lookup and expansion helpers over the parsed project model.
//!
//! Everything here is read-only: the validator never mutates the project,
//! it only derives views of it (expanded task units, command subsets,
//! call counts).

use std::collections::BTreeMap;

use crate::model::graph::TVPair;
use crate::model::types::*;

impl Project {
    pub fn find_project_task(&self, name: &str) -> Option<&ProjectTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn find_build_variant(&self, name: &str) -> Option<&BuildVariant> {
        self.build_variants.iter().find(|bv| bv.name == name)
    }

    pub fn find_task_group(&self, name: &str) -> Option<&TaskGroup> {
        self.task_groups.iter().find(|tg| tg.name == name)
    }

    /// Names of the build variants that run the given task, directly or
    /// through a task group.
    pub fn find_variants_with_task(&self, name: &str) -> Vec<String> {
        let mut variants = Vec::new();
        for bv in &self.build_variants {
            let has = bv.tasks.iter().any(|unit| {
                unit.name == name
                    || self
                        .find_task_group(&unit.name)
                        .is_some_and(|tg| tg.tasks.iter().any(|t| t == name))
            });
            if has {
                variants.push(bv.name.clone());
            }
        }
        variants
    }

    /// The task-level spec for a task, expressed as a task unit. Unknown
    /// names yield an empty spec.
    pub fn get_spec_for_task(&self, name: &str) -> BuildVariantTaskUnit {
        match self.find_project_task(name) {
            Some(task) => BuildVariantTaskUnit {
                name: task.name.clone(),
                depends_on: task.depends_on.clone(),
                requires: task.requires.clone(),
                patchable: task.patchable,
                patch_only: task.patch_only,
                git_tag_only: task.git_tag_only,
                ..Default::default()
            },
            None => BuildVariantTaskUnit::default(),
        }
    }

    /// Expands a task-group unit into one unit per member, each inheriting
    /// the group unit's overrides and then populated from the member's
    /// task spec. Returns an empty list when the group is undefined.
    pub fn tasks_from_group(&self, unit: &BuildVariantTaskUnit) -> Vec<BuildVariantTaskUnit> {
        let Some(group) = self.find_task_group(&unit.name) else {
            return Vec::new();
        };
        group
            .tasks
            .iter()
            .map(|member| {
                let mut task_unit = BuildVariantTaskUnit {
                    name: member.clone(),
                    is_group: false,
                    variant: unit.variant.clone(),
                    distros: unit.distros.clone(),
                    depends_on: unit.depends_on.clone(),
                    requires: unit.requires.clone(),
                    patchable: unit.patchable,
                    patch_only: unit.patch_only,
                    git_tag_only: unit.git_tag_only,
                };
                task_unit.populate(&self.get_spec_for_task(member));
                task_unit
            })
            .collect()
    }

    /// Every task unit across all build variants, with task groups
    /// expanded, specs populated and the variant pinned.
    pub fn find_all_build_variant_tasks(&self) -> Vec<BuildVariantTaskUnit> {
        let mut units = Vec::new();
        for bv in &self.build_variants {
            for unit in &bv.tasks {
                let mut unit = unit.clone();
                unit.variant = bv.name.clone();
                if self.find_task_group(&unit.name).is_some() {
                    units.extend(self.tasks_from_group(&unit));
                } else {
                    unit.populate(&self.get_spec_for_task(&unit.name));
                    units.push(unit);
                }
            }
        }
        units
    }

    /// Per-task invocation counts of the given command across the tasks'
    /// own command lists, with function references resolved one level deep.
    pub fn tasks_that_call_command(&self, name: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for task in &self.tasks {
            let mut count = 0;
            for cmd in &task.commands {
                if !cmd.function.is_empty() {
                    if let Some(body) = self.functions.get(&cmd.function) {
                        count += body.iter().filter(|c| c.command == name).count();
                    }
                } else if cmd.command == name {
                    count += 1;
                }
            }
            if count > 0 {
                counts.insert(task.name.clone(), count);
            }
        }
        counts
    }

    /// Filters a command list down to invocations of `name` that run on
    /// the given build variant, resolving function references through the
    /// project's function map.
    pub fn commands_run_on_bv<'a>(
        &'a self,
        cmds: &'a [PluginCommand],
        name: &str,
        bv: &str,
    ) -> Vec<&'a PluginCommand> {
        let mut matching = Vec::new();
        for cmd in cmds {
            if !cmd.function.is_empty() {
                let Some(body) = self.functions.get(&cmd.function) else {
                    continue;
                };
                for inner in body {
                    if inner.command == name && inner.runs_on_variant(bv) {
                        matching.push(inner);
                    }
                }
            } else if cmd.command == name && cmd.runs_on_variant(bv) {
                matching.push(cmd);
            }
        }
        matching
    }

    /// Invocations of `name` in the commands of the task identified by the
    /// task × variant pair, after variant filtering.
    pub fn commands_run_on_tv(
        &self,
        tv: &TVPair,
        name: &str,
    ) -> Result<Vec<&PluginCommand>, String> {
        let Some(task) = self.find_project_task(&tv.task_name) else {
            return Err(format!("definition of task '{}' not found", tv.task_name));
        };
        Ok(self.commands_run_on_bv(&task.commands, name, &tv.variant))
    }
}

impl BuildVariantTaskUnit {
    /// Overlays the task-level spec onto this unit: fields the unit did
    /// not override are taken from the spec.
    pub fn populate(&mut self, spec: &BuildVariantTaskUnit) {
        if self.depends_on.is_empty() {
            self.depends_on = spec.depends_on.clone();
        }
        if self.requires.is_empty() {
            self.requires = spec.requires.clone();
        }
        if self.distros.is_empty() {
            self.distros = spec.distros.clone();
        }
        if self.patchable.is_none() {
            self.patchable = spec.patchable;
        }
        if self.patch_only.is_none() {
            self.patch_only = spec.patch_only;
        }
        if self.git_tag_only.is_none() {
            self.git_tag_only = spec.git_tag_only;
        }
    }

    /// Whether this unit is excluded from patch builds.
    pub fn skip_on_patch_build(&self) -> bool {
        self.patchable == Some(false) || self.git_tag_only == Some(true)
    }

    /// Whether this unit is excluded from mainline (non-patch) builds.
    pub fn skip_on_non_patch_build(&self) -> bool {
        self.patch_only == Some(true)
    }

    /// Whether this unit runs only in git-tag builds.
    pub fn skip_on_non_git_tag_build(&self) -> bool {
        self.git_tag_only == Some(true)
    }
}
