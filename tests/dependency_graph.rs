//! Integration tests for dependency-graph validation: cycles, unresolved
//! references, duplicate and sentinel dependency specs.

mod helpers;

use helpers::*;
use validator::model::{ALL_DEPENDENCIES, ALL_VARIANTS, TASK_FAILED};

#[test]
fn cycle_between_two_tasks_is_reported() {
    let mut project = baseline_project();
    // close the loop: a depends on b while b already depends on a
    project.tasks[0].depends_on = vec![dep("b")];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["'a'", "'b'", "cycle"]);
}

#[test]
fn self_dependency_is_reported_as_cycle() {
    let mut project = baseline_project();
    project.tasks[0].depends_on = vec![dep("a")];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["dependency error for task 'a'", "cycle"]);
}

#[test]
fn three_task_cycle_is_reported() {
    let mut project = baseline_project();
    project.tasks.push(task_depending_on("c", "b"));
    project.build_variants[0].tasks.push(unit("c"));
    project.tasks[0].depends_on = vec![dep("c")];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["'a'", "'b'", "'c'", "cycle"]);
}

#[test]
fn dependency_on_undefined_pair_is_reported() {
    let mut project = baseline_project();
    // 'a' exists as a task but only runs on v1; the dependency names v2
    project.tasks[1].depends_on = vec![validator::model::types::TaskUnitDependency {
        name: "a".into(),
        variant: "v2".into(),
        ..Default::default()
    }];
    let errs = check_syntax(&project);
    assert_error_containing(
        &errs,
        &["dependency error for task 'b'", "'a'", "'v2'", "not present"],
    );
}

#[test]
fn unknown_dependency_name_is_reported() {
    let mut project = baseline_project();
    project.tasks[1].depends_on = vec![dep("ghost")];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["non-existent task name 'ghost'", "task 'b'"]);
}

#[test]
fn duplicate_dependency_is_reported() {
    let mut project = baseline_project();
    project.tasks[1].depends_on = vec![dep("a"), dep("a")];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["duplicate dependency 'a'", "task 'b'"]);
}

#[test]
fn invalid_dependency_status_is_reported() {
    let mut project = baseline_project();
    project.tasks[1].depends_on[0].status = "flaky".into();
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["invalid dependency status", "'flaky'", "task 'b'"]);
}

#[test]
fn recognized_dependency_statuses_pass() {
    for status in ["", "success", TASK_FAILED, "*"] {
        let mut project = baseline_project();
        project.tasks[1].depends_on[0].status = status.into();
        assert_clean(&check_syntax(&project));
    }
}

#[test]
fn all_dependencies_sentinel_must_be_sole_dependency() {
    let mut project = baseline_project();
    project.tasks.push(task("c"));
    project.build_variants[0].tasks.push(unit("c"));
    project.tasks[1].depends_on = vec![
        dep("c"),
        validator::model::types::TaskUnitDependency {
            name: ALL_DEPENDENCIES.into(),
            ..Default::default()
        },
    ];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["task 'b'", "all-dependencies"]);
}

#[test]
fn all_dependencies_with_distinct_variants_passes() {
    let mut project = baseline_project();
    project.build_variants.push(variant("v2", &["a", "b"]));
    // a single '*' dependency per distinct variant is allowed
    project.tasks[1].depends_on = vec![validator::model::types::TaskUnitDependency {
        name: ALL_DEPENDENCIES.into(),
        variant: "v2".into(),
        ..Default::default()
    }];
    assert_clean(&check_syntax(&project));
}

#[test]
fn all_variants_dependency_spans_variants() {
    let mut project = baseline_project();
    project.build_variants.push(variant("v2", &["a", "b"]));
    project.tasks[1].depends_on = vec![validator::model::types::TaskUnitDependency {
        name: "a".into(),
        variant: ALL_VARIANTS.into(),
        ..Default::default()
    }];
    assert_clean(&check_syntax(&project));
}

#[test]
fn requirement_on_missing_task_is_reported() {
    let mut project = baseline_project();
    project.tasks[1].requires = vec![validator::model::types::TaskUnitRequirement {
        name: "ghost".into(),
        variant: String::new(),
    }];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["task 'b'", "non-existent task 'ghost'"]);
}

#[test]
fn requirement_on_task_missing_from_variant_is_reported() {
    let mut project = baseline_project();
    project.tasks.push(task("c"));
    project.build_variants.push(variant("v2", &["c"]));
    // b requires c, but c only runs on v2 while b runs on v1
    project.tasks[1].requires = vec![validator::model::types::TaskUnitRequirement {
        name: "c".into(),
        variant: String::new(),
    }];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["task 'b'", "requires task 'c'", "'v1'"]);
}

#[test]
fn requirement_star_selector_is_unsupported() {
    let mut project = baseline_project();
    project.tasks[1].requires = vec![validator::model::types::TaskUnitRequirement {
        name: ALL_DEPENDENCIES.into(),
        variant: String::new(),
    }];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["'*' is not supported for requirement selectors"]);
}

#[test]
fn requirement_on_unknown_variant_is_reported() {
    let mut project = baseline_project();
    project.tasks[1].requires = vec![validator::model::types::TaskUnitRequirement {
        name: "a".into(),
        variant: "v9".into(),
    }];
    let errs = check_syntax(&project);
    assert_error_containing(&errs, &["task 'b'", "non-existent variant 'v9'"]);
}

#[test]
fn requirement_satisfied_through_task_group_membership() {
    let mut project = baseline_project();
    project.tasks.push(task("c"));
    project.task_groups.push(validator::model::types::TaskGroup {
        name: "group-c".into(),
        tasks: vec!["c".into()],
        ..Default::default()
    });
    project.build_variants[0].tasks.push(unit("group-c"));
    project.tasks[1].requires = vec![validator::model::types::TaskUnitRequirement {
        name: "c".into(),
        variant: String::new(),
    }];
    assert_clean(&check_syntax(&project));
}
