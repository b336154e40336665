//! Tests for applying edit plans through the pipeline.

mod common;

use std::fs;

use common::{Scratch, ZipBuilder, ordered_names, snapshot_file};
use ziprepack::edit::{DeleteOp, EditPlan, MissingPatternPolicy, PatchOp, RenameOp};
use ziprepack::{ArchivePath, Error, RepackOptions, Repackager};

fn path(s: &str) -> ArchivePath {
    ArchivePath::new(s).unwrap()
}

fn app() -> ZipBuilder {
    ZipBuilder::new()
        .dir("config", 0o755)
        .file("config/app.ini", 0o640, b"debug = true\nlevel = debug\n")
        .file("config/app.ini.sample", 0o644, b"debug = false\n")
        .file("install.sh", 0o750, b"#!/bin/sh\n")
        .file("README", 0o644, b"readme")
}

fn run(scratch: &Scratch, plan: EditPlan) -> ziprepack::Result<ziprepack::RepackResult> {
    let source = app().write_to(&scratch.input(), "app.zip");
    let options = RepackOptions::new(scratch.workspace()).plan(plan);
    Repackager::new(options).run(&source, scratch.output().join("app.zip"))
}

#[test]
fn test_rename_moves_content_and_mode() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder()
        .rename("install.sh", "config/install.sh")
        .unwrap()
        .build();

    let result = run(&scratch, plan).unwrap();
    assert_eq!(result.edit.renamed, 1);

    let entries = snapshot_file(&result.destination);
    assert!(!entries.contains_key("install.sh"));
    let moved = &entries["config/install.sh"];
    assert_eq!(moved.content, b"#!/bin/sh\n");
    assert_eq!(moved.mode, 0o100750);
}

#[test]
fn test_patch_replaces_first_occurrence_only() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder()
        .patch("config/app.ini", "debug", "release")
        .unwrap()
        .build();

    let result = run(&scratch, plan).unwrap();
    assert_eq!(result.edit.patched, 1);
    assert_eq!(
        snapshot_file(&result.destination)["config/app.ini"].content,
        b"release = true\nlevel = debug\n"
    );
}

#[test]
fn test_patch_absent_pattern_leaves_file_identical() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder()
        .patch("README", "nowhere", "x")
        .unwrap()
        .build();

    let result = run(&scratch, plan).unwrap();
    assert_eq!(result.edit.patterns_missing, 1);
    assert_eq!(snapshot_file(&result.destination)["README"].content, b"readme");
}

#[test]
fn test_patch_absent_pattern_fails_when_strict() {
    let scratch = Scratch::new();
    let source = app().write_to(&scratch.input(), "app.zip");
    let destination = scratch.output().join("app.zip");
    let plan = EditPlan::builder()
        .patch("README", "nowhere", "x")
        .unwrap()
        .build();
    let options = RepackOptions::new(scratch.workspace())
        .plan(plan)
        .missing_pattern(MissingPatternPolicy::Fail);

    let err = Repackager::new(options)
        .run(&source, &destination)
        .unwrap_err();

    assert!(matches!(err, Error::PatternNotFound { ref path, .. } if path == "README"));
    assert!(!destination.exists());
    // Kept for diagnosis under the default cleanup policy.
    assert!(scratch.workspace().join("README").exists());
}

#[test]
fn test_patch_to_shorter_text_leaves_no_tail() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder()
        .patch("config/app.ini", "debug = true\nlevel = debug\n", "x")
        .unwrap()
        .build();

    let result = run(&scratch, plan).unwrap();
    assert_eq!(snapshot_file(&result.destination)["config/app.ini"].content, b"x");
}

#[test]
fn test_patch_keeps_mode() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder()
        .patch("config/app.ini", "true", "false")
        .unwrap()
        .build();

    let result = run(&scratch, plan).unwrap();
    assert_eq!(snapshot_file(&result.destination)["config/app.ini"].mode, 0o100640);
}

#[test]
fn test_delete_removes_entry() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder().delete("install.sh").unwrap().build();

    let result = run(&scratch, plan).unwrap();
    assert_eq!(result.edit.deleted, 1);
    assert!(!snapshot_file(&result.destination).contains_key("install.sh"));
}

#[test]
fn test_delete_missing_target_fails() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder().delete("absent.txt").unwrap().build();

    let err = run(&scratch, plan).unwrap_err();
    assert!(matches!(err, Error::MissingTarget { ref path } if path == "absent.txt"));
}

#[test]
fn test_rename_missing_source_fails() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder().rename("absent", "present").unwrap().build();

    let err = run(&scratch, plan).unwrap_err();
    assert!(matches!(err, Error::MissingSource { ref path } if path == "absent"));
}

#[test]
fn test_rename_onto_existing_conflicts() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder()
        .rename("config/app.ini.sample", "config/app.ini")
        .unwrap()
        .build();

    let err = run(&scratch, plan).unwrap_err();
    assert!(matches!(err, Error::DestinationConflict { .. }));
}

#[test]
fn test_delete_then_rename_swaps_in_sample() {
    let scratch = Scratch::new();
    let plan = EditPlan::builder()
        .delete("config/app.ini")
        .unwrap()
        .rename("config/app.ini.sample", "config/app.ini")
        .unwrap()
        .build();

    let result = run(&scratch, plan).unwrap();
    let entries = snapshot_file(&result.destination);
    assert_eq!(entries["config/app.ini"].content, b"debug = false\n");
    assert!(!entries.contains_key("config/app.ini.sample"));
}

#[test]
fn test_from_phases_runs_renames_before_patches_before_deletes() {
    let scratch = Scratch::new();
    let plan = EditPlan::from_phases(
        vec![RenameOp {
            from: path("README"),
            to: path("README.md"),
        }],
        vec![PatchOp {
            path: path("README.md"),
            search: "readme".into(),
            replace: "# Readme".into(),
        }],
        vec![DeleteOp {
            path: path("install.sh"),
        }],
    );

    let result = run(&scratch, plan).unwrap();
    assert_eq!(result.edit.changes(), 3);
    assert_eq!(
        ordered_names(&result.destination),
        vec![
            "README.md",
            "config/",
            "config/app.ini",
            "config/app.ini.sample",
        ]
    );
    assert_eq!(
        snapshot_file(&result.destination)["README.md"].content,
        b"# Readme"
    );
}

#[test]
fn test_plan_loaded_from_json_file() {
    let scratch = Scratch::new();
    let plan_path = scratch.dir.path().join("plan.json");
    fs::write(
        &plan_path,
        r#"{"operations": [
            {"op": "delete", "path": "install.sh"},
            {"op": "patch", "path": "README", "search": "readme", "replace": "README"}
        ]}"#,
    )
    .unwrap();

    let plan = EditPlan::from_json_path(&plan_path).unwrap();
    let result = run(&scratch, plan).unwrap();

    let entries = snapshot_file(&result.destination);
    assert!(!entries.contains_key("install.sh"));
    assert_eq!(entries["README"].content, b"README");
}

#[test]
fn test_unreadable_json_plan() {
    let scratch = Scratch::new();
    let err = EditPlan::from_json_path(scratch.dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
