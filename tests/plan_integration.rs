//! Integration tests for splice plans: loading, validation, application

use byte_splice::config::{
    apply_plan, check_plan, load_from_path, load_from_str, ApplicationError, ConfigError,
    Operation, PlanResult, Verify,
};
use byte_splice::SpliceApplyError;
use std::error::Error;
use std::fs;
use tempfile::TempDir;
use xxhash_rust::xxh3::xxh3_64;

/// Temp dir with two data files
fn setup_plan_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("records.bin"), b"ABCDEFGHIJ").unwrap();
    fs::write(dir.path().join("index.bin"), [0u8, 1, 2, 3, 4, 5]).unwrap();
    dir
}

#[test]
fn test_load_plan_basic() {
    let toml = r#"
[meta]
name = "resize-records"
description = "shrink the header record"
base_relative = true

[[splices]]
id = "shrink"
file = "records.bin"
offset = 2

[splices.operation]
type = "update"
count = 3
text = "12"

[splices.verify]
method = "exact_match"
expected_text = "CDE"

[[splices]]
id = "pad-index"
file = "index.bin"
offset = 6

[splices.operation]
type = "insert"
bytes = [255, 254]
"#;

    let config = load_from_str(toml).expect("Failed to parse plan");

    assert_eq!(config.meta.name, "resize-records");
    assert!(config.meta.base_relative);
    assert_eq!(config.splices.len(), 2);
    assert!(matches!(
        config.splices[0].operation,
        Operation::Update { count: 3, .. }
    ));
    assert!(matches!(
        config.splices[0].verify,
        Some(Verify::ExactMatch { .. })
    ));
    assert_eq!(config.splices[1].operation.payload(), vec![255, 254]);
}

#[test]
fn test_validation_collects_issues() {
    let toml = r#"
[[splices]]
id = "both-payloads"
file = "records.bin"
offset = 0

[splices.operation]
type = "update"
count = 1
text = "a"
bytes = [1]

[[splices]]
id = ""
file = ""
offset = 0

[splices.operation]
type = "insert"
text = ""
"#;

    let err = load_from_str(toml).unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, ConfigError::Validation { .. }));
    assert!(message.contains("only one of 'text' or 'bytes'"));
    assert!(message.contains("missing required field 'id'"));
    assert!(message.contains("insert requires non-empty data"));
}

#[test]
fn test_empty_plan_is_rejected() {
    let err = load_from_str("[meta]\nname = \"nothing\"\n").unwrap_err();
    assert!(err.to_string().contains("no splices"));
}

#[test]
fn test_apply_plan_multiple_files() {
    let dir = setup_plan_dir();
    let hash = format!("{:#x}", xxh3_64(b"HIJ"));
    let plan_path = dir.path().join("plan.toml");
    fs::write(
        &plan_path,
        format!(
            r#"
[meta]
name = "multi"
base_relative = true

[[splices]]
id = "shrink"
file = "records.bin"
offset = 2

[splices.operation]
type = "update"
count = 3
text = "12"

[[splices]]
id = "tail"
file = "records.bin"
offset = 7

[splices.operation]
type = "delete"
count = 3

[splices.verify]
method = "hash"
algorithm = "xxh3"
expected = "{hash}"

[[splices]]
id = "index-head"
file = "index.bin"
offset = 0

[splices.operation]
type = "insert"
bytes = [9, 9]
"#
        ),
    )
    .unwrap();

    let config = load_from_path(&plan_path).unwrap();
    let results = apply_plan(&config, dir.path());

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, "shrink");
    assert!(matches!(
        results[0].1,
        Ok(PlanResult::Applied {
            length_delta: -1,
            ..
        })
    ));
    assert!(matches!(
        results[1].1,
        Ok(PlanResult::Applied {
            length_delta: -3,
            ..
        })
    ));
    assert!(matches!(
        results[2].1,
        Ok(PlanResult::Applied {
            length_delta: 2,
            ..
        })
    ));

    assert_eq!(fs::read(dir.path().join("records.bin")).unwrap(), b"AB12FG");
    assert_eq!(
        fs::read(dir.path().join("index.bin")).unwrap(),
        vec![9, 9, 0, 1, 2, 3, 4, 5]
    );
}

#[test]
fn test_reapply_verified_plan_is_idempotent() {
    let dir = setup_plan_dir();
    let toml = r#"
[meta]
base_relative = true

[[splices]]
id = "grow"
file = "records.bin"
offset = 2

[splices.operation]
type = "update"
count = 2
text = "WXYZ"

[splices.verify]
method = "exact_match"
expected_text = "CD"
"#;
    let config = load_from_str(toml).unwrap();

    let first = apply_plan(&config, dir.path());
    assert!(matches!(first[0].1, Ok(PlanResult::Applied { .. })));

    let second = apply_plan(&config, dir.path());
    assert!(matches!(second[0].1, Ok(PlanResult::AlreadyApplied { .. })));

    assert_eq!(
        fs::read(dir.path().join("records.bin")).unwrap(),
        b"ABWXYZEFGHIJ"
    );
}

#[test]
fn test_check_plan_does_not_write() {
    let dir = setup_plan_dir();
    let toml = r#"
[meta]
base_relative = true

[[splices]]
id = "drop-head"
file = "records.bin"
offset = 0

[splices.operation]
type = "delete"
count = 4
"#;
    let config = load_from_str(toml).unwrap();
    let results = check_plan(&config, dir.path());

    assert!(matches!(
        results[0].1,
        Ok(PlanResult::Applied {
            length_delta: -4,
            ..
        })
    ));
    assert_eq!(fs::read(dir.path().join("records.bin")).unwrap(), b"ABCDEFGHIJ");
}

#[test]
fn test_failed_batch_leaves_file_untouched() {
    let dir = setup_plan_dir();
    let toml = r#"
[meta]
base_relative = true

[[splices]]
id = "ok"
file = "records.bin"
offset = 0

[splices.operation]
type = "delete"
count = 1

[[splices]]
id = "mismatch"
file = "records.bin"
offset = 5

[splices.operation]
type = "update"
count = 2
text = "zz"

[splices.verify]
method = "exact_match"
expected_text = "nope"

[[splices]]
id = "other-file"
file = "index.bin"
offset = 0

[splices.operation]
type = "delete"
count = 2
"#;
    let config = load_from_str(toml).unwrap();
    let results = apply_plan(&config, dir.path());

    assert!(matches!(results[0].1, Err(ApplicationError::Batch { .. })));
    assert!(matches!(results[2].1, Ok(PlanResult::Applied { .. })));

    // Both splices of the failed target carry the typed cause.
    let Err(err) = &results[1].1 else {
        panic!("mismatched splice should fail");
    };
    assert!(matches!(
        err,
        ApplicationError::Batch { source, .. }
            if matches!(**source, SpliceApplyError::BeforeContentMismatch { offset: 5, .. })
    ));
    let cause = err.source().expect("batch error has a source");
    assert!(cause.to_string().contains("verification failed"));

    assert_eq!(fs::read(dir.path().join("records.bin")).unwrap(), b"ABCDEFGHIJ");
    assert_eq!(
        fs::read(dir.path().join("index.bin")).unwrap(),
        vec![2, 3, 4, 5]
    );
}

#[test]
fn test_target_outside_base_is_refused() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("plans");
    fs::create_dir(&base).unwrap();
    fs::write(dir.path().join("secret.bin"), b"keep me").unwrap();

    let toml = r#"
[meta]
base_relative = true

[[splices]]
id = "escape"
file = "../secret.bin"
offset = 0

[splices.operation]
type = "delete"
count = 4
"#;
    let config = load_from_str(toml).unwrap();
    let results = apply_plan(&config, &base);

    assert!(matches!(results[0].1, Err(ApplicationError::Safety { .. })));
    let Err(err) = &results[0].1 else {
        panic!("escaping target should fail");
    };
    assert!(err
        .source()
        .is_some_and(|cause| cause.to_string().contains("outside root")));
    assert_eq!(fs::read(dir.path().join("secret.bin")).unwrap(), b"keep me");
}
