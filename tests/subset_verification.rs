use std::fs;
use std::path::Path;

use serde_json::{Value, json};
use tempfile::tempdir;

use subsets::constants::dataset::MANIFEST_FILENAME;
use subsets::{
    CheckStatus, DataRecord, SampleOrder, SamplingSpec, SubsetConfig, SubsetError, VerifyConfig,
    create_subset, verify_subset, write_dataset,
};

fn build_record(idx: usize) -> DataRecord {
    DataRecord::from_json_line(
        &json!({
            "id": idx,
            "translation": {"de": format!("satz {idx}"), "en": format!("sentence {idx}")},
            "input_ids": [idx, idx + 1, idx + 2, idx + 3, idx + 4, idx + 5],
        })
        .to_string(),
    )
    .unwrap()
}

fn build_subset(root: &Path, rows: usize, fraction: f64) -> (std::path::PathBuf, std::path::PathBuf) {
    let original = root.join("original");
    let subset = root.join("subset");
    let records: Vec<DataRecord> = (0..rows).map(build_record).collect();
    write_dataset(&original, &records, 50).unwrap();
    let config = SubsetConfig::new(&original, &subset, SamplingSpec::fraction(fraction, 42).unwrap());
    create_subset(&config).unwrap();
    (original, subset)
}

fn only_shard(root: &Path) -> std::path::PathBuf {
    let shards: Vec<_> = fs::read_dir(root)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    assert_eq!(shards.len(), 1);
    shards.into_iter().next().unwrap()
}

#[test]
fn genuine_subset_passes_every_check() {
    let temp = tempdir().unwrap();
    let (original, subset) = build_subset(temp.path(), 300, 0.1);

    let report = verify_subset(&VerifyConfig::new(&original, &subset)).unwrap();
    assert!(report.passed(), "{}", report.render());
    for name in ["load", "size", "schema", "membership", "reproducibility", "integrity"] {
        assert_eq!(
            report.check(name).map(|check| check.status),
            Some(CheckStatus::Pass),
            "check {name} should pass"
        );
    }
    assert_eq!(report.original_rows, Some(300));
    assert_eq!(report.subset_rows, Some(30));
    assert_eq!(report.samples.len(), 3);
    assert!(report.ensure_passed().is_ok());
}

#[test]
fn injected_foreign_record_fails_with_mismatch() {
    let temp = tempdir().unwrap();
    let (original, subset) = build_subset(temp.path(), 200, 0.05);

    let shard = only_shard(&subset);
    let body = fs::read_to_string(&shard).unwrap();
    let mut lines: Vec<String> = body.lines().map(str::to_string).collect();
    lines[3] = build_record(10_000).to_json_line().unwrap();
    fs::write(&shard, format!("{}\n", lines.join("\n"))).unwrap();

    let report = verify_subset(&VerifyConfig::new(&original, &subset)).unwrap();
    assert!(!report.passed());
    let membership = report.check("membership").unwrap();
    assert_eq!(membership.status, CheckStatus::Fail);
    assert!(membership.details[0].contains("1 of 10"), "{:?}", membership.details);
    assert!(membership.details[0].contains("rows: 3"));
    assert_eq!(
        report.check("reproducibility").map(|check| check.status),
        Some(CheckStatus::Fail)
    );

    match report.ensure_passed() {
        Err(SubsetError::VerificationMismatch { failures }) => {
            assert!(failures.iter().any(|failure| failure.starts_with("membership")));
        }
        other => panic!("expected a verification mismatch, got {other:?}"),
    }
}

#[test]
fn subset_checked_against_the_wrong_original_fails_size() {
    let temp = tempdir().unwrap();
    let (_, subset) = build_subset(temp.path(), 100, 0.2);
    let other = temp.path().join("other");
    let records: Vec<DataRecord> = (0..150).map(build_record).collect();
    write_dataset(&other, &records, 50).unwrap();

    let report = verify_subset(&VerifyConfig::new(&other, &subset)).unwrap();
    assert_eq!(report.check("size").unwrap().status, CheckStatus::Fail);
    assert_eq!(
        report.check("reproducibility").unwrap().status,
        CheckStatus::Warn
    );
    assert!(!report.passed());
}

#[test]
fn missing_dataset_is_reported_before_loading() {
    let temp = tempdir().unwrap();
    let (original, _) = build_subset(temp.path(), 20, 0.5);

    let err = verify_subset(&VerifyConfig::new(&original, temp.path().join("nope"))).unwrap_err();
    assert!(matches!(err, SubsetError::DatasetNotFound { .. }));
    let err = verify_subset(&VerifyConfig::new(temp.path().join("nope"), &original)).unwrap_err();
    assert!(matches!(err, SubsetError::DatasetNotFound { .. }));
}

#[test]
fn sample_display_truncates_token_lists() {
    let temp = tempdir().unwrap();
    let (original, subset) = build_subset(temp.path(), 40, 0.25);

    let config = VerifyConfig {
        samples: 2,
        sample_order: SampleOrder::Random { seed: 3 },
        ..VerifyConfig::new(&original, &subset)
    };
    let report = verify_subset(&config).unwrap();
    assert_eq!(report.samples.len(), 2);
    for sample in &report.samples {
        assert!(sample.lines.iter().any(|line| line == "input_ids: list of length 6"));
        assert!(sample.lines.iter().any(|line| line.ends_with(", ...]")));
        assert!(sample.lines.iter().any(|line| line.starts_with("translation: {")));
    }
}

fn rewrite_provenance(subset: &Path, edit: impl FnOnce(&mut Value)) {
    let path = subset.join(MANIFEST_FILENAME);
    let mut manifest: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    edit(&mut manifest["subset"]);
    fs::write(&path, serde_json::to_vec_pretty(&manifest).unwrap()).unwrap();
}

#[test]
fn optional_and_nullable_fields_do_not_fail_a_genuine_subset() {
    let temp = tempdir().unwrap();
    let original = temp.path().join("original");
    let subset = temp.path().join("subset");
    let records: Vec<DataRecord> = (0..100)
        .map(|idx| {
            let score = if idx % 3 == 0 {
                Value::Null
            } else {
                json!(idx as f64 / 10.0)
            };
            let mut row = json!({"id": idx, "score": score});
            if idx == 0 {
                row["note"] = json!("only the first row has a note");
            }
            DataRecord::from_json_line(&row.to_string()).unwrap()
        })
        .collect();
    write_dataset(&original, &records, 40).unwrap();

    let seed = (0..)
        .find(|seed| {
            !SamplingSpec::size(5, *seed)
                .unwrap()
                .select_indices(100)
                .unwrap()
                .contains(&0)
        })
        .unwrap();
    let config = SubsetConfig::new(&original, &subset, SamplingSpec::size(5, seed).unwrap());
    create_subset(&config).unwrap();

    let report = verify_subset(&VerifyConfig::new(&original, &subset)).unwrap();
    assert!(report.passed(), "{}", report.render());
    let schema = report.check("schema").unwrap();
    assert_eq!(schema.status, CheckStatus::Warn);
    assert_eq!(schema.details, vec!["not present in any subset record: [note]".to_string()]);
    assert!(report.ensure_passed().is_ok());
}

#[test]
fn out_of_range_recorded_fraction_fails_without_panicking() {
    let temp = tempdir().unwrap();
    let (original, subset) = build_subset(temp.path(), 10, 0.5);
    rewrite_provenance(&subset, |provenance| {
        provenance["target"] = json!({"fraction": 5.0});
    });

    let report = verify_subset(&VerifyConfig::new(&original, &subset)).unwrap();
    let size = report.check("size").unwrap();
    assert_eq!(size.status, CheckStatus::Fail);
    assert!(
        size.details.iter().any(|line| line.contains("recorded sampling target is invalid")),
        "{:?}",
        size.details
    );
    assert_eq!(
        report.check("reproducibility").unwrap().status,
        CheckStatus::Fail
    );
    assert_eq!(report.check("membership").unwrap().status, CheckStatus::Pass);
    assert!(matches!(
        report.ensure_passed(),
        Err(SubsetError::VerificationMismatch { .. })
    ));
}

#[test]
fn recorded_seed_that_does_not_replay_fails_reproducibility() {
    let temp = tempdir().unwrap();
    let (original, subset) = build_subset(temp.path(), 200, 0.1);
    rewrite_provenance(&subset, |provenance| {
        provenance["seed"] = json!(43);
    });

    let report = verify_subset(&VerifyConfig::new(&original, &subset)).unwrap();
    assert_eq!(report.check("size").unwrap().status, CheckStatus::Pass);
    assert_eq!(report.check("membership").unwrap().status, CheckStatus::Pass);
    let replay = report.check("reproducibility").unwrap();
    assert_eq!(replay.status, CheckStatus::Fail);
    assert!(replay.details[0].starts_with("replaying seed 43 differs"));
    assert!(!report.passed());
}
