use std::collections::BTreeSet;

use ndarray::Array3;
use rnn_fixtures::fixture::{self, ALL_FIXTURES, DEFAULT_SEED, FIXTURES, VERIFY_TOLERANCE};
use rnn_fixtures::{FixtureSpec, RnnError, RnnMode, TensorBundle};
use tempfile::tempdir;

fn expected_keys(spec: &FixtureSpec) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = spec.config().parameter_names().into_iter().collect();
    keys.extend(["input", "output", "hn"].iter().map(|k| k.to_string()));
    if spec.mode == RnnMode::Lstm {
        keys.insert("cn".to_string());
    }
    keys
}

#[test]
fn test_fixture_shapes() {
    for spec in FIXTURES.iter() {
        let bundle = fixture::generate(spec, DEFAULT_SEED).unwrap();
        let directions = if spec.bidirectional { 2 } else { 1 };
        let rows = spec.num_layers * directions;

        assert_eq!(bundle.get("input").unwrap().shape, vec![5, 3, 10], "{}", spec.name);
        let output_shape = vec![5, 3, 20 * directions];
        assert_eq!(bundle.get("output").unwrap().shape, output_shape, "{}", spec.name);
        assert_eq!(bundle.get("hn").unwrap().shape, vec![rows, 5, 20], "{}", spec.name);
        match spec.mode {
            RnnMode::Lstm => assert_eq!(bundle.get("cn").unwrap().shape, vec![rows, 5, 20]),
            RnnMode::Gru => assert!(!bundle.contains("cn")),
        }
    }
}

#[test]
fn test_fixture_key_sets() {
    for spec in ALL_FIXTURES.iter() {
        let bundle = fixture::generate(spec, DEFAULT_SEED).unwrap();
        let keys: BTreeSet<String> = bundle.keys().map(str::to_string).collect();
        assert_eq!(keys, expected_keys(spec), "{}", spec.name);
        assert_eq!(keys.len(), bundle.len());
    }
}

#[test]
fn test_parameter_shapes_follow_layer_inputs() {
    let bundle = fixture::generate(&fixture::BI_LSTM_NLAYER_TEST, DEFAULT_SEED).unwrap();

    assert_eq!(bundle.get("weight_ih_l0").unwrap().shape, vec![80, 10]);
    assert_eq!(bundle.get("weight_ih_l1_reverse").unwrap().shape, vec![80, 40]);
    assert_eq!(bundle.get("weight_hh_l2").unwrap().shape, vec![80, 20]);
    assert_eq!(bundle.get("bias_hh_l2_reverse").unwrap().shape, vec![80]);

    let gru = fixture::generate(&fixture::GRU_TEST, DEFAULT_SEED).unwrap();
    assert_eq!(gru.get("weight_ih_l0").unwrap().shape, vec![60, 10]);
    assert_eq!(gru.get("bias_ih_l0").unwrap().shape, vec![60]);
}

#[test]
fn test_parameters_within_init_bound() {
    let bound = 1.0 / 20f64.sqrt();
    let bundle = fixture::generate(&fixture::BI_GRU_NLAYER_TEST, DEFAULT_SEED).unwrap();
    for name in fixture::BI_GRU_NLAYER_TEST.config().parameter_names() {
        let tensor = bundle.get(&name).unwrap();
        assert!(tensor.data.iter().all(|v| v.abs() <= bound), "{}", name);
    }
}

#[test]
fn test_same_seed_same_fixture() {
    let first = fixture::generate(&fixture::LSTM_NLAYER_TEST, DEFAULT_SEED).unwrap();
    let second = fixture::generate(&fixture::LSTM_NLAYER_TEST, DEFAULT_SEED).unwrap();
    assert_eq!(first.tensors(), second.tensors());

    let other = fixture::generate(&fixture::LSTM_NLAYER_TEST, DEFAULT_SEED + 1).unwrap();
    assert_ne!(first.get("input"), other.get("input"));
}

#[test]
fn test_write_load_verify_every_fixture() {
    let dir = tempdir().unwrap();
    for spec in ALL_FIXTURES.iter() {
        let path = fixture::write(spec, DEFAULT_SEED, dir.path()).unwrap();
        assert_eq!(path, dir.path().join(format!("{}.pt", spec.name)));

        let bundle = TensorBundle::load(&path).unwrap();
        assert_eq!(bundle.metadata.name, spec.name);
        assert_eq!(bundle.metadata.seed, Some(DEFAULT_SEED));

        let report = fixture::verify(&bundle).unwrap();
        assert!(report.passed(VERIFY_TOLERANCE), "{}: {}", spec.name, report.max_diff());
        assert_eq!(report.cn_diff.is_some(), spec.mode == RnnMode::Lstm);
    }
}

#[test]
fn test_verify_flags_corrupted_state() {
    let dir = tempdir().unwrap();
    let path = fixture::write(&fixture::BI_GRU_TEST, DEFAULT_SEED, dir.path()).unwrap();
    let bundle = TensorBundle::load(&path).unwrap();

    // Re-encode with a perturbed hn
    let mut corrupted = TensorBundle::new(bundle.metadata.clone());
    for tensor in bundle.tensors() {
        let mut array = tensor.to_array().unwrap();
        if tensor.name == "hn" {
            array[[1, 0, 0]] += 1e-3;
        }
        corrupted.insert(tensor.name.clone(), &array).unwrap();
    }

    let report = fixture::verify(&corrupted).unwrap();
    assert!(!report.passed(VERIFY_TOLERANCE));
    assert!(report.hn_diff > 5e-4);
    assert_eq!(report.output_diff, 0.0);
}

#[test]
fn test_verify_reports_missing_tensor() {
    let bundle = fixture::generate(&fixture::GRU_TEST, DEFAULT_SEED).unwrap();
    let mut partial = TensorBundle::new(bundle.metadata.clone());
    for tensor in bundle.tensors().iter().filter(|t| t.name != "output") {
        partial.insert(tensor.name.clone(), &tensor.to_array().unwrap()).unwrap();
    }
    assert!(fixture::verify(&partial).is_err());
}

#[test]
fn test_nan_fixture_fails_verification() {
    let dir = tempdir().unwrap();
    let path = fixture::write(&fixture::GRU_TEST, DEFAULT_SEED, dir.path()).unwrap();
    let bundle = TensorBundle::load(&path).unwrap();

    let mut poisoned = TensorBundle::new(bundle.metadata.clone());
    for tensor in bundle.tensors() {
        let mut array = tensor.to_array().unwrap();
        if tensor.name == "output" || tensor.name == "hn" {
            array.fill(f64::NAN);
        }
        poisoned.insert(tensor.name.clone(), &array).unwrap();
    }
    poisoned.save(&path).unwrap();

    let reloaded = TensorBundle::load(&path).unwrap();
    let report = fixture::verify_as(&fixture::GRU_TEST, &reloaded).unwrap();
    assert!(report.max_diff().is_nan());
    assert!(!report.passed(VERIFY_TOLERANCE));
}

#[test]
fn test_other_fixture_under_wrong_file_name_is_rejected() {
    let dir = tempdir().unwrap();
    let written = fixture::write(&fixture::BI_GRU_TEST, DEFAULT_SEED, dir.path()).unwrap();
    let impostor = dir.path().join(fixture::GRU_TEST.file_name());
    std::fs::copy(&written, &impostor).unwrap();

    let bundle = TensorBundle::load(&impostor).unwrap();
    // The numbers alone are self-consistent
    assert!(fixture::verify(&bundle).unwrap().passed(VERIFY_TOLERANCE));
    assert!(matches!(
        fixture::verify_as(&fixture::GRU_TEST, &bundle),
        Err(RnnError::FixtureMismatch { .. })
    ));
}

#[test]
fn test_stray_cell_state_in_gru_fixture_is_rejected() {
    let mut bundle = fixture::generate(&fixture::GRU_TEST, DEFAULT_SEED).unwrap();
    bundle.insert("cn", &Array3::<f64>::zeros((1, 5, 20))).unwrap();

    assert!(matches!(
        fixture::verify_as(&fixture::GRU_TEST, &bundle),
        Err(RnnError::UnexpectedTensor(ref name)) if name == "cn"
    ));
}
