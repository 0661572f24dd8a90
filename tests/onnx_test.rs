mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::*;
use florascope::artifacts::{CLASS_NAMES_FILE, INDEX_TO_CLASS_FILE, MODEL_FILE};
use florascope::classifier::preprocess::preprocess;
use florascope::{ArtifactStore, Backbone, Classifier, ClassifierError, Device, OnnxBackbone};
use image::ImageFormat;
use ndarray::{Array4, Axis};

/// Mean over H and W followed by an identity fully connected layer: logits are the
/// normalized channel means, shape `[batch, 3]`.
fn model_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/channel_means.onnx")
}

fn color_labels() -> florascope::LabelResolver {
    labels(
        &[("1", "red campion"), ("2", "green hellebore"), ("3", "bluebell")],
        &[(0, "1"), (1, "2"), (2, "3")],
    )
}

fn onnx_classifier() -> Classifier {
    Classifier::builder()
        .with_runtime_config(cpu_config())
        .with_model(&model_path())
        .expect("Failed to load model")
        .with_labels(color_labels())
        .build()
        .expect("Failed to create classifier")
}

#[test]
fn test_session_reports_output_width() {
    let backbone = OnnxBackbone::from_file(&model_path(), &cpu_config()).unwrap();
    assert_eq!(backbone.output_width(), Some(3));
    assert_eq!(backbone.device(), Device::Cpu);
}

#[test]
fn test_forward_returns_channel_means() {
    let backbone = OnnxBackbone::from_file(&model_path(), &cpu_config()).unwrap();
    let input = preprocess(&solid_image(300, 260, [255, 0, 0])).unwrap();
    let logits = backbone.forward(&input).unwrap();

    assert_eq!(logits.len(), 3);
    for channel in 0..3 {
        let expected = input.index_axis(Axis(1), channel).mean().unwrap();
        assert!((logits[channel] - expected).abs() < 1e-4);
    }
    assert!(logits[0] > logits[1] && logits[0] > logits[2]);
}

#[test]
fn test_forward_rejects_batches() {
    let backbone = OnnxBackbone::from_file(&model_path(), &cpu_config()).unwrap();
    let batch = Array4::<f32>::zeros((2, 3, 224, 224));
    assert!(matches!(
        backbone.forward(&batch),
        Err(ClassifierError::ModelExecutionError(_))
    ));
}

#[test]
fn test_classify_bytes_end_to_end() {
    let classifier = onnx_classifier();
    for (color, expected) in [
        ([255, 0, 0], "red campion"),
        ([0, 255, 0], "green hellebore"),
        ([0, 0, 255], "bluebell"),
    ] {
        let jpeg = encode(&solid_image(500, 375, color), ImageFormat::Jpeg);
        let result = classifier.classify_bytes(&jpeg).unwrap();
        assert_eq!(result.class, expected);
        assert!(result.confidence > 1.0 / 3.0 && result.confidence <= 1.0);
    }

    let info = classifier.info();
    assert_eq!(info.num_classes, 3);
    assert_eq!(info.device, "cpu");
    assert!(info.model_path.unwrap().ends_with("channel_means.onnx"));
}

#[test]
fn test_model_width_must_match_class_table() {
    let result = Classifier::builder()
        .with_runtime_config(cpu_config())
        .with_model(&model_path())
        .unwrap()
        .with_labels(labels(
            &[("1", "a"), ("2", "b"), ("3", "c"), ("4", "d")],
            &[(0, "1"), (1, "2"), (2, "3"), (3, "4")],
        ))
        .build();
    assert!(matches!(result, Err(ClassifierError::ConfigError(_))));
}

#[test]
fn test_artifact_directory_startup() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(model_path(), dir.path().join(MODEL_FILE)).unwrap();
    fs::write(
        dir.path().join(CLASS_NAMES_FILE),
        r#"{"1": "red campion", "2": "green hellebore", "3": "bluebell"}"#,
    )
    .unwrap();
    fs::write(dir.path().join(INDEX_TO_CLASS_FILE), r#"{"0": "1", "1": "2", "2": "3"}"#).unwrap();

    let classifier = Classifier::builder()
        .with_runtime_config(cpu_config())
        .with_artifacts(&ArtifactStore::new(dir.path()))
        .unwrap()
        .build()
        .unwrap();
    let result = classifier.classify_bytes(&png(224, 224, [0, 0, 255])).unwrap();
    assert_eq!(result.class, "bluebell");
}
