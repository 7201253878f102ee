use std::fs;

use gazed_action::checkpoint::{CheckpointManager, CheckpointScope};
use gazed_action::config::AppConfig;
use gazed_action::data::{collate, DataFields, DatasetProvider, SyntheticProvider};
use gazed_action::model::{
    build_classifier, checkpoint_scope, Classifier, ClassifierConfig, GazePredictor,
    MeanIntensityGaze, ModelVariant,
};
use gazed_action::training::{EpochRecord, JsonlMetricsWriter, MemorySink, Trainer, TrainerConfig};
use gazed_action::{InferBackend, TrainBackend};

fn small_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.batch_size = 4;
    config.model = ClassifierConfig {
        num_actions: 4,
        input_shape: [36, 36],
        dropout: 0.0,
        ..ClassifierConfig::default()
    };
    config.training.max_epochs = 4;
    config.training.checkpoint_interval = 2;
    config
}

fn provider(config: &AppConfig, samples: usize) -> SyntheticProvider {
    SyntheticProvider::new(
        samples,
        config.model.num_actions,
        config.model.input_shape,
        config.model.seed,
    )
}

#[test]
fn single_stream_full_size_step() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::default();
    let mut classifier = build_classifier(
        ModelVariant::SingleStream,
        ClassifierConfig {
            dropout: 0.0,
            ..config.model.clone()
        },
        config.data.clone(),
        CheckpointManager::new(dir.path()),
        None,
        None,
    )
    .unwrap();

    let dataset = provider(&config, 2)
        .open("breakout", "combined", classifier.data_fields())
        .unwrap();
    classifier.preflight(dataset.as_ref()).unwrap();

    let batch = collate::<TrainBackend>(dataset.as_ref(), &[0, 1], false, classifier.device()).unwrap();
    let output = classifier.train_batch(&batch).unwrap();
    assert!(output.loss.is_finite());
    assert_eq!(output.predictions.len(), 2);
    assert!(output.predictions.iter().all(|&a| a < 18));

    let path = classifier.save_checkpoint(1, output.loss).unwrap();
    assert_eq!(path, dir.path().join("ACTION_SL_Epoch_1"));
}

#[test]
fn dual_stream_with_teacher_gaze_writes_metrics_and_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config();
    config.model_save_dir = dir.path().join("models");
    config.runs_dir = dir.path().join("runs");
    config.data.fused_gazes = false;

    let teacher: Box<dyn GazePredictor> = Box::new(MeanIntensityGaze);
    let mut classifier = build_classifier(
        ModelVariant::DualStream,
        config.model.clone(),
        config.data.clone(),
        CheckpointManager::new(&config.model_save_dir),
        Some(teacher),
        None,
    )
    .unwrap();
    assert!(!classifier.data_fields().fused_gazes);

    let provider = provider(&config, 8);
    let fields = classifier.data_fields();
    let train = provider.open("breakout", "combined", fields).unwrap();
    let validation = provider.open("breakout", "validation", fields).unwrap();

    let mut sink =
        JsonlMetricsWriter::create(&config.runs_dir.join(classifier.runs_subdir())).unwrap();
    let summary = Trainer::new(config.trainer_config())
        .train(
            classifier.as_mut(),
            train.as_ref(),
            Some(validation.as_ref()),
            &mut sink,
        )
        .unwrap();
    assert_eq!(summary.end_epoch, 4);

    assert!(sink
        .path()
        .starts_with(dir.path().join("runs/breakout/combined_GAZED_ACTION_SL/run_0")));
    let records: Vec<EpochRecord> = fs::read_to_string(sink.path())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.iter().map(|r| r.epoch).collect::<Vec<_>>(), vec![2, 4]);
    assert!(records.iter().all(|r| r.accuracy.is_some()));

    let checkpoints = CheckpointManager::new(&config.model_save_dir);
    let scope = checkpoint_scope(ModelVariant::DualStream, &config.data);
    assert_eq!(scope, CheckpointScope::dataset("breakout", "combined"));
    let saved: Vec<usize> = checkpoints
        .list(ModelVariant::DualStream, &scope)
        .unwrap()
        .into_iter()
        .map(|(_, metadata)| metadata.epoch)
        .collect();
    assert_eq!(saved, vec![2, 4]);
    assert!(dir
        .path()
        .join("models/breakout/combined/GAZED_ACTION_SL_Epoch_4")
        .is_dir());
}

#[test]
fn resumed_classifier_continues_from_saved_epoch() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config();
    let checkpoints = CheckpointManager::new(dir.path());
    let train = provider(&config, 6)
        .open("breakout", "combined", DataFields::FRAMES_ACTIONS)
        .unwrap();

    let mut first = build_classifier(
        ModelVariant::SingleStream,
        config.model.clone(),
        config.data.clone(),
        checkpoints.clone(),
        None,
        None,
    )
    .unwrap();
    let early = Trainer::new(TrainerConfig {
        max_epochs: 2,
        ..config.trainer_config()
    });
    early
        .train(first.as_mut(), train.as_ref(), None, &mut MemorySink::default())
        .unwrap();

    let latest = checkpoints
        .latest_epoch(ModelVariant::SingleStream, &CheckpointScope::Global)
        .unwrap();
    assert_eq!(latest, Some(2));

    let mut resumed = build_classifier(
        ModelVariant::SingleStream,
        config.model.clone(),
        config.data.clone(),
        checkpoints.clone(),
        None,
        latest,
    )
    .unwrap();
    assert_eq!(resumed.resume(), 2);

    // the restored weights predict exactly like the ones that were saved
    let sample_batch = collate::<InferBackend>(train.as_ref(), &[0, 1, 2], false, first.device()).unwrap();
    let expected = first.predict(sample_batch.frames.clone(), None).unwrap();
    assert_eq!(resumed.predict(sample_batch.frames, None).unwrap(), expected);

    let mut sink = MemorySink::default();
    let summary = Trainer::new(config.trainer_config())
        .train(resumed.as_mut(), train.as_ref(), None, &mut sink)
        .unwrap();
    assert_eq!(summary.start_epoch, 2);
    assert_eq!(summary.epochs_run(), 2);
    assert_eq!(sink.records.len(), 1);
    assert_eq!(sink.records[0].epoch, 4);
    assert_eq!(
        checkpoints
            .latest_epoch(ModelVariant::SingleStream, &CheckpointScope::Global)
            .unwrap(),
        Some(4)
    );
}
