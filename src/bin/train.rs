#![recursion_limit = "256"]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use gazed_action::checkpoint::CheckpointManager;
use gazed_action::config::AppConfig;
use gazed_action::data::{DatasetProvider, SyntheticProvider};
use gazed_action::model::{
    build_classifier, checkpoint_scope, GazePredictor, MeanIntensityGaze, ModelVariant,
};
use gazed_action::training::{JsonlMetricsWriter, Trainer};

/// Train an action classifier on stacked Atari frames.
#[derive(Parser)]
#[command(name = "train", about = "Train a gaze-conditioned Atari action classifier")]
struct Cli {
    /// Model to train: action (single-stream) or gazed (dual-stream)
    #[arg(long, default_value = "gazed")]
    model: ModelVariant,

    /// Resume training from the latest checkpoint
    #[arg(long)]
    resume: bool,

    /// Resume training from the checkpoint of this epoch
    #[arg(long, conflicts_with = "resume")]
    epoch: Option<usize>,

    /// Path to TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the epoch ceiling
    #[arg(long)]
    epochs: Option<usize>,

    /// Override learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Samples per generated split
    #[arg(long, default_value_t = 256)]
    synthetic: usize,

    /// Synthesize gazes with the mean-intensity gaze model instead of
    /// reading fused gazes from the dataset
    #[arg(long)]
    teacher_gaze: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut app_config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    // Apply CLI overrides
    if let Some(epochs) = cli.epochs {
        app_config.training.max_epochs = epochs;
    }
    if let Some(lr) = cli.lr {
        app_config.model.learning_rate = lr;
    }
    if cli.teacher_gaze {
        app_config.data.fused_gazes = false;
    }
    app_config
        .validate()
        .context("validating configuration after overrides")?;

    let checkpoints = CheckpointManager::new(&app_config.model_save_dir);
    let load_epoch = if cli.resume {
        let scope = checkpoint_scope(cli.model, &app_config.data);
        let latest = checkpoints
            .latest_epoch(cli.model, &scope)
            .context("listing checkpoints")?;
        if latest.is_none() {
            log::warn!(
                "no {} checkpoint under {}, starting fresh",
                cli.model,
                checkpoints.root().display()
            );
        }
        latest
    } else {
        cli.epoch
    };

    let teacher: Option<Box<dyn GazePredictor>> = cli
        .teacher_gaze
        .then(|| Box::new(MeanIntensityGaze) as Box<dyn GazePredictor>);
    let mut classifier = build_classifier(
        cli.model,
        app_config.model.clone(),
        app_config.data.clone(),
        checkpoints,
        teacher,
        load_epoch,
    )
    .with_context(|| format!("building {}", cli.model))?;
    if let Some(epoch) = load_epoch {
        log::info!("resumed {} from epoch {}", cli.model, epoch);
    }

    let provider = SyntheticProvider::new(
        cli.synthetic,
        app_config.model.num_actions,
        app_config.model.input_shape,
        app_config.model.seed,
    );
    let fields = classifier.data_fields();
    let splits = &app_config.data;
    let train = provider
        .open(&splits.game, &splits.dataset_train, fields)
        .with_context(|| format!("opening {}/{}", splits.game, splits.dataset_train))?;
    let validation = if splits.dataset_val.is_empty() {
        None
    } else {
        Some(
            provider
                .open(&splits.game, &splits.dataset_val, fields)
                .with_context(|| format!("opening {}/{}", splits.game, splits.dataset_val))?,
        )
    };

    let runs_dir = app_config.runs_dir.join(classifier.runs_subdir());
    let mut sink = JsonlMetricsWriter::create(&runs_dir)
        .with_context(|| format!("creating metrics run under {}", runs_dir.display()))?;
    log::info!("writing metrics to {}", sink.path().display());

    let trainer = Trainer::new(app_config.trainer_config());
    let summary = trainer
        .train(
            classifier.as_mut(),
            train.as_ref(),
            validation.as_deref(),
            &mut sink,
        )
        .context("training")?;

    log::info!(
        "ran {} epochs ({} -> {}), last loss {}, last accuracy {}",
        summary.epochs_run(),
        summary.start_epoch,
        summary.end_epoch,
        summary
            .last_loss
            .map_or_else(|| "n/a".to_string(), |l| format!("{:.4}", l)),
        summary
            .last_accuracy
            .map_or_else(|| "n/a".to_string(), |a| format!("{:.1}%", a * 100.0)),
    );
    if let Some(path) = summary.last_checkpoint {
        log::info!("last checkpoint: {}", path.display());
    }
    Ok(())
}
