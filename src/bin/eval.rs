#![recursion_limit = "256"]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use gazed_action::checkpoint::CheckpointManager;
use gazed_action::config::AppConfig;
use gazed_action::data::{collate, DatasetProvider, SyntheticProvider};
use gazed_action::model::{
    build_classifier, checkpoint_scope, GazePredictor, MeanIntensityGaze, ModelVariant,
};
use gazed_action::InferBackend;

/// Report validation accuracy of a saved classifier.
#[derive(Parser)]
#[command(name = "eval", about = "Evaluate a saved Atari action classifier")]
struct Cli {
    /// Model to evaluate: action or gazed
    #[arg(long, default_value = "gazed")]
    model: ModelVariant,

    /// Checkpoint epoch (defaults to the latest)
    #[arg(long)]
    epoch: Option<usize>,

    /// Path to TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Samples in the generated validation split
    #[arg(long, default_value_t = 256)]
    synthetic: usize,

    /// Number of samples whose predictions are printed
    #[arg(long, default_value_t = 8)]
    show: usize,

    /// Synthesize gazes with the mean-intensity gaze model
    #[arg(long)]
    teacher_gaze: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut app_config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if cli.teacher_gaze {
        app_config.data.fused_gazes = false;
    }

    let checkpoints = CheckpointManager::new(&app_config.model_save_dir);
    let epoch = match cli.epoch {
        Some(epoch) => epoch,
        None => {
            let scope = checkpoint_scope(cli.model, &app_config.data);
            match checkpoints
                .latest_epoch(cli.model, &scope)
                .context("listing checkpoints")?
            {
                Some(epoch) => epoch,
                None => bail!(
                    "no {} checkpoint under {}",
                    cli.model,
                    checkpoints.root().display()
                ),
            }
        }
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
        Some(epoch),
    )
    .with_context(|| format!("loading {} at epoch {}", cli.model, epoch))?;

    let provider = SyntheticProvider::new(
        cli.synthetic,
        app_config.model.num_actions,
        app_config.model.input_shape,
        app_config.model.seed,
    );
    let fields = classifier.data_fields();
    let splits = &app_config.data;
    let validation = provider
        .open(&splits.game, &splits.dataset_val, fields)
        .with_context(|| format!("opening {}/{}", splits.game, splits.dataset_val))?;

    let accuracy = classifier
        .accuracy(validation.as_ref(), app_config.batch_size)
        .context("computing accuracy")?;
    println!(
        "{} epoch {}: accuracy {:.2}% over {} samples",
        cli.model,
        epoch,
        accuracy * 100.0,
        validation.len()
    );

    let shown: Vec<usize> = (0..cli.show.min(validation.len())).collect();
    if !shown.is_empty() {
        let batch = collate::<InferBackend>(
            validation.as_ref(),
            &shown,
            fields.fused_gazes,
            classifier.device(),
        )?;
        let predictions = classifier.infer(epoch, batch.frames, batch.gazes)?;
        for ((index, label), predicted) in shown.iter().zip(&batch.labels).zip(&predictions) {
            println!("  sample {:>4}: label {:>2}, predicted {:>2}", index, label, predicted);
        }
    }
    Ok(())
}
