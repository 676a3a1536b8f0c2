//! Riverbank CLI Module
//!
//! Command-line interface for training, prediction, serving and survey generation.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{DataLoader, SyntheticSurvey};
use crate::inference::{AdaptationCategory, Prediction, Predictor};
use crate::schema::FeatureSchema;
use crate::server::{run_server, ServerConfig};
use crate::training::{EncoderFit, TrainingConfig, TrainingPipeline};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn category_colored(label: &str) -> ColoredString {
    match label.parse::<AdaptationCategory>() {
        Ok(AdaptationCategory::HighlyAdaptive) => label.green().bold(),
        Ok(AdaptationCategory::ModeratelyAdaptive) => label.yellow().bold(),
        Ok(AdaptationCategory::NonAdaptive) => label.red().bold(),
        Err(_) => label.white().bold(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "riverbank")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Riverbank erosion adaptation classifier")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Rows the category encoders are fitted on
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EncoderFitArg {
    Full,
    Train,
}

impl From<EncoderFitArg> for EncoderFit {
    fn from(arg: EncoderFitArg) -> Self {
        match arg {
            EncoderFitArg::Full => EncoderFit::FullDataset,
            EncoderFitArg::Train => EncoderFit::TrainOnly,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train all candidates on a survey CSV and save the best bundle
    Train {
        /// Survey CSV with the feature columns and Adaptation_Category
        #[arg(short, long)]
        data: PathBuf,

        /// Artifact directory to write
        #[arg(short, long, default_value = "artifacts")]
        output: PathBuf,

        /// Seed for the split and every candidate
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Held-out fraction
        #[arg(long, default_value = "0.2")]
        test_size: f64,

        /// Rows the category encoders are fitted on
        #[arg(long, value_enum, default_value = "full")]
        fit_encoders_on: EncoderFitArg,

        /// Override the number of trees / boosting rounds of every candidate
        #[arg(long)]
        estimators: Option<usize>,
    },

    /// Classify households with a saved bundle
    Predict {
        /// Artifact directory
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// JSON object (or array of objects), inline or as a file path
        #[arg(short, long)]
        input: String,
    },

    /// Start the prediction server
    Serve {
        /// Artifact directory (defaults to ARTIFACTS_DIR or ./artifacts)
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// Server host (defaults to API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Server port (defaults to API_PORT or 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write a synthetic survey CSV
    Generate {
        /// Number of households
        #[arg(short, long, default_value = "1000")]
        rows: usize,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Show metadata of a saved bundle
    Info {
        /// Artifact directory
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    output: &Path,
    seed: u64,
    test_size: f64,
    encoder_fit: EncoderFit,
    estimators: Option<usize>,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let schema = FeatureSchema::riverbank();
    let dataset = DataLoader::new().load_csv(&schema, data_path)?;
    step_done(&format!("{} households in {:?}", dataset.len(), start.elapsed()));

    for (label, count) in dataset.class_counts() {
        kv(&label, &count.to_string());
    }

    let mut config = TrainingConfig::new()
        .with_random_state(seed)
        .with_test_size(test_size)
        .with_encoder_fit(encoder_fit);
    if let Some(n) = estimators {
        config = config.with_estimators(n);
    }

    step_run(&format!("Training {} candidates", config.candidates.len()));
    let start = Instant::now();
    let outcome = TrainingPipeline::new(config).run(&dataset)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<20} {:>10} {:>10} {:>10}", muted("Model"), muted("Accuracy"), muted("F1"), muted("Time"));
    println!("  {}", dim(&"─".repeat(54)));
    for (i, c) in outcome.candidates.iter().enumerate() {
        let line = format!(
            "  {:<20} {:>10.4} {:>10.4} {:>9.2}s",
            c.model_name, c.accuracy, c.f1_score, c.training_time_secs
        );
        if i == outcome.selected {
            println!("{}", line.white().bold());
        } else {
            println!("{}", line);
        }
    }
    println!("  {}", dim(&"─".repeat(54)));

    let best = outcome.selected_report();
    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        best.model_name.white().bold(),
        muted("accuracy:"),
        best.accuracy
    );
    println!();
    for line in best.report.render().lines() {
        println!("  {}", line);
    }

    step_run(&format!("Saving → {}", output.display()));
    outcome.bundle.save(output)?;
    step_done(&format!("encoders fitted on {}", outcome.bundle.metadata.encoder_fit));
    println!();

    Ok(())
}

/// Read `--input` as a file if it names one, else as inline JSON
fn read_input(input: &str) -> anyhow::Result<serde_json::Value> {
    let path = Path::new(input);
    let text = if path.is_file() {
        std::fs::read_to_string(path)?
    } else {
        input.to_string()
    };
    Ok(serde_json::from_str(&text)?)
}

fn print_prediction(index: Option<usize>, prediction: &Prediction) {
    match index {
        Some(i) => section(&format!("Household {}", i + 1)),
        None => section("Prediction"),
    }
    println!("  {}  {}", category_colored(&prediction.label), dim(&format!("{:.2}% confidence", prediction.confidence)));
    println!();
    for p in &prediction.probabilities {
        let width = (p.probability * 30.0).round() as usize;
        println!("  {:<20} {:>6.2}% {}", muted(&p.category), p.probability * 100.0, accent(&"█".repeat(width)));
    }
    if let Some(category) = prediction.category() {
        println!();
        println!("  {}", category.heading().white().bold());
        for r in category.recommendations() {
            println!("  {} {}", dim("-"), r);
        }
    }
}

pub fn cmd_predict(artifacts: &Path, input: &str) -> anyhow::Result<()> {
    step_run("Loading bundle");
    let predictor = Predictor::load(artifacts)?;
    step_done(&predictor.metadata().model_name);

    match read_input(input)? {
        serde_json::Value::Object(object) => {
            let prediction = predictor.predict_json(&object)?;
            print_prediction(None, &prediction);
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let object = item
                    .as_object()
                    .ok_or_else(|| anyhow::anyhow!("item {} is not a JSON object", i + 1))?;
                let prediction = predictor.predict_json(object)?;
                print_prediction(Some(i), &prediction);
            }
        }
        _ => anyhow::bail!("input must be a JSON object or an array of objects"),
    }
    println!();
    Ok(())
}

pub async fn cmd_serve(artifacts: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = ServerConfig::default();
    if let Some(dir) = artifacts {
        config = config.with_artifacts_dir(dir);
    }
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }

    section("Serve");
    kv("Artifacts", &config.artifacts_dir.display().to_string());
    kv("Address", &format!("http://{}:{}", config.host, config.port));
    println!();

    run_server(config).await
}

pub fn cmd_generate(rows: usize, output: &Path, seed: u64) -> anyhow::Result<()> {
    section("Generate");

    step_run(&format!("Generating {} households", rows));
    let schema = FeatureSchema::riverbank();
    let dataset = SyntheticSurvey::new(rows).with_seed(seed).generate(&schema)?;
    step_done(&format!("seed {}", seed));

    for (label, count) in dataset.class_counts() {
        kv(&label, &count.to_string());
    }

    step_run(&format!("Saving → {}", output.display()));
    DataLoader::new().write_csv(&schema, &dataset, output)?;
    step_done("");
    println!();
    Ok(())
}

pub fn cmd_info(artifacts: &Path) -> anyhow::Result<()> {
    let predictor = Predictor::load(artifacts)?;
    let meta = predictor.metadata();

    section("Model");
    kv("Model", &meta.model_name);
    kv("Accuracy", &format!("{:.2}%", meta.accuracy * 100.0));
    kv("F1-Score", &format!("{:.4}", meta.f1_score));
    kv("Classes", &meta.target_classes.join(", "));
    kv("Features", &meta.feature_columns.len().to_string());
    if !meta.trained_at.is_empty() {
        kv("Trained", &meta.trained_at);
    }
    kv("Train / test", &format!("{} / {}", meta.n_train, meta.n_test));
    kv("Encoders fit on", &meta.encoder_fit.to_string());

    if !meta.candidates.is_empty() {
        section("Candidates");
        for c in &meta.candidates {
            let marker = if c.model_name == meta.model_name { ok("●") } else { dim("○") };
            println!("  {} {:<20} {:>8.4} {:>8.4}", marker, c.model_name, c.accuracy, c.f1_score);
        }
    }

    let top = meta.top_features(8);
    if !top.is_empty() {
        section("Top features");
        for f in top {
            println!("  {:<36} {:.4}", f.feature, f.importance);
        }
    }
    println!();
    Ok(())
}
