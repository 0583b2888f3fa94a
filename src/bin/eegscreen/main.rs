use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use eegscreen::{
    edf, extract_from_edf, read_features_csv, ExtractionConfig, RandomForest, Result,
    ScreeningModel,
};

#[derive(Parser)]
#[command(
    name = "eegscreen",
    version,
    about = "EEG-based MDD screening: feature extraction and classifier inference"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run inference on an EDF recording or a delimited feature file
    Predict {
        /// Path to the serialized model artifact (JSON)
        #[arg(long, env = "EEGSCREEN_MODEL")]
        model: PathBuf,

        /// Input file: .edf recording, or delimited text of feature values
        input: PathBuf,
    },

    /// Extract and print the feature vector from an EDF recording
    Features {
        /// Input EDF recording
        input: PathBuf,
    },

    /// Print metadata for an EDF recording
    Info {
        /// Input EDF recording
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Predict { model, input } => run_predict(&model, &input),
        Commands::Features { input } => run_features(&input),
        Commands::Info { input } => run_info(&input),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn is_edf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("edf"))
        .unwrap_or(false)
}

fn run_predict(model_path: &Path, input: &Path) -> Result<()> {
    let forest = RandomForest::from_file(model_path)?;
    let model = ScreeningModel::new(forest)?;

    let features = if is_edf(input) {
        extract_from_edf(input, &ExtractionConfig::default())?
    } else {
        let payload = std::fs::read_to_string(input)?;
        read_features_csv(&payload)?
    };

    log::info!("{} features read from '{}'", features.len(), input.display());

    let result = model.predict(&features)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).expect("result serialization cannot fail")
    );
    Ok(())
}

fn run_features(input: &Path) -> Result<()> {
    let features = extract_from_edf(input, &ExtractionConfig::default())?;
    println!(
        "{}",
        serde_json::to_string(&features).expect("vector serialization cannot fail")
    );
    Ok(())
}

fn run_info(input: &Path) -> Result<()> {
    let reader = edf::EdfReader::open(input)?;
    let header = &reader.header;
    let channels: Vec<&str> = reader
        .signal_headers
        .iter()
        .map(|sh| sh.label.as_str())
        .collect();
    let sample_rate = reader
        .signal_headers
        .first()
        .map(|sh| sh.sample_rate(header.record_duration_secs))
        .unwrap_or(0.0);

    let info = serde_json::json!({
        "recording_id": header.recording_id,
        "start_date": header.start_date,
        "start_time": header.start_time,
        "num_channels": header.num_signals,
        "channels": channels,
        "sample_rate": sample_rate,
        "duration_secs": reader.total_duration(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&info).expect("info serialization cannot fail")
    );
    Ok(())
}
