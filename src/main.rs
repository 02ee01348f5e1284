use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fruity_nutrition::model::{load_metadata, print_metadata_info, AppConfig};
use fruity_nutrition::{decode_data_url, load_image, FruitPipeline, PredictionReport};

#[derive(Parser)]
#[command(name = "fruity_nutrition")]
#[command(version)]
#[command(about = "Identify a fruit from a photo and show its nutritional information", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the fruit in an image and show its nutrition facts
    Predict {
        /// Image file (jpg, jpeg, png)
        #[arg(required_unless_present = "data_url")]
        image: Option<PathBuf>,
        /// Camera capture as a data URL, or @file containing one
        #[arg(long, conflicts_with = "image")]
        data_url: Option<String>,
    },
    /// Look up nutrition facts for a fruit name
    Lookup {
        /// Fruit name
        label: String,
    },
    /// Show model archive metadata
    ModelInfo {
        /// Model archive (defaults to the configured model)
        path: Option<PathBuf>,
    },
    /// Write the default config file
    InitConfig,
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict { image, data_url } => {
            let config = AppConfig::load_or_default(&cli.config);
            let pipeline = FruitPipeline::from_config(&config)?;

            let image = match (image, data_url) {
                (Some(path), _) => load_image(&path)
                    .with_context(|| format!("Failed to load image: {}", path.display()))?,
                (None, Some(url)) => decode_data_url(&read_data_url(&url)?)
                    .context("Failed to decode camera capture")?,
                (None, None) => anyhow::bail!("no image given"),
            };

            let report = pipeline.predict(&image).context("Prediction failed")?;
            print_report(&report);
        }
        Commands::Lookup { label } => {
            let config = AppConfig::load_or_default(&cli.config);
            let pipeline = FruitPipeline::from_config(&config)?;
            match pipeline.nutrition_facts(&label)? {
                Some(facts) => {
                    println!("Nutritional Information:");
                    print!("{}", facts);
                }
                None => println!("Nutritional information not available for this fruit."),
            }
        }
        Commands::ModelInfo { path } => {
            let path = match path {
                Some(path) => path,
                None => PathBuf::from(AppConfig::load_or_default(&cli.config).model.model_path),
            };
            let metadata = load_metadata(&path)
                .with_context(|| format!("Failed to read model archive: {}", path.display()))?;
            print_metadata_info(&metadata);
        }
        Commands::InitConfig => {
            let config = AppConfig::default();
            config.save(&cli.config)?;
            println!("設定ファイルを保存しました: {}", cli.config.display());
            config.display();
        }
    }

    Ok(())
}

/// `@path` の場合はファイルからdata URLを読む
fn read_data_url(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read data URL file: {}", path)),
        None => Ok(arg.to_string()),
    }
}

fn print_report(report: &PredictionReport) {
    println!("Predicted Fruit: {}", report.display_name);
    println!("Confidence: {:.2}%", report.prediction.score() * 100.0);
    println!();
    match &report.nutrition {
        Some(facts) => {
            println!("Nutritional Information:");
            print!("{}", facts);
        }
        None => println!("Nutritional information not available for this fruit."),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
