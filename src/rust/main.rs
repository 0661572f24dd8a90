use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use florascope::{
    optimization_level_from_u8, ArtifactStore, Classifier, Device, RuntimeConfig, ServerConfig,
};
use log::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding class_mapping.json, idx_to_class.json and model.onnx
    #[arg(long, env = "FLORASCOPE_HOME", global = true)]
    model_dir: Option<PathBuf>,

    /// Compute device: auto, cpu or cuda
    #[arg(long, env = "FLORASCOPE_DEVICE", default_value = "auto", global = true)]
    device: Device,

    /// Intra-op threads for ONNX Runtime (0 lets the runtime decide)
    #[arg(long, default_value_t = 0, global = true)]
    intra_threads: usize,

    /// Graph optimization level, 0 (disabled) to 3
    #[arg(long, default_value_t = 3, global = true)]
    opt_level: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the prediction endpoint
    Serve {
        /// Address to bind
        #[arg(long, env = "FLORASCOPE_BIND", default_value = "0.0.0.0")]
        bind: IpAddr,
        /// Port to serve on
        #[arg(short, long, env = "FLORASCOPE_PORT", default_value_t = 8000)]
        port: u16,
        /// Maximum request body size in bytes
        #[arg(long, env = "FLORASCOPE_BODY_LIMIT", default_value_t = florascope::server::DEFAULT_BODY_LIMIT)]
        body_limit: usize,
    },
    /// Classify a single image and print the result as JSON
    Classify {
        /// Image file to classify
        image: PathBuf,
    },
    /// Download the model weights into the model directory
    Fetch {
        /// URL of the exported ONNX model
        url: String,
        /// Expected SHA-256 of the model file
        #[arg(long)]
        sha256: Option<String>,
        /// Replace an existing model file even if it verifies
        #[arg(short, long)]
        force: bool,
    },
}

impl Args {
    fn store(&self) -> ArtifactStore {
        match &self.model_dir {
            Some(dir) => ArtifactStore::new(dir),
            None => ArtifactStore::new_default(),
        }
    }

    fn runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        Ok(RuntimeConfig {
            intra_threads: self.intra_threads,
            optimization_level: optimization_level_from_u8(self.opt_level)?,
            device: self.device,
            ..RuntimeConfig::default()
        })
    }
}

fn load_classifier(args: &Args) -> anyhow::Result<Classifier> {
    let store = args.store();
    info!("Loading artifacts from {}", store.base_dir().display());
    let start_time = Instant::now();

    let classifier = Classifier::builder()
        .with_runtime_config(args.runtime_config()?)
        .with_artifacts(&store)?
        .build()
        .context("failed to build classifier")?;

    info!("=== Classifier loaded (took {:.2?}) ===", start_time.elapsed());
    Ok(classifier)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    florascope::init_logger();
    let args = Args::parse();

    match &args.command {
        Command::Serve { bind, port, body_limit } => {
            let classifier = Arc::new(load_classifier(&args)?);
            let config = ServerConfig {
                bind: *bind,
                port: *port,
                body_limit: *body_limit,
            };
            florascope::serve(classifier, config).await?;
        }
        Command::Classify { image } => {
            let classifier = load_classifier(&args)?;
            let start_time = Instant::now();
            let prediction = classifier
                .classify_path(image)
                .with_context(|| format!("failed to classify {}", image.display()))?;
            info!("Classification took {:.2?}", start_time.elapsed());
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Command::Fetch { url, sha256, force } => {
            let store = args.store();
            store.download_model(url, sha256.as_deref(), *force).await?;
            let missing = store.missing_artifacts();
            if !missing.is_empty() {
                log::warn!("Still missing before the service can start: {:?}", missing);
            }
        }
    }

    Ok(())
}
