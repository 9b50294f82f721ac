use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use corn_leaf_server::{
    config::{InputSize, ServiceConfig},
    server,
    state::AppState,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Corn leaf disease prediction server", long_about = None)]
struct Args {
    #[arg(long, help = "JSON config file; command line flags override its values")]
    config: Option<PathBuf>,

    #[arg(long, help = "Host address to bind the server to")]
    host: Option<String>,

    #[arg(long, help = "Port number to listen on")]
    port: Option<u16>,

    #[arg(long, help = "Path to the ONNX classifier")]
    model_path: Option<PathBuf>,

    #[arg(long, help = "Square input size the model expects, e.g. 256 or 224")]
    input_size: Option<u32>,

    #[arg(long, help = "Disease catalog JSON; the embedded catalog is used when omitted")]
    catalog: Option<PathBuf>,

    #[arg(long, help = "Model identifier reported by /health")]
    model_name: Option<String>,

    #[arg(long, help = "Image download timeout in seconds, 0 to disable")]
    fetch_timeout_secs: Option<u64>,

    #[arg(long, help = "Per-request deadline in seconds, 0 to disable")]
    request_timeout_secs: Option<u64>,

    #[arg(long, help = "Largest accepted image in bytes")]
    max_image_bytes: Option<usize>,

    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model_path) = self.model_path {
            config.model_path = model_path;
        }
        if let Some(side) = self.input_size {
            config.input_size = InputSize::square(side);
        }
        if let Some(catalog) = self.catalog {
            config.catalog_path = Some(catalog);
        }
        if let Some(model_name) = self.model_name {
            config.model_name = Some(model_name);
        }
        if let Some(secs) = self.fetch_timeout_secs {
            config.fetch_timeout_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if let Some(bytes) = self.max_image_bytes {
            config.max_image_bytes = bytes;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config.validate()?;
        Ok(config)
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;
    server::init_logging(config.log_filter()?);

    // The model must be loaded before the socket is bound.
    let app_state = AppState::from_config(&config).map_err(|e| {
        log::error!("Startup failed: {:#}", e);
        e
    })?;

    server::startup(config, app_state)
        .await
        .context("server terminated")
}
