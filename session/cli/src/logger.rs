use std::error::Error;
use std::fs::File;
use std::io;

use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::layer;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, registry};

pub fn setup_logger() -> Result<(), Box<dyn Error>> {
    LogTracer::init()?;

    // stdout carries command output
    let stderr_layer = layer()
        .pretty()
        .with_writer(io::stderr)
        .with_filter(EnvFilter::from_default_env());

    let file = File::create(std::env::temp_dir().join("walletsession-cli.log"))?;
    let formatting_layer = BunyanFormattingLayer::new("walletsession-cli".into(), file);

    set_global_default(
        registry()
            .with(stderr_layer)
            .with(formatting_layer)
            .with(JsonStorageLayer),
    )?;
    Ok(())
}
