use anyhow::Result;

use quadspin_engine::logging::{LoggingConfig, init_logging};
use quadspin_engine::render::RendererConfig;
use quadspin_engine::window::{Runtime, RuntimeConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig::default();
    log::info!(
        "starting {} ({}x{})",
        config.title,
        config.initial_size.width,
        config.initial_size.height
    );

    Runtime::run(config, RendererConfig::default())
}
