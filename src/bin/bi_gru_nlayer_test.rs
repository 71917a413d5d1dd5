use anyhow::Result;
use rnn_fixtures::fixture::{self, BI_GRU_NLAYER_TEST};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let path = fixture::write(&BI_GRU_NLAYER_TEST, fixture::DEFAULT_SEED, Path::new("."))?;
    println!("wrote {}", path.display());
    Ok(())
}
