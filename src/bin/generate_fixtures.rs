use anyhow::Result;
use rnn_fixtures::fixture::{self, ALL_FIXTURES};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Library logs go to stderr, results to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    println!("Generating {} fixtures (seed {})", ALL_FIXTURES.len(), fixture::DEFAULT_SEED);

    for spec in &ALL_FIXTURES {
        let path = fixture::write(spec, fixture::DEFAULT_SEED, Path::new("."))?;
        println!("  {:<22} -> {}", spec.name, path.display());
    }

    Ok(())
}
