use anyhow::{bail, Context, Result};
use rnn_fixtures::fixture::{self, ALL_FIXTURES, VERIFY_TOLERANCE};
use rnn_fixtures::TensorBundle;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Library logs go to stderr, results to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut failures = Vec::new();

    for spec in &ALL_FIXTURES {
        let file_name = spec.file_name();
        let path = Path::new(&file_name);
        if !path.exists() {
            println!("{:<22} missing", spec.name);
            failures.push(spec.name);
            continue;
        }

        let bundle =
            TensorBundle::load(path).with_context(|| format!("loading {}", path.display()))?;
        // Checks the file really holds this fixture before comparing numbers
        let report = fixture::verify_as(spec, &bundle)
            .with_context(|| format!("verifying {}", spec.name))?;

        let status = if report.passed(VERIFY_TOLERANCE) { "ok" } else { "FAILED" };
        println!("{:<22} max diff: {:e} {}", spec.name, report.max_diff(), status);
        if !report.passed(VERIFY_TOLERANCE) {
            failures.push(spec.name);
        }
    }

    if !failures.is_empty() {
        bail!("{} fixture(s) failed: {}", failures.len(), failures.join(", "));
    }
    Ok(())
}
