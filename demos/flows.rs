use eyre::Result;
use gswflow::prelude::*;

/// Runs the six-way comparison with the settings in `demos/flows.toml`,
/// or the file given as the first argument.
fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/flows.toml".to_string());
    let result = run(&path)?;

    for (index, flow) in result.flows.iter().enumerate() {
        match result.metrics.last(index) {
            Some(distance) => tracing::info!("{}: final W2 {:.4}", flow.name(), distance),
            None => tracing::warn!("{}: no finite distance recorded", flow.name()),
        }
    }
    Ok(())
}
