//! Serve command handler

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tokio::runtime::Runtime;

use crate::inference::RiskPredictor;
use crate::serve::{self, ServingContext};

/// Load the model and serve until Ctrl-C
pub fn run(model: &Path, addr: &str) -> Result<()> {
    let predictor = RiskPredictor::load(model)
        .with_context(|| format!("Failed to load model {}", model.display()))?;
    let ctx = ServingContext::new(predictor);

    let rt = Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        let local = listener.local_addr().context("Failed to read bound address")?;

        eprintln!(
            "{} Serving {} on http://{}",
            style("✓").green(),
            style(model.display()).cyan(),
            style(local).cyan()
        );
        tracing::info!("Listening on {}", local);

        serve::serve(listener, ctx).await.context("Server error")
    })
}
