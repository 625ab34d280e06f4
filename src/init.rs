use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

pub async fn ensure_output_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        tracing::info!(tag = "INFO", "Created directory: {}", dir.display());
    }
    Ok(())
}

pub async fn check_gcloud(binary: &str) -> bool {
    match tokio::process::Command::new(binary)
        .arg("--version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
