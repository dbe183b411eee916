use anyhow::Result;
use jambda_models::{
    DraftFunction, FunctionConfiguration, FunctionType, Payload, RuntimeImage, Trigger,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// The configuration used by most scenarios: an HTTP-triggered Go REST function.
pub fn http_config() -> FunctionConfiguration {
    FunctionConfiguration {
        trigger: Trigger::Http,
        image: RuntimeImage::Golang122,
        kind: FunctionType::Rest,
        port: 8080,
        env_vars: BTreeMap::new(),
    }
}

pub fn sample_payload() -> Payload {
    Payload::new("hello.zip", b"PK\x03\x04fake-archive".to_vec())
}

/// A complete, valid create-flow draft.
pub fn valid_draft(name: &str) -> DraftFunction {
    let mut draft = DraftFunction::new();
    draft.name = name.to_string();
    draft.payload = Some(sample_payload());
    draft.config.trigger = "http".to_string();
    draft.config.image = "golang:1.22".to_string();
    draft.config.kind = "REST".to_string();
    draft.config.port = "8080".to_string();
    draft
}

/// A function directory with a `bootstrap` file and one nested asset.
pub fn function_dir() -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    write_file(&dir.path().join("bootstrap"), b"#!/bin/sh\necho hello\n")?;
    std::fs::create_dir(dir.path().join("assets"))?;
    write_file(&dir.path().join("assets").join("greeting.txt"), b"hello")?;
    Ok(dir)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents)?;
    Ok(())
}

/// Waits until `condition` holds, checking every few milliseconds.
pub async fn wait_for(
    what: &str,
    within: Duration,
    mut condition: impl FnMut() -> bool,
) -> Result<()> {
    let polling = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(within, polling)
        .await
        .map_err(|_| anyhow::anyhow!("timed out after {within:?} waiting for {what}"))
}
