use anyhow::{bail, Context, Result};
use jambda_models::Payload;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Reads a prebuilt archive from disk.
pub async fn payload_from_file(path: &Path) -> Result<Payload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading payload {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "function.zip".to_string());

    Ok(Payload::new(file_name, bytes))
}

/// Zips a function directory into an upload payload.
///
/// The platform runs the archive's `bootstrap` executable, so a directory
/// without one is rejected before anything is uploaded.
pub fn payload_from_dir(path: &Path) -> Result<Payload> {
    if !path.join("bootstrap").is_file() {
        bail!("{} does not contain a bootstrap executable", path.display());
    }

    let bytes = zip_dir(path)?;
    let file_name = path
        .file_name()
        .map(|name| format!("{}.zip", name.to_string_lossy()))
        .unwrap_or_else(|| "function.zip".to_string());

    Ok(Payload::new(file_name, bytes))
}

/// Create a ZIP archive from a directory
pub fn zip_dir(path: &Path) -> Result<Vec<u8>> {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut zip_data));
        add_dir_to_zip(&mut zip, path, "")?;
        zip.finish()?;
    }
    Ok(zip_data)
}

fn add_dir_to_zip(
    zip: &mut ZipWriter<std::io::Cursor<&mut Vec<u8>>>,
    dir_path: &Path,
    zip_path: &str,
) -> Result<()> {
    let mut entries = std::fs::read_dir(dir_path)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name_str = name.to_string_lossy();

        let new_zip_path = if zip_path.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", zip_path, name_str)
        };

        if path.is_dir() {
            add_dir_to_zip(zip, &path, &new_zip_path)?;
        } else {
            let content = std::fs::read(&path)?;
            zip.start_file(&new_zip_path, file_options(&path)?)?;
            zip.write_all(&content)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn file_options(path: &Path) -> Result<FileOptions> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode();
    Ok(FileOptions::default().unix_permissions(mode))
}

#[cfg(not(unix))]
fn file_options(_path: &Path) -> Result<FileOptions> {
    Ok(FileOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn zips_directory_with_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bootstrap"), b"#!/bin/sh\necho hi\n").unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib").join("data.txt"), b"data").unwrap();

        let payload = payload_from_dir(dir.path()).unwrap();
        assert!(payload.file_name.ends_with(".zip"));

        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(payload.bytes.to_vec())).unwrap();
        let mut bootstrap = String::new();
        archive
            .by_name("bootstrap")
            .unwrap()
            .read_to_string(&mut bootstrap)
            .unwrap();
        assert!(bootstrap.contains("echo hi"));
        assert!(archive.by_name("lib/data.txt").is_ok());
    }

    #[test]
    fn rejects_directory_without_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.go"), b"package main").unwrap();

        let err = payload_from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("bootstrap"));
    }

    #[tokio::test]
    async fn reads_archive_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.zip");
        std::fs::write(&path, b"PK\x03\x04fake").unwrap();

        let payload = payload_from_file(&path).await.unwrap();
        assert_eq!(payload.file_name, "hello.zip");
        assert_eq!(payload.len(), 8);
    }
}
