//! Batch ingestion command.
//!
//! Processes files sequentially (each image is already seconds of model
//! latency), prints a per-file outcome line, and finishes with a tally plus
//! a failure report so operators can see exactly which files need attention.

use anyhow::{Context, Result};
use glimpse_core::ingest::{IngestOutcome, IngestPipeline};
use glimpse_core::storage::ImageStore;
use std::path::{Path, PathBuf};

/// File extensions treated as ingestable screenshots.
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Runs batch ingestion over the given files and directories.
pub async fn run<S: ImageStore>(pipeline: &IngestPipeline<S>, paths: &[PathBuf]) -> Result<()> {
    let files = collect_image_files(paths)?;
    if files.is_empty() {
        println!("No image files found.");
        return Ok(());
    }
    println!("Found {} image file(s)", files.len());

    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut failed_files: Vec<(String, IngestOutcome)> = Vec::new();

    for (i, file) in files.iter().enumerate() {
        let name = display_name(file);
        println!("[{}/{}] Processing {}", i + 1, files.len(), name);

        let outcome = pipeline.process_image(file).await;
        match outcome {
            IngestOutcome::Duplicate => skipped += 1,
            IngestOutcome::Success => processed += 1,
            other => failed_files.push((name, other)),
        }
    }

    println!(
        "\nComplete: {} processed, {} skipped (duplicates), {} failed",
        processed,
        skipped,
        failed_files.len()
    );

    if !failed_files.is_empty() {
        println!("\nFailed files ({}):", failed_files.len());
        for (i, (name, outcome)) in failed_files.iter().enumerate() {
            println!("{:3}. {}", i + 1, name);
            println!("     Reason: {}", outcome.reason());
        }
    }

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Expands the argument list into a sorted list of image files.
///
/// Directories are scanned one level deep for known image extensions;
/// explicitly named files are taken as-is.
fn collect_image_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory: {}", path.display()))?;
            for entry in entries {
                let entry =
                    entry.with_context(|| format!("Failed to read entry in {}", path.display()))?;
                let candidate = entry.path();
                if candidate.is_file() && has_image_extension(&candidate) {
                    files.push(candidate);
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            eprintln!("Warning: {} does not exist, skipping", path.display());
        }
    }

    files.sort();
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::write(dir.path().join("b.JPG"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let files = collect_image_files(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| has_image_extension(f)));
    }

    #[test]
    fn test_collect_results_are_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("c.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();

        let files = collect_image_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files.iter().map(|f| display_name(f)).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_explicit_file_is_taken_as_is() {
        let dir = TempDir::new().unwrap();
        let odd = dir.path().join("screenshot.bmp");
        std::fs::write(&odd, b"x").unwrap();

        let files = collect_image_files(&[odd.clone()]).unwrap();
        assert_eq!(files, vec![odd]);
    }

    #[test]
    fn test_missing_path_is_skipped() {
        let files = collect_image_files(&[PathBuf::from("/no/such/dir")]).unwrap();
        assert!(files.is_empty());
    }
}
