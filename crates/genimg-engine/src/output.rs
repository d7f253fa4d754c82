use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use genimg_contracts::ImageHandle;
use image::{DynamicImage, ImageFormat};

pub const DEFAULT_OUTPUT_DIR: &str = "generated-images";

const KNOWN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const SLUG_WORDS: usize = 3;

/// Local wall-clock stamp used in generated file names.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// First few alphanumeric words of the prompt, lower-cased.
pub fn slugify(prompt: &str) -> String {
    let words: Vec<String> = prompt
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .take(SLUG_WORDS)
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        "image".to_string()
    } else {
        words.join("_")
    }
}

pub fn default_output_path(dir: &Path, prompt: &str) -> PathBuf {
    dir.join(format!("{}_{}.png", timestamp(), slugify(prompt)))
}

/// Appends `.png` unless the path already ends in a recognised image
/// extension.
pub fn ensure_extension(path: &Path) -> PathBuf {
    let known = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| KNOWN_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if known {
        return path.to_path_buf();
    }
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".png");
    PathBuf::from(raw)
}

/// `out.png` for a single image, `out_1.png`, `out_2.png`, ... otherwise.
pub fn numbered_paths(output: &Path, count: usize) -> Vec<PathBuf> {
    let output = ensure_extension(output);
    if count <= 1 {
        return vec![output];
    }
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = output
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    (1..=count)
        .map(|idx| output.with_file_name(format!("{stem}_{idx}.{ext}")))
        .collect()
}

/// Writes one image, converting the encoding when it does not match the
/// extension of `path`.
pub fn write_image(image: &ImageHandle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let target = ImageFormat::from_path(path).ok();
    let source = image::guess_format(&image.bytes).ok();
    let bytes = match (source, target) {
        (Some(source), Some(target)) if source != target => {
            tracing::debug!(?source, ?target, path = %path.display(), "re-encoding image");
            reencode(&image.bytes, target)?
        }
        _ => image.bytes.clone(),
    };
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn reencode(bytes: &[u8], target: ImageFormat) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).context("failed to decode returned image")?;
    let decoded = if target == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(decoded.to_rgb8())
    } else {
        decoded
    };
    let mut buffer = Cursor::new(Vec::new());
    decoded
        .write_to(&mut buffer, target)
        .with_context(|| format!("failed to encode image as {target:?}"))?;
    Ok(buffer.into_inner())
}

/// Persists every image of one call under names derived from `output`.
/// All or nothing: files written before a failure are removed again.
pub fn persist(images: &[ImageHandle], output: &Path) -> Result<Vec<PathBuf>> {
    let paths = numbered_paths(output, images.len());
    for (idx, (image, path)) in images.iter().zip(&paths).enumerate() {
        if let Err(err) = write_image(image, path) {
            for written in &paths[..idx] {
                if let Err(remove_err) = fs::remove_file(written) {
                    tracing::warn!(path = %written.display(), error = %remove_err, "cleanup failed");
                }
            }
            return Err(err);
        }
    }
    Ok(paths)
}
