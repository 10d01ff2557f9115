//! Reading and writing z-stacks as directories of 2D grayscale slices.
//!
//! - `load_channel`: every image in a directory, sorted by filename, becomes one z-plane.
//! - `save_labels`: a label volume as 16-bit PNG slices.
//! - `save_intensity`: an intensity volume as 16-bit PNG slices.
//! - `write_json_file`: pretty-print a serializable value to disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colocalization::{IntensityVolume, LabelVolume, Volume};
use image::{ImageBuffer, Luma};
use log::debug;
use serde::Serialize;

const SLICE_EXTENSIONS: [&str; 5] = ["png", "tif", "tiff", "jpg", "jpeg"];

fn slice_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let is_slice = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SLICE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_slice {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Loads a channel stored as one image per z-plane.
pub fn load_channel(dir: &Path) -> Result<IntensityVolume> {
    let paths = slice_paths(dir)?;
    if paths.is_empty() {
        bail!("no image slices found in {}", dir.display());
    }

    let mut size = None;
    let mut planes = Vec::with_capacity(paths.len());
    for path in &paths {
        let slice = image::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?
            .into_luma16();
        let dims = (slice.height() as usize, slice.width() as usize);
        match size {
            None => size = Some(dims),
            Some(expected) if expected != dims => bail!(
                "{} is {}x{}, expected {}x{}",
                path.display(),
                dims.1,
                dims.0,
                expected.1,
                expected.0
            ),
            Some(_) => {}
        }
        planes.push(slice.into_raw().into_iter().map(f32::from).collect());
    }

    let (size_y, size_x) = size.unwrap_or((0, 0));
    debug!("{}: {} slices of {}x{}", dir.display(), planes.len(), size_x, size_y);
    Ok(Volume::from_planes(size_y, size_x, planes)?)
}

fn save_slices<T: Copy>(
    volume: &Volume<T>,
    dir: &Path,
    prefix: &str,
    to_u16: impl Fn(T) -> u16,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let (size_z, size_y, size_x) = volume.shape();
    for z in 0..size_z {
        let raw: Vec<u16> = volume.plane(z).iter().map(|&v| to_u16(v)).collect();
        let slice = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(size_x as u32, size_y as u32, raw)
            .context("slice buffer does not match its dimensions")?;
        let path = dir.join(format!("{prefix}_z{z:04}.png"));
        slice
            .save(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
    }
    Ok(())
}

/// Writes labels as 16-bit slices.
///
/// # Errors
/// Fails before writing anything when a label does not fit in 16 bits, as
/// distinct objects would otherwise collapse onto one value.
pub fn save_labels(labels: &LabelVolume, dir: &Path, prefix: &str) -> Result<()> {
    let max_label = labels.max_label();
    if max_label > u16::MAX as u32 {
        bail!(
            "label {max_label} does not fit in a 16-bit slice (at most {} objects can be written)",
            u16::MAX
        );
    }
    save_slices(labels, dir, prefix, |l| l as u16)
}

/// Writes intensities as 16-bit slices, clamped to the `u16` range.
pub fn save_intensity(volume: &IntensityVolume, dir: &Path, prefix: &str) -> Result<()> {
    save_slices(volume, dir, prefix, |v| v.round().clamp(0.0, u16::MAX as f32) as u16)
}

pub fn write_json_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use colocalization::synthetic::cube_volume;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("colocalize-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn slices_reload_in_plane_order() {
        let dir = scratch_dir("reload");
        let volume = cube_volume((5, 6, 7), (1, 2, 3), 2, 4000.0, 12.0);
        save_intensity(&volume, &dir, "slice").unwrap();
        // Unrelated files are ignored.
        fs::write(dir.join("notes.txt"), "z-stack").unwrap();

        let loaded = load_channel(&dir).unwrap();
        assert_eq!(loaded, volume);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn labels_beyond_16_bits_are_rejected() {
        let dir = scratch_dir("labels");
        let mut labels = LabelVolume::filled(1, 2, 2, 0);
        labels.set(0, 0, 0, u16::MAX as u32);
        save_labels(&labels, &dir, "labels").unwrap();
        let written = load_channel(&dir).unwrap();
        assert_eq!(written.get(0, 0, 0), Some(u16::MAX as f32));

        labels.set(0, 1, 1, u16::MAX as u32 + 1);
        let other = scratch_dir("labels-overflow");
        assert!(save_labels(&labels, &other, "labels").is_err());
        assert!(!other.exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = scratch_dir("empty");
        fs::create_dir_all(&dir).unwrap();
        assert!(load_channel(&dir).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
