//! Side-channel media output (images, drawings, equations).
//!
//! File names come from a per-call [`NamingContext`]; nothing is shared
//! between conversions. Concurrent conversions must use distinct media roots.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Directory for extracted raster images.
pub const IMAGE_DIR: &str = "images";
/// Directory for extracted drawings (charts, shapes).
pub const DRAWING_DIR: &str = "drawings";
/// Directory for extracted equations.
pub const EQUATION_DIR: &str = "equations";

/// Zero-based counters for media file names within one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingContext {
    /// Index of the next `image_{n}` file
    pub next_image_index: u32,
    /// Index of the next `drawing_{n}` file
    pub next_drawing_index: u32,
    /// Index of the next `equation_{n}` file
    pub next_equation_index: u32,
}

impl NamingContext {
    /// Create a fresh context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next image file name.
    pub fn next_image_name(&mut self, ext: &str) -> String {
        let name = format!("image_{}.{}", self.next_image_index, ext);
        self.next_image_index += 1;
        name
    }

    /// Reserve the next drawing file name.
    pub fn next_drawing_name(&mut self, ext: &str) -> String {
        let name = format!("drawing_{}.{}", self.next_drawing_index, ext);
        self.next_drawing_index += 1;
        name
    }

    /// Reserve the next equation file name.
    pub fn next_equation_name(&mut self, ext: &str) -> String {
        let name = format!("equation_{}.{}", self.next_equation_index, ext);
        self.next_equation_index += 1;
        name
    }
}

/// Where media files are written and how Markdown links refer to them.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    link_prefix: String,
}

impl MediaStore {
    /// Store media under `root`; links are relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            link_prefix: String::new(),
        }
    }

    /// Prefix prepended to every link (e.g. `"report_media/"`).
    pub fn with_link_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.link_prefix = prefix.into();
        self
    }

    /// Root directory for media output.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Link to a media directory, with trailing slash.
    pub fn dir_link(&self, dir: &str) -> String {
        format!("{}{}/", self.link_prefix, dir)
    }

    /// Write one file into `dir` and return its path on disk and its link.
    pub fn write(&self, dir: &str, name: &str, bytes: &[u8]) -> Result<(PathBuf, String)> {
        let dir_path = self.root.join(dir);
        fs::create_dir_all(&dir_path)?;
        let path = dir_path.join(name);
        fs::write(&path, bytes)?;
        log::debug!("Wrote media file {} ({} bytes)", path.display(), bytes.len());
        Ok((path, format!("{}{}/{}", self.link_prefix, dir, name)))
    }
}

impl Default for MediaStore {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Guess a file extension from an image's byte signature.
pub fn image_extension(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    let ext = match format {
        image::ImageFormat::Jpeg => "jpeg",
        other => other.extensions_str().first().copied()?,
    };
    Some(ext)
}
