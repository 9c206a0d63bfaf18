//! Sources of captured screenshots
//!
//! The browser driver lives outside this crate. Whatever drives the browser
//! only has to leave PNG files behind; a [`BrowserCamera`] hands them to the
//! runner by test case name.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use tracing::debug;

use crate::error::{VisualError, VisualResult};

/// A captured screenshot waiting to be checked
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub image: RgbaImage,
    /// Encoded bytes as captured, kept for the artifact store
    pub png: Vec<u8>,
}

impl Candidate {
    pub fn from_png(name: impl Into<String>, png: Vec<u8>) -> VisualResult<Self> {
        let name = name.into();
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|e| VisualError::ScreenshotUnreadable {
                name: name.clone(),
                reason: e.to_string(),
            })?
            .to_rgba8();
        Ok(Self { name, image, png })
    }
}

/// Provides screenshots captured by an external browser driver.
///
/// Implementations may block on file or network IO; the runner only calls
/// them from `tokio::task::spawn_blocking`.
pub trait BrowserCamera: Send + Sync {
    /// Screenshot taken for a test case, `None` when it was never captured
    fn capture(&self, test_case: &str) -> VisualResult<Option<Candidate>>;

    /// Names of every test case with a capture available
    fn list(&self) -> VisualResult<Vec<String>>;
}

/// Reads `<prefix><test case>.png` files from a directory
#[derive(Debug, Clone)]
pub struct DirectoryCamera {
    dir: PathBuf,
    prefix: String,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, test_case: &str) -> PathBuf {
        self.dir.join(format!("{}{}.png", self.prefix, test_case))
    }
}

impl BrowserCamera for DirectoryCamera {
    fn capture(&self, test_case: &str) -> VisualResult<Option<Candidate>> {
        let path = self.path_for(test_case);
        if !path.is_file() {
            debug!("No capture for '{}' at {}", test_case, path.display());
            return Ok(None);
        }

        let png = std::fs::read(&path)?;
        Candidate::from_png(test_case, png).map(Some)
    }

    fn list(&self) -> VisualResult<Vec<String>> {
        let mut names = Vec::new();

        if !self.dir.is_dir() {
            return Ok(names);
        }

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();

            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Some(name) = stem.strip_prefix(self.prefix.as_str()) {
                        if !name.is_empty() {
                            names.push(name.to_string());
                        }
                    }
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    fn write_png(path: &Path, color: [u8; 4]) {
        RgbaImage::from_pixel(3, 2, Rgba(color)).save(path).unwrap();
    }

    #[test]
    fn test_capture_and_list_with_prefix() {
        let tmp = TempDir::new().unwrap();
        write_png(&tmp.path().join("shop-cart.png"), [1, 2, 3, 255]);
        write_png(&tmp.path().join("shop-login.png"), [4, 5, 6, 255]);
        write_png(&tmp.path().join("other.png"), [7, 8, 9, 255]);
        std::fs::write(tmp.path().join("shop-notes.txt"), "x").unwrap();

        let camera = DirectoryCamera::new(tmp.path()).with_prefix("shop-");
        assert_eq!(camera.list().unwrap(), vec!["cart", "login"]);

        let cart = camera.capture("cart").unwrap().unwrap();
        assert_eq!(cart.name, "cart");
        assert_eq!(cart.image.dimensions(), (3, 2));
        assert_eq!(*cart.image.get_pixel(0, 0), Rgba([1, 2, 3, 255]));

        assert!(camera.capture("missing").unwrap().is_none());
    }

    #[test]
    fn test_unreadable_capture_is_an_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.png"), b"not a png").unwrap();

        let camera = DirectoryCamera::new(tmp.path());
        assert!(matches!(
            camera.capture("broken"),
            Err(VisualError::ScreenshotUnreadable { .. })
        ));
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let camera = DirectoryCamera::new("/nonexistent/patternwatch/captures");
        assert!(camera.list().unwrap().is_empty());
    }
}
