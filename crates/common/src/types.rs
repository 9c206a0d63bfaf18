//! Core types for PatternWatch

use crate::{Error, Result};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use uuid::Uuid;

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Grouping of related test cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

/// A workflow or screen covered by patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub category_id: String,
    pub name: String,
    pub created_at: i64,
}

/// Normalized browser identifier (`chrome`, `firefox`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BrowserName(String);

impl BrowserName {
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let normalized = name.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(Error::InvalidBrowser(name.as_ref().to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BrowserName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BrowserName> for String {
    fn from(name: BrowserName) -> Self {
        name.0
    }
}

impl std::str::FromStr for BrowserName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl std::fmt::Display for BrowserName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rectangle excluded from visual comparison.
///
/// Regions are validated when they are built and cannot be changed
/// afterwards; deserialization goes through the same checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RegionBounds", into = "RegionBounds")]
pub struct BlindRegion {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

#[derive(Serialize, Deserialize)]
struct RegionBounds {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl BlindRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidRegion(format!(
                "{}x{} at ({}, {}) has an empty side",
                width, height, x, y
            )));
        }
        if x.checked_add(width).is_none() || y.checked_add(height).is_none() {
            return Err(Error::InvalidRegion(format!(
                "{}x{} at ({}, {}) overflows the coordinate space",
                width, height, x, y
            )));
        }
        Ok(Self { x, y, width, height })
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Whether the region lies entirely inside a `width` x `height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }
}

impl TryFrom<RegionBounds> for BlindRegion {
    type Error = Error;

    fn try_from(b: RegionBounds) -> Result<Self> {
        Self::new(b.x, b.y, b.width, b.height)
    }
}

impl From<BlindRegion> for RegionBounds {
    fn from(r: BlindRegion) -> Self {
        Self {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
        }
    }
}

impl std::str::FromStr for BlindRegion {
    type Err = Error;

    /// Parses `x,y,width,height`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(Error::InvalidRegion(format!(
                "expected x,y,width,height but got {:?}",
                s
            )));
        }
        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| Error::InvalidRegion(format!("{:?} is not a coordinate", part)))?;
        }
        Self::new(values[0], values[1], values[2], values[3])
    }
}

impl std::fmt::Display for BlindRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Encoded reference image of a pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternScreenshot {
    /// SHA-256 of the PNG bytes
    pub hash: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing, default)]
    pub png: Vec<u8>,
}

impl PatternScreenshot {
    /// Build from encoded PNG data, reading the dimensions from the image
    pub fn from_png(png: Vec<u8>) -> Result<Self> {
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?;
        Ok(Self {
            hash: sha256_hex(&png),
            width: image.width(),
            height: image.height(),
            png,
        })
    }

    /// Encode a decoded image as PNG
    pub fn from_image(image: &RgbaImage) -> Result<Self> {
        let png = encode_png(image)?;
        Ok(Self {
            hash: sha256_hex(&png),
            width: image.width(),
            height: image.height(),
            png,
        })
    }

    pub fn decode(&self) -> Result<RgbaImage> {
        Ok(image::load_from_memory_with_format(&self.png, ImageFormat::Png)?.to_rgba8())
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Baseline image tied to a (test case, browser) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserPattern {
    pub id: String,
    pub test_case_id: String,
    pub test_case_name: String,
    pub category_id: String,
    pub browser_name: BrowserName,
    /// Regions in creation order
    pub blind_regions: Vec<BlindRegion>,
    pub screenshot: PatternScreenshot,
    pub active: bool,
    pub created_at: i64,
}

/// Outcome of checking one screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    NoPattern,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::Failed => "failed",
            Verdict::NoPattern => "no_pattern",
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "passed" => Ok(Verdict::Passed),
            "failed" => Ok(Verdict::Failed),
            "no_pattern" => Ok(Verdict::NoPattern),
            other => Err(Error::Internal(format!("unknown verdict {:?}", other))),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One automated comparison run over a category for a browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSession {
    pub id: String,
    pub category_id: String,
    pub browser_name: BrowserName,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub passed: u32,
    pub failed: u32,
    pub missing: u32,
}

/// Recorded outcome for one screenshot inside a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub session_id: String,
    pub test_case_name: String,
    pub browser_name: BrowserName,
    pub verdict: Verdict,
    pub pattern_id: Option<String>,
    pub diff_percent: Option<f64>,
    /// Artifact-store digest of the captured screenshot
    pub screenshot_digest: Option<String>,
    /// Artifact-store digest of the highlighted diff image
    pub diff_digest: Option<String>,
    pub message: Option<String>,
    pub created_at: i64,
}

impl TestResult {
    pub fn new(session_id: &str, test_case_name: &str, browser_name: &BrowserName, verdict: Verdict) -> Self {
        Self {
            id: new_id(),
            session_id: session_id.to_string(),
            test_case_name: test_case_name.to_string(),
            browser_name: browser_name.clone(),
            verdict,
            pattern_id: None,
            diff_percent: None,
            screenshot_digest: None,
            diff_digest: None,
            message: None,
            created_at: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 0, 0, 10 ; "zero width")]
    #[test_case(0, 0, 10, 0 ; "zero height")]
    #[test_case(u32::MAX, 0, 1, 1 ; "x overflow")]
    #[test_case(0, u32::MAX - 1, 1, 2 ; "y overflow")]
    fn test_region_rejects_malformed_bounds(x: u32, y: u32, w: u32, h: u32) {
        assert!(matches!(BlindRegion::new(x, y, w, h), Err(Error::InvalidRegion(_))));
    }

    #[test]
    fn test_region_edges() {
        let r = BlindRegion::new(2, 3, 4, 5).unwrap();
        assert_eq!(r.right(), 6);
        assert_eq!(r.bottom(), 8);
        assert!(r.contains(2, 3));
        assert!(r.contains(5, 7));
        assert!(!r.contains(6, 7));
        assert!(!r.contains(5, 8));
        assert!(r.fits_within(6, 8));
        assert!(!r.fits_within(5, 8));
    }

    #[test]
    fn test_region_parse() {
        let r: BlindRegion = "10, 20,30,40".parse().unwrap();
        assert_eq!((r.x(), r.y(), r.width(), r.height()), (10, 20, 30, 40));
        assert_eq!(r.to_string(), "10,20,30,40");
        assert!("1,2,3".parse::<BlindRegion>().is_err());
        assert!("1,2,a,4".parse::<BlindRegion>().is_err());
        assert!("1,2,0,4".parse::<BlindRegion>().is_err());
    }

    #[test]
    fn test_region_deserialize_validates() {
        let ok: BlindRegion = serde_json::from_str(r#"{"x":1,"y":1,"width":2,"height":2}"#).unwrap();
        assert_eq!(ok.width(), 2);
        let bad = serde_json::from_str::<BlindRegion>(r#"{"x":1,"y":1,"width":0,"height":2}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_browser_name_normalized() {
        let name = BrowserName::new("  Chrome ").unwrap();
        assert_eq!(name.as_str(), "chrome");
        assert!(BrowserName::new("   ").is_err());
    }

    #[test]
    fn test_screenshot_round_trip_dimensions() {
        let img = RgbaImage::from_pixel(7, 3, image::Rgba([1, 2, 3, 255]));
        let shot = PatternScreenshot::from_image(&img).unwrap();
        assert_eq!((shot.width, shot.height), (7, 3));
        assert_eq!(shot.hash, sha256_hex(&shot.png));

        let reloaded = PatternScreenshot::from_png(shot.png.clone()).unwrap();
        assert_eq!(reloaded, shot);
        assert_eq!(reloaded.decode().unwrap(), img);
    }

    #[test]
    fn test_verdict_parse() {
        for v in [Verdict::Passed, Verdict::Failed, Verdict::NoPattern] {
            assert_eq!(v.as_str().parse::<Verdict>().unwrap(), v);
        }
    }
}
