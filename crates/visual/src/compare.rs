//! Screenshot comparison against baseline patterns

use image::{Pixel, Rgba, RgbaImage};
use patternwatch_common::{BlindRegion, BrowserPattern};
use serde::{Deserialize, Serialize};

use crate::error::VisualResult;
use crate::mask::RegionMask;

const DIFF_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const MASK_ALPHA: u8 = 160;

/// Tunables for deciding whether two screenshots match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonSettings {
    /// Largest per-channel difference still treated as equal
    pub channel_tolerance: u8,

    /// Share of compared pixels (0.0 - 100.0 percent) allowed to differ
    pub max_diff_percent: f64,
}

impl Default for ComparisonSettings {
    fn default() -> Self {
        Self {
            channel_tolerance: 0,
            max_diff_percent: 0.0,
        }
    }
}

/// Outcome of comparing a candidate with a baseline
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Whether the images match (within threshold)
    pub matches: bool,

    /// Percentage of compared pixels that differ
    pub diff_percent: f64,

    pub diff_pixels: u64,

    /// Pixels outside every blind region
    pub compared_pixels: u64,

    /// Pixels excluded by blind regions
    pub masked_pixels: u64,

    pub dimensions_match: bool,

    /// Highlighted difference image, only produced on mismatch
    pub diff_image: Option<RgbaImage>,
}

/// Pure pixel comparator
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    settings: ComparisonSettings,
}

impl Comparator {
    pub fn new(settings: ComparisonSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ComparisonSettings {
        &self.settings
    }

    /// Compare `candidate` against `baseline`, ignoring pixels in `regions`.
    ///
    /// Both images are laid over a canvas as large as the bigger of the two.
    /// A pixel present in only one image counts as different unless it is
    /// masked. When the regions blind the whole baseline, the whole canvas
    /// is blind and any candidate matches; `dimensions_match` still reports
    /// a size change.
    pub fn compare(
        &self,
        candidate: &RgbaImage,
        baseline: &RgbaImage,
        regions: &[BlindRegion],
    ) -> Comparison {
        let width = candidate.width().max(baseline.width());
        let height = candidate.height().max(baseline.height());
        let mask = if blinds_whole_image(baseline, regions) {
            RegionMask::full(width, height)
        } else {
            RegionMask::new(width, height, regions)
        };

        let mut diff_img = RgbaImage::new(width, height);
        let mut diff_pixels = 0u64;

        for y in 0..height {
            for x in 0..width {
                let actual = pixel_at(candidate, x, y);
                let expected = pixel_at(baseline, x, y);

                if mask.is_masked(x, y) {
                    diff_img.put_pixel(x, y, masked_shade(expected.or(actual)));
                    continue;
                }

                let differs = match (actual, expected) {
                    (Some(a), Some(b)) => self.pixels_differ(a, b),
                    _ => true,
                };

                if differs {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, DIFF_COLOR);
                } else {
                    diff_img.put_pixel(x, y, dimmed(expected.or(actual)));
                }
            }
        }

        let compared_pixels = mask.total() - mask.masked_count();
        let diff_percent = if compared_pixels == 0 {
            0.0
        } else {
            diff_pixels as f64 * 100.0 / compared_pixels as f64
        };
        let matches = diff_percent <= self.settings.max_diff_percent;

        Comparison {
            matches,
            diff_percent,
            diff_pixels,
            compared_pixels,
            masked_pixels: mask.masked_count(),
            dimensions_match: candidate.dimensions() == baseline.dimensions(),
            diff_image: if matches { None } else { Some(diff_img) },
        }
    }

    /// Compare against a stored pattern using its blind regions
    pub fn compare_pattern(
        &self,
        candidate: &RgbaImage,
        pattern: &BrowserPattern,
    ) -> VisualResult<Comparison> {
        let baseline = pattern.screenshot.decode()?;
        Ok(self.compare(candidate, &baseline, &pattern.blind_regions))
    }

    fn pixels_differ(&self, a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
        let tolerance = self.settings.channel_tolerance;
        a.channels()
            .iter()
            .zip(b.channels())
            .any(|(x, y)| x.abs_diff(*y) > tolerance)
    }
}

fn blinds_whole_image(image: &RgbaImage, regions: &[BlindRegion]) -> bool {
    image.width() > 0
        && image.height() > 0
        && RegionMask::new(image.width(), image.height(), regions).covers_all()
}

fn pixel_at(img: &RgbaImage, x: u32, y: u32) -> Option<&Rgba<u8>> {
    if x < img.width() && y < img.height() {
        Some(img.get_pixel(x, y))
    } else {
        None
    }
}

fn dimmed(pixel: Option<&Rgba<u8>>) -> Rgba<u8> {
    match pixel {
        Some(p) => Rgba([p[0] / 2, p[1] / 2, p[2] / 2, 128]),
        None => Rgba([0, 0, 0, 0]),
    }
}

/// Translucent blue overlay over the underlying pixel
fn masked_shade(pixel: Option<&Rgba<u8>>) -> Rgba<u8> {
    match pixel {
        Some(p) => Rgba([p[0] / 3, p[1] / 3, p[2] / 3 + 170, MASK_ALPHA]),
        None => Rgba([0, 0, 170, MASK_ALPHA]),
    }
}
