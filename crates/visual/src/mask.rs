//! Pixel mask built from blind regions

use patternwatch_common::BlindRegion;

/// Union of blind regions rasterized onto a `width` x `height` canvas.
///
/// Regions reaching past the canvas are clipped. Because the mask is a plain
/// union, the order in which regions are supplied has no effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
    masked: u64,
}

impl RegionMask {
    pub fn new(width: u32, height: u32, regions: &[BlindRegion]) -> Self {
        let mut bits = vec![false; width as usize * height as usize];
        let mut masked = 0u64;

        for region in regions {
            let x_end = region.right().min(width);
            let y_end = region.bottom().min(height);
            for y in region.y().min(height)..y_end {
                let row = y as usize * width as usize;
                for x in region.x().min(width)..x_end {
                    let bit = &mut bits[row + x as usize];
                    if !*bit {
                        *bit = true;
                        masked += 1;
                    }
                }
            }
        }

        Self {
            width,
            height,
            bits,
            masked,
        }
    }

    /// Mask with nothing excluded
    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(width, height, &[])
    }

    /// Mask excluding every pixel of the canvas
    pub fn full(width: u32, height: u32) -> Self {
        let total = width as usize * height as usize;
        Self {
            width,
            height,
            bits: vec![true; total],
            masked: total as u64,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the pixel is excluded. Pixels off the canvas never are.
    pub fn is_masked(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y as usize * self.width as usize + x as usize]
    }

    pub fn masked_count(&self) -> u64 {
        self.masked
    }

    pub fn total(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn covers_all(&self) -> bool {
        self.masked == self.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: u32, y: u32, w: u32, h: u32) -> BlindRegion {
        BlindRegion::new(x, y, w, h).unwrap()
    }

    #[test]
    fn test_overlapping_regions_counted_once() {
        let mask = RegionMask::new(10, 10, &[region(0, 0, 4, 4), region(2, 2, 4, 4)]);
        assert_eq!(mask.masked_count(), 16 + 16 - 4);
        assert!(mask.is_masked(0, 0));
        assert!(mask.is_masked(5, 5));
        assert!(!mask.is_masked(6, 6));
        assert!(!mask.is_masked(5, 0));
    }

    #[test]
    fn test_regions_clipped_to_canvas() {
        let mask = RegionMask::new(5, 5, &[region(3, 3, 10, 10), region(40, 40, 2, 2)]);
        assert_eq!(mask.masked_count(), 4);
        assert!(!mask.is_masked(40, 40));
    }

    #[test]
    fn test_order_does_not_matter() {
        let a = region(1, 1, 3, 2);
        let b = region(2, 0, 2, 5);
        let c = region(0, 4, 6, 1);
        let forward = RegionMask::new(6, 6, &[a, b, c]);
        let backward = RegionMask::new(6, 6, &[c, b, a]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_covers_all() {
        assert!(RegionMask::new(4, 3, &[region(0, 0, 4, 3)]).covers_all());
        assert!(RegionMask::new(4, 3, &[region(0, 0, 2, 3), region(2, 0, 9, 9)]).covers_all());
        assert!(!RegionMask::new(4, 3, &[region(0, 0, 4, 2)]).covers_all());
        assert!(!RegionMask::empty(4, 3).covers_all());
        assert!(RegionMask::empty(0, 0).covers_all());
    }

    #[test]
    fn test_full_mask() {
        let mask = RegionMask::full(7, 3);
        assert!(mask.covers_all());
        assert_eq!(mask.masked_count(), 21);
        assert!(mask.is_masked(6, 2));
        assert!(!mask.is_masked(7, 0));
    }
}
