//! Grey-level plane and the pixel statistics the classifier is built from.

use image::RgbaImage;

/// Per-pixel variance below which a region carries no structure.
const MIN_VARIANCE: f32 = 1e-4;

/// Pixel rectangle inside a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl Rect {
    #[inline]
    pub fn new(x: usize, y: usize, w: usize, h: usize) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.w * self.h
    }

    /// Rows `[from, to)` given as fractions of the height.
    pub fn rows(&self, from: f32, to: f32) -> Rect {
        let y0 = (self.h as f32 * from).round() as usize;
        let y1 = ((self.h as f32 * to).round() as usize).clamp(y0, self.h);
        Rect::new(self.x, self.y + y0, self.w, y1 - y0)
    }
}

/// Luma in [0, 1], row-major.
#[derive(Debug, Clone)]
pub struct Luma {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Luma {
    /// Rec. 601 luma of an RGBA image.
    pub fn from_rgba(img: &RgbaImage) -> Self {
        let data = img
            .pixels()
            .map(|p| (0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32) / 255.0)
            .collect();
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn full(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    fn pixels(&self, r: Rect) -> impl Iterator<Item = f32> + '_ {
        (r.y..r.y + r.h).flat_map(move |y| (r.x..r.x + r.w).map(move |x| self.at(x, y)))
    }

    /// Mean and standard deviation of a region.
    pub fn mean_std(&self, r: Rect) -> (f32, f32) {
        let n = r.area().max(1) as f32;
        let mean = self.pixels(r).sum::<f32>() / n;
        let var = self.pixels(r).map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        (mean, var.sqrt())
    }

    /// Normalized cross-correlation of two equally sized regions.
    ///
    /// `None` when either region is (nearly) flat, since correlation is then
    /// meaningless.
    pub fn ncc(&self, a: Rect, b: Rect) -> Option<f32> {
        debug_assert_eq!((a.w, a.h), (b.w, b.h));
        let n = a.area();
        if n == 0 {
            return None;
        }
        let (ma, _) = self.mean_std(a);
        let (mb, _) = self.mean_std(b);

        let (mut cov, mut va, mut vb) = (0.0f32, 0.0f32, 0.0f32);
        for (pa, pb) in self.pixels(a).zip(self.pixels(b)) {
            let (da, db) = (pa - ma, pb - mb);
            cov += da * db;
            va += da * da;
            vb += db * db;
        }

        let floor = MIN_VARIANCE * n as f32;
        if va < floor || vb < floor {
            return None;
        }
        Some((cov / (va * vb).sqrt()).clamp(-1.0, 1.0))
    }

    /// Best NCC between `a` and `b` over horizontal shifts in
    /// `-max_shift..=max_shift`, as `(shift, ncc)`.
    ///
    /// A shift `d` pairs `a(x)` with `b(x - d)`. Shifts are tried in order of
    /// increasing magnitude and only a strictly better score replaces the
    /// current best, so ties resolve towards zero.
    pub fn best_shift(&self, a: Rect, b: Rect, max_shift: usize) -> Option<(i32, f32)> {
        let max_shift = max_shift.min(a.w.saturating_sub(1));
        let mut best: Option<(i32, f32)> = None;

        let shifts = std::iter::once(0i32)
            .chain((1..=max_shift as i32).flat_map(|d| [d, -d]));
        for d in shifts {
            let m = d.unsigned_abs() as usize;
            let w = a.w - m;
            let (ax, bx) = if d >= 0 { (a.x + m, b.x) } else { (a.x, b.x + m) };
            let score = self.ncc(Rect::new(ax, a.y, w, a.h), Rect::new(bx, b.y, w, b.h));

            if let Some(s) = score {
                if best.map_or(true, |(_, bs)| s > bs + 1e-4) {
                    best = Some((d, s));
                }
            }
        }
        best
    }

    /// Mean absolute difference between horizontally adjacent pixels.
    pub fn horizontal_gradient(&self, r: Rect) -> f32 {
        if r.w < 2 || r.h == 0 {
            return 0.0;
        }
        let mut sum = 0.0f32;
        for y in r.y..r.y + r.h {
            for x in r.x..r.x + r.w - 1 {
                sum += (self.at(x + 1, y) - self.at(x, y)).abs();
            }
        }
        sum / ((r.w - 1) * r.h) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{noise, side_by_side};
    use image::{Rgba, RgbaImage};

    #[test]
    fn identical_regions_correlate_perfectly() {
        let luma = Luma::from_rgba(&side_by_side(40, 20, 0, 7));
        let ncc = luma
            .ncc(Rect::new(0, 0, 20, 20), Rect::new(20, 0, 20, 20))
            .unwrap();
        assert!((ncc - 1.0).abs() < 1e-4);
    }

    #[test]
    fn flat_regions_are_uninformative() {
        let luma = Luma::from_rgba(&RgbaImage::from_pixel(10, 10, Rgba([90, 90, 90, 255])));
        assert_eq!(luma.ncc(Rect::new(0, 0, 5, 10), Rect::new(5, 0, 5, 10)), None);
        let (mean, std) = luma.mean_std(luma.full());
        assert!((mean - 90.0 / 255.0).abs() < 1e-5);
        assert!(std < 1e-5);
    }

    #[test]
    fn best_shift_recovers_disparity() {
        for disparity in [-3, -1, 0, 2] {
            let luma = Luma::from_rgba(&side_by_side(80, 30, disparity, 11));
            let (shift, score) = luma
                .best_shift(Rect::new(0, 0, 40, 30), Rect::new(40, 0, 40, 30), 4)
                .unwrap();
            assert_eq!(shift, disparity);
            assert!(score > 0.99);
        }
    }

    #[test]
    fn independent_noise_is_uncorrelated() {
        let luma = Luma::from_rgba(&noise(100, 100, 3));
        let ncc = luma
            .ncc(Rect::new(0, 0, 50, 100), Rect::new(50, 0, 50, 100))
            .unwrap();
        assert!(ncc.abs() < 0.1);
    }

    #[test]
    fn rows_select_fractional_bands() {
        let r = Rect::new(0, 0, 10, 100).rows(0.9, 1.0);
        assert_eq!((r.y, r.h), (90, 10));
    }
}
