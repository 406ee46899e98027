//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The image is divided into a `tile_grid × tile_grid` grid. Each tile
//! gets its own equalization lookup table built from a clipped histogram,
//! and every output pixel blends the tables of the four nearest tile
//! centres bilinearly, which hides tile seams.
//!
//! When the image size is not a multiple of the grid, histograms are
//! gathered from a copy padded on the right and bottom by mirror
//! reflection (edge pixel not repeated), so every tile has the same area.

use image::GrayImage;

const BINS: usize = 256;

/// Mirror an out-of-range index back into `0..n` without repeating the
/// edge sample (`dcb|abcd|cba`).
const fn reflect_101(i: u32, n: u32) -> u32 {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let i = i % period;
    if i < n { i } else { period - i }
}

/// Clip a histogram at `clip` and spread the clipped mass over all bins.
///
/// The excess is divided evenly; what does not divide is added one count
/// at a time, walking the bins with a fixed stride.
fn clip_histogram(hist: &mut [u32; BINS], clip: u32) {
    let mut excess: u32 = 0;
    for h in hist.iter_mut() {
        if *h > clip {
            excess += *h - clip;
            *h = clip;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let bins = BINS as u32;
    let batch = excess / bins;
    let mut residual = excess - batch * bins;
    for h in hist.iter_mut() {
        *h += batch;
    }

    if residual > 0 {
        let step = (bins / residual).max(1) as usize;
        let mut i = 0;
        while i < BINS && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

/// Build the equalization table for one clipped histogram.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn build_lut(hist: &[u32; BINS], tile_area: u32) -> [u8; BINS] {
    let scale = 255.0 / f64::from(tile_area);
    let mut lut = [0u8; BINS];
    let mut sum: u32 = 0;
    for (out, &h) in lut.iter_mut().zip(hist) {
        sum += h;
        *out = (f64::from(sum) * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Map a pixel coordinate to the two tiles it interpolates between and
/// the weight of the second.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn tile_neighbours(pos: u32, tile_size: u32, tiles: u32) -> (usize, usize, f32) {
    let t = pos as f32 / tile_size as f32 - 0.5;
    let lo = t.floor();
    let weight = t - lo;
    let last = i64::from(tiles) - 1;
    let lo = lo as i64;
    let first = lo.clamp(0, last);
    let second = (lo + 1).clamp(0, last);
    (first as usize, second as usize, weight)
}

/// Apply CLAHE to a grayscale image.
///
/// `clip_limit` is relative to a uniform histogram: a bin may hold at most
/// `clip_limit * tile_area / 256` counts (never less than one). Output has
/// the same dimensions as the input and is fully deterministic.
///
/// Empty images and a zero `tile_grid` return a copy of the input.
#[must_use = "returns the contrast-enhanced image"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn enhance_contrast(gray: &GrayImage, clip_limit: f32, tile_grid: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 || tile_grid == 0 {
        return gray.clone();
    }

    let padded_w = w.div_ceil(tile_grid) * tile_grid;
    let padded_h = h.div_ceil(tile_grid) * tile_grid;
    let tile_w = padded_w / tile_grid;
    let tile_h = padded_h / tile_grid;
    let tile_area = tile_w * tile_h;

    let clip = if clip_limit > 0.0 {
        ((f64::from(clip_limit) * f64::from(tile_area) / BINS as f64) as u32).max(1)
    } else {
        u32::MAX
    };

    let grid = tile_grid as usize;
    let mut luts = vec![[0u8; BINS]; grid * grid];
    for ty in 0..tile_grid {
        for tx in 0..tile_grid {
            let mut hist = [0u32; BINS];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let sy = reflect_101(y, h);
                for x in tx * tile_w..(tx + 1) * tile_w {
                    let sx = reflect_101(x, w);
                    hist[usize::from(gray.get_pixel(sx, sy).0[0])] += 1;
                }
            }
            if clip < tile_area {
                clip_histogram(&mut hist, clip);
            }
            luts[ty as usize * grid + tx as usize] = build_lut(&hist, tile_area);
        }
    }

    let columns: Vec<(usize, usize, f32)> = (0..w)
        .map(|x| tile_neighbours(x, tile_w, tile_grid))
        .collect();

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let (ty1, ty2, ya) = tile_neighbours(y, tile_h, tile_grid);
        let top = ty1 * grid;
        let bottom = ty2 * grid;
        for (x, &(tx1, tx2, xa)) in columns.iter().enumerate() {
            let x = x as u32;
            let v = usize::from(gray.get_pixel(x, y).0[0]);
            let upper = f32::from(luts[top + tx1][v])
                .mul_add(1.0 - xa, f32::from(luts[top + tx2][v]) * xa);
            let lower = f32::from(luts[bottom + tx1][v])
                .mul_add(1.0 - xa, f32::from(luts[bottom + tx2][v]) * xa);
            let value = upper.mul_add(1.0 - ya, lower * ya);
            out.put_pixel(x, y, image::Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_101_mirrors_without_repeating_edge() {
        assert_eq!(reflect_101(3, 4), 3);
        assert_eq!(reflect_101(4, 4), 2);
        assert_eq!(reflect_101(5, 4), 1);
        assert_eq!(reflect_101(6, 4), 0);
        assert_eq!(reflect_101(7, 4), 1);
        assert_eq!(reflect_101(9, 1), 0);
    }

    #[test]
    fn clip_histogram_preserves_mass() {
        let mut hist = [0u32; BINS];
        hist[10] = 1000;
        hist[20] = 24;
        let before: u32 = hist.iter().sum();
        clip_histogram(&mut hist, 8);
        let after: u32 = hist.iter().sum();
        assert_eq!(before, after);
        // Nothing can exceed the clip plus one redistributed batch and
        // one residual count.
        let batch = (1000 - 8 + 24 - 8) / 256;
        assert!(hist.iter().all(|&h| h <= 8 + batch + 1));
    }

    #[test]
    fn lut_of_uniform_histogram_is_near_identity() {
        let hist = [4u32; BINS];
        let lut = build_lut(&hist, 1024);
        assert_eq!(lut[0], 1);
        assert_eq!(lut[255], 255);
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn output_has_input_dimensions() {
        let img = GrayImage::from_fn(37, 23, |x, y| image::Luma([((x * 7 + y * 3) % 256) as u8]));
        let out = enhance_contrast(&img, 2.0, 8);
        assert_eq!(out.dimensions(), (37, 23));
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(64, 64, image::Luma([90]));
        let out = enhance_contrast(&img, 2.0, 8);
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn stretches_low_contrast_gradient() {
        let img = GrayImage::from_fn(128, 128, |x, _| image::Luma([100 + (x / 8) as u8]));
        let out = enhance_contrast(&img, 2.0, 2);
        let min_in = img.pixels().map(|p| p.0[0]).min().unwrap_or(0);
        let max_in = img.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        let min_out = out.pixels().map(|p| p.0[0]).min().unwrap_or(0);
        let max_out = out.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        assert!(max_out - min_out > max_in - min_in);
    }

    #[test]
    fn is_deterministic() {
        let img = GrayImage::from_fn(50, 41, |x, y| image::Luma([((x * y) % 251) as u8]));
        let a = enhance_contrast(&img, 2.0, 8);
        let b = enhance_contrast(&img, 2.0, 8);
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn image_smaller_than_grid() {
        let img = GrayImage::from_fn(3, 2, |x, y| image::Luma([(x * 40 + y * 80) as u8]));
        let out = enhance_contrast(&img, 2.0, 8);
        assert_eq!(out.dimensions(), (3, 2));
    }

    #[test]
    fn empty_image_is_returned_unchanged() {
        let img = GrayImage::new(0, 0);
        let out = enhance_contrast(&img, 2.0, 8);
        assert_eq!(out.dimensions(), (0, 0));
    }
}
