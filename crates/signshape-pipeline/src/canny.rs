//! Canny edge detector over a pre-smoothed grayscale image.
//!
//! Structured like `imageproc::edges::canny` (Sobel gradients, four-way
//! non-maximum suppression, stack-based hysteresis) with three
//! differences:
//!
//! - No internal blur. Smoothing is a separate, configurable step in
//!   [`crate::edge`], so the caller controls the kernel.
//! - Gradient magnitude is the L1 norm `|gx| + |gy|`, which is what the
//!   100/120 thresholds were calibrated against.
//! - Hysteresis visits all eight neighbours and never steps outside the
//!   image (upstream misses north and north-east, and its `x - 1`
//!   underflows on the border; see image-rs/imageproc#705).

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

const EDGE: Luma<u8> = Luma([255]);

/// Gradient direction quantized to the four neighbour axes.
#[derive(Clone, Copy)]
enum Direction {
    Horizontal,
    Diagonal,
    Vertical,
    AntiDiagonal,
}

impl Direction {
    fn of(gx: f32, gy: f32) -> Self {
        let mut angle = gy.atan2(gx).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if !(22.5..157.5).contains(&angle) {
            Self::Horizontal
        } else if angle < 67.5 {
            Self::Diagonal
        } else if angle < 112.5 {
            Self::Vertical
        } else {
            Self::AntiDiagonal
        }
    }

    /// Offsets of the two neighbours along the gradient.
    const fn neighbours(self) -> [(isize, isize); 2] {
        match self {
            Self::Horizontal => [(-1, 0), (1, 0)],
            Self::Diagonal => [(1, 1), (-1, -1)],
            Self::Vertical => [(0, -1), (0, 1)],
            Self::AntiDiagonal => [(-1, 1), (1, -1)],
        }
    }
}

/// Run Canny on `image`, returning a binary 0/255 edge map of the same
/// size.
///
/// Callers are expected to pass `low <= high`; [`crate::edge::extract_edges`]
/// enforces this.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return GrayImage::new(w, h);
    }

    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);
    let magnitude: Vec<f32> = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(a, b)| f32::from(a.0[0]).abs() + f32::from(b.0[0]).abs())
        .collect();

    let thinned = non_maximum_suppression(&magnitude, &gx, &gy);
    hysteresis(&thinned, w, h, low, high)
}

/// Zero every pixel that is not a local maximum along its gradient.
/// Border pixels are always zero.
fn non_maximum_suppression(
    magnitude: &[f32],
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
) -> Vec<f32> {
    let (w, h) = (gx.width() as usize, gx.height() as usize);
    let mut out = vec![0.0; magnitude.len()];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = magnitude[i];
            if m == 0.0 {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let (px, py) = (x as u32, y as u32);
            let dir = Direction::of(
                f32::from(gx.get_pixel(px, py).0[0]),
                f32::from(gy.get_pixel(px, py).0[0]),
            );
            let is_max = dir.neighbours().iter().all(|&(dx, dy)| {
                let j = y.wrapping_add_signed(dy) * w + x.wrapping_add_signed(dx);
                m >= magnitude[j]
            });
            if is_max {
                out[i] = m;
            }
        }
    }
    out
}

/// Keep strong pixels (`>= high`) and every weak pixel (`>= low`)
/// 8-connected to one.
fn hysteresis(thinned: &[f32], width: u32, height: u32, low: f32, high: f32) -> GrayImage {
    let (w, h) = (width as usize, height as usize);
    let mut out = GrayImage::new(width, height);
    let mut marked = vec![false; thinned.len()];
    let mut stack = Vec::new();

    for start in 0..thinned.len() {
        if marked[start] || thinned[start] < high {
            continue;
        }
        marked[start] = true;
        stack.push(start);
        while let Some(i) = stack.pop() {
            let (x, y) = (i % w, i / w);
            for dy in -1..=1_isize {
                for dx in -1..=1_isize {
                    let (Some(nx), Some(ny)) =
                        (x.checked_add_signed(dx), y.checked_add_signed(dy))
                    else {
                        continue;
                    };
                    if nx >= w || ny >= h {
                        continue;
                    }
                    let j = ny * w + nx;
                    if !marked[j] && thinned[j] >= low {
                        marked[j] = true;
                        stack.push(j);
                    }
                }
            }
        }
    }

    for (pixel, &edge) in out.pixels_mut().zip(&marked) {
        if edge {
            *pixel = EDGE;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_count(edges: &GrayImage) -> u32 {
        edges.pixels().map(|p| u32::from(p.0[0] > 0)).sum()
    }

    /// A bright column one pixel from the border drives the hysteresis
    /// walk onto the image edge.
    #[test]
    fn border_edge_does_not_panic() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([0]));
        for y in 0..10 {
            img.put_pixel(1, y, Luma([255]));
        }
        let edges = canny(&img, 1.0, 2.0);
        assert!(edge_count(&edges) > 0);
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::new(17, 31);
        let edges = canny(&img, 50.0, 150.0);
        assert_eq!(edges.dimensions(), (17, 31));
    }

    #[test]
    fn tiny_image_has_no_edges() {
        let img = GrayImage::from_fn(2, 5, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
        let edges = canny(&img, 1.0, 2.0);
        assert_eq!(edges.dimensions(), (2, 5));
        assert_eq!(edge_count(&edges), 0);
    }

    #[test]
    fn sharp_vertical_edge_is_thin() {
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 0 } else { 255 }]));
        let edges = canny(&img, 100.0, 120.0);
        for y in 1..19 {
            let row: u32 = (0..20).map(|x| u32::from(edges.get_pixel(x, y).0[0] > 0)).sum();
            assert!(row >= 1, "row {y} should cross the boundary");
            assert!(row <= 2, "row {y} should be at most two pixels wide");
        }
        for y in 0..20 {
            for x in 0..20 {
                if edges.get_pixel(x, y).0[0] > 0 {
                    assert!((9..=10).contains(&x), "edge at unexpected x={x}");
                }
            }
        }
    }

    #[test]
    fn output_is_binary() {
        let img = GrayImage::from_fn(30, 30, |x, y| Luma([((x * 17 + y * 29) % 256) as u8]));
        let edges = canny(&img, 50.0, 100.0);
        assert!(edges.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn weak_gradient_alone_is_not_an_edge() {
        // Step of 20 gives an L1 Sobel response of 80: between the
        // thresholds but never strong.
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 100 } else { 120 }]));
        let edges = canny(&img, 50.0, 120.0);
        assert_eq!(edge_count(&edges), 0);
    }

    #[test]
    fn weak_pixels_connected_to_strong_are_kept() {
        // Upper half has a strong step, lower half a weak one on the same
        // column, so hysteresis should extend the edge downward.
        let img = GrayImage::from_fn(20, 20, |x, y| {
            let high = if y < 10 { 255 } else { 120 };
            Luma([if x < 10 { 100 } else { high }])
        });
        let edges = canny(&img, 50.0, 200.0);
        let lower: u32 = (11..19)
            .flat_map(|y| (0..20).map(move |x| (x, y)))
            .map(|(x, y)| u32::from(edges.get_pixel(x, y).0[0] > 0))
            .sum();
        assert!(lower > 0, "weak edge should be connected through hysteresis");
    }

    #[test]
    fn direction_quantization() {
        assert!(matches!(Direction::of(1.0, 0.0), Direction::Horizontal));
        assert!(matches!(Direction::of(-1.0, 0.0), Direction::Horizontal));
        assert!(matches!(Direction::of(1.0, 1.0), Direction::Diagonal));
        assert!(matches!(Direction::of(0.0, 1.0), Direction::Vertical));
        assert!(matches!(Direction::of(-1.0, 1.0), Direction::AntiDiagonal));
    }
}
