use image::GrayImage;

const SOBEL_X: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
const SOBEL_Y: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// Writes one row of the binary Sobel edge map into `out`.
///
/// Border pixels are clamped to the nearest edge. A pixel is marked 255 when
/// its gradient magnitude reaches `threshold`, otherwise 0. `out` must be
/// exactly one row wide.
pub fn sobel_row(src: &GrayImage, y: u32, threshold: u8, out: &mut [u8]) {
    let (width, height) = src.dimensions();
    debug_assert_eq!(out.len(), width as usize);

    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;
    let threshold = threshold as f32;

    for (x, px) in out.iter_mut().enumerate() {
        let mut gx = 0i32;
        let mut gy = 0i32;

        for (ky, (row_x, row_y)) in SOBEL_X.iter().zip(SOBEL_Y.iter()).enumerate() {
            let sy = (y as i64 + ky as i64 - 1).clamp(0, max_y) as u32;
            for kx in 0..3 {
                let sx = (x as i64 + kx as i64 - 1).clamp(0, max_x) as u32;
                let value = src.get_pixel(sx, sy)[0] as i32;
                gx += row_x[kx] * value;
                gy += row_y[kx] * value;
            }
        }

        let magnitude = ((gx * gx + gy * gy) as f32).sqrt();
        *px = if magnitude >= threshold { 255 } else { 0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn row(src: &GrayImage, y: u32, threshold: u8) -> Vec<u8> {
        let mut out = vec![0; src.width() as usize];
        sobel_row(src, y, threshold, &mut out);
        out
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let img = GrayImage::from_pixel(8, 8, Luma([120]));
        assert!(row(&img, 4, 1).iter().all(|&v| v == 0));
    }

    #[test]
    fn test_vertical_step_edge() {
        // Left half = 0, right half = 200.
        let img = GrayImage::from_fn(10, 6, |x, _| if x < 5 { Luma([0]) } else { Luma([200]) });
        let out = row(&img, 3, 100);

        assert_eq!(out[4], 255);
        assert_eq!(out[5], 255);
        assert_eq!(out[0], 0);
        assert_eq!(out[9], 0);
    }

    #[test]
    fn test_zero_threshold_marks_everything() {
        let img = GrayImage::from_pixel(4, 4, Luma([7]));
        assert!(row(&img, 0, 0).iter().all(|&v| v == 255));
    }

    #[test]
    fn test_single_pixel_image() {
        let img = GrayImage::from_pixel(1, 1, Luma([255]));
        assert_eq!(row(&img, 0, 1), vec![0]);
    }
}
