///! Pixel diff between a capture and its baseline
use crate::{errors::VisualError, models::DiffResult};
use image::{DynamicImage, GenericImageView, Rgba};

/// Visual diff computation engine
pub struct VisualDiff;

impl VisualDiff {
    /// Compare two encoded images pixel by pixel.
    ///
    /// Images of different dimensions are a full mismatch: every pixel of the
    /// larger canvas counts as changed.
    pub fn compute(
        baseline: &[u8],
        received: &[u8],
        per_pixel_threshold: f64,
    ) -> Result<DiffResult, VisualError> {
        if !(0.0..=1.0).contains(&per_pixel_threshold) {
            return Err(VisualError::InvalidInput(format!(
                "per-pixel threshold must be within 0.0-1.0, got {}",
                per_pixel_threshold
            )));
        }

        let img_baseline = Self::decode_image(baseline)?;
        let img_received = Self::decode_image(received)?;

        if img_baseline.dimensions() != img_received.dimensions() {
            let (bw, bh) = img_baseline.dimensions();
            let (rw, rh) = img_received.dimensions();
            let total = (bw.max(rw) as u64) * (bh.max(rh) as u64);
            tracing::debug!(
                baseline = ?(bw, bh),
                received = ?(rw, rh),
                "capture dimensions differ from baseline"
            );
            return Ok(DiffResult {
                changed_pixels: total,
                total_pixels: total,
                diff_ratio: 1.0,
                size_mismatch: true,
                diff_image: Some(received.to_vec()),
            });
        }

        let changed = Self::changed_pixels(&img_baseline, &img_received, per_pixel_threshold);
        let (width, height) = img_baseline.dimensions();
        let total = (width as u64) * (height as u64);
        let diff_ratio = if total == 0 {
            0.0
        } else {
            changed.len() as f64 / total as f64
        };

        let diff_image = if changed.is_empty() {
            None
        } else {
            Some(Self::generate_diff_image(&img_baseline, &changed)?)
        };

        Ok(DiffResult {
            changed_pixels: changed.len() as u64,
            total_pixels: total,
            diff_ratio,
            size_mismatch: false,
            diff_image,
        })
    }

    fn decode_image(data: &[u8]) -> Result<DynamicImage, VisualError> {
        image::load_from_memory(data)
            .map_err(|e| VisualError::ImageProcessing(format!("Failed to decode image: {}", e)))
    }

    fn changed_pixels(img1: &DynamicImage, img2: &DynamicImage, threshold: f64) -> Vec<(u32, u32)> {
        let (width, height) = img1.dimensions();
        let mut changed = Vec::new();

        for y in 0..height {
            for x in 0..width {
                if Self::pixel_diff(&img1.get_pixel(x, y), &img2.get_pixel(x, y)) > threshold {
                    changed.push((x, y));
                }
            }
        }

        changed
    }

    fn pixel_diff(p1: &Rgba<u8>, p2: &Rgba<u8>) -> f64 {
        let r_diff = (p1[0] as f64 - p2[0] as f64).abs();
        let g_diff = (p1[1] as f64 - p2[1] as f64).abs();
        let b_diff = (p1[2] as f64 - p2[2] as f64).abs();
        let a_diff = (p1[3] as f64 - p2[3] as f64).abs();

        (r_diff + g_diff + b_diff + a_diff) / (255.0 * 4.0)
    }

    fn generate_diff_image(
        baseline: &DynamicImage,
        changed_pixels: &[(u32, u32)],
    ) -> Result<Vec<u8>, VisualError> {
        let mut output = baseline.to_rgba8();
        for &(x, y) in changed_pixels {
            output.put_pixel(x, y, Rgba([255, 0, 0, 255]));
        }
        encode_png(&DynamicImage::ImageRgba8(output))
    }
}

/// Encode any image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, VisualError> {
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageOutputFormat::Png)
        .map_err(|e| VisualError::ImageProcessing(format!("Failed to encode PNG: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, RgbaImage};

    fn png(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
        let img: RgbaImage = ImageBuffer::from_pixel(width, height, color);
        encode_png(&DynamicImage::ImageRgba8(img)).unwrap()
    }

    #[test]
    fn test_identical_images() {
        let a = png(100, 100, Rgba([255, 0, 0, 255]));
        let b = png(100, 100, Rgba([255, 0, 0, 255]));

        let result = VisualDiff::compute(&a, &b, 0.01).unwrap();
        assert_eq!(result.changed_pixels, 0);
        assert_eq!(result.diff_ratio, 0.0);
        assert!(result.diff_image.is_none());
    }

    #[test]
    fn test_different_images() {
        let a = png(100, 100, Rgba([255, 0, 0, 255]));
        let b = png(100, 100, Rgba([0, 0, 255, 255]));

        let result = VisualDiff::compute(&a, &b, 0.01).unwrap();
        assert_eq!(result.changed_pixels, 10_000);
        assert_eq!(result.diff_ratio, 1.0);
        assert!(result.diff_image.is_some());
    }

    #[test]
    fn test_partial_change_ratio() {
        let base = png(10, 10, Rgba([255, 255, 255, 255]));
        let mut img: RgbaImage = ImageBuffer::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        for x in 0..5 {
            img.put_pixel(x, 0, Rgba([0, 0, 0, 255]));
        }
        let received = encode_png(&DynamicImage::ImageRgba8(img)).unwrap();

        let result = VisualDiff::compute(&base, &received, 0.01).unwrap();
        assert_eq!(result.changed_pixels, 5);
        assert!((result.diff_ratio - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_size_mismatch_is_full_difference() {
        let a = png(10, 10, Rgba([0, 0, 0, 255]));
        let b = png(10, 12, Rgba([0, 0, 0, 255]));

        let result = VisualDiff::compute(&a, &b, 0.01).unwrap();
        assert!(result.size_mismatch);
        assert_eq!(result.diff_ratio, 1.0);
        assert_eq!(result.total_pixels, 120);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let a = png(1, 1, Rgba([0, 0, 0, 255]));
        assert!(matches!(
            VisualDiff::compute(&a, &a, 1.5),
            Err(VisualError::InvalidInput(_))
        ));
    }
}
