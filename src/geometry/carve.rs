use image::RgbaImage;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{ImageSize, Mask};

const ALPHA: usize = 3;

/// Copy of `image` with every pixel outside the mask made fully transparent.
///
/// Colour channels are left alone everywhere, including under zeroed alpha.
/// The working raster lives only for the duration of the call.
pub fn carve_alpha(image: &RgbaImage, mask: &Mask) -> PipelineResult<RgbaImage> {
    let expected = ImageSize::new(image.width(), image.height());
    if mask.size() != expected {
        return Err(PipelineError::DimensionMismatch {
            expected,
            actual: mask.size(),
        });
    }

    let mut scratch = image.clone();
    for (pixel, &cell) in scratch.pixels_mut().zip(mask.binary_cells()) {
        if cell == 0 {
            pixel.0[ALPHA] = 0;
        }
    }

    Ok(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 40) as u8, (y * 60) as u8, 200, if (x + y) % 2 == 0 { 255 } else { 128 }])
        })
    }

    #[test]
    fn test_alpha_zero_exactly_outside_mask() {
        let image = gradient(3, 2);
        let cells = vec![1, 0, 1, 0, 0, 1];
        let mask = Mask::from_binary(ImageSize::new(3, 2), cells, 0.9).unwrap();

        let carved = carve_alpha(&image, &mask).unwrap();
        assert_eq!(carved.dimensions(), image.dimensions());

        for (x, y, out) in carved.enumerate_pixels() {
            let input = image.get_pixel(x, y);
            if mask.is_set(x, y) {
                assert_eq!(out, input);
            } else {
                assert_eq!(out.0[3], 0);
                assert_eq!(&out.0[..3], &input.0[..3]);
            }
        }
    }

    #[test]
    fn test_input_is_not_modified() {
        let image = gradient(2, 2);
        let before = image.clone();
        let mask = Mask::from_binary(ImageSize::new(2, 2), vec![0; 4], 0.1).unwrap();
        let carved = carve_alpha(&image, &mask).unwrap();
        assert_eq!(image, before);
        assert!(carved.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_mismatched_mask_is_rejected() {
        let image = gradient(3, 3);
        let mask = Mask::from_binary(ImageSize::new(2, 2), vec![1; 4], 0.1).unwrap();
        let err = carve_alpha(&image, &mask).unwrap_err();
        assert!(matches!(err, PipelineError::DimensionMismatch { .. }));
    }
}
