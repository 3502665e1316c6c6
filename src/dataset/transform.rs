//! Image preprocessing.
//!
//! Every image goes through the same transform regardless of split:
//! resize so the shorter side matches the target edge (aspect ratio
//! preserved), center-crop to a square, and convert to CHW floats in
//! [0, 1]. Per-channel mean/std normalization happens tensor-side in the
//! batcher.

use image::{imageops::FilterType, DynamicImage};

/// Resize so the shorter side equals `target`, preserving aspect ratio
pub fn resize_shorter_side(img: &DynamicImage, target: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let shorter = width.min(height).max(1);
    let scale = target as f32 / shorter as f32;

    let new_width = ((width as f32 * scale).round() as u32).max(target);
    let new_height = ((height as f32 * scale).round() as u32).max(target);

    img.resize_exact(new_width, new_height, FilterType::Triangle)
}

/// Crop a centered `size` × `size` square
pub fn center_crop(img: &DynamicImage, size: u32) -> DynamicImage {
    let x = img.width().saturating_sub(size) / 2;
    let y = img.height().saturating_sub(size) / 2;
    img.crop_imm(x, y, size, size)
}

/// Convert to CHW float data in [0, 1]
pub fn to_chw_floats(img: &DynamicImage) -> Vec<f32> {
    let rgb = img.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let mut data = vec![0.0f32; 3 * height * width];

    for y in 0..height {
        for x in 0..width {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            data[y * width + x] = pixel[0] as f32 / 255.0;
            data[height * width + y * width + x] = pixel[1] as f32 / 255.0;
            data[2 * height * width + y * width + x] = pixel[2] as f32 / 255.0;
        }
    }

    data
}

/// The full preprocessing pipeline: resize, crop, convert
pub fn preprocess(img: &DynamicImage, edge: u32) -> Vec<f32> {
    let resized = resize_shorter_side(img, edge);
    let cropped = center_crop(&resized, edge);
    to_chw_floats(&cropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        let mut img = RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgb(color);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_resize_sets_shorter_side() {
        let img = solid_image(600, 300, [10, 20, 30]);
        let resized = resize_shorter_side(&img, 299);
        assert_eq!(resized.height(), 299);
        assert_eq!(resized.width(), 598);

        let img = solid_image(300, 600, [10, 20, 30]);
        let resized = resize_shorter_side(&img, 299);
        assert_eq!(resized.width(), 299);
        assert_eq!(resized.height(), 598);
    }

    #[test]
    fn test_square_input_stays_square() {
        let img = solid_image(512, 512, [0, 0, 0]);
        let resized = resize_shorter_side(&img, 299);
        assert_eq!((resized.width(), resized.height()), (299, 299));
    }

    #[test]
    fn test_center_crop_dimensions() {
        let img = solid_image(598, 299, [1, 2, 3]);
        let cropped = center_crop(&img, 299);
        assert_eq!((cropped.width(), cropped.height()), (299, 299));
    }

    #[test]
    fn test_chw_layout_and_range() {
        let img = solid_image(4, 2, [255, 0, 128]);
        let data = to_chw_floats(&img);
        assert_eq!(data.len(), 3 * 2 * 4);

        // Red channel first, then green, then blue
        assert!((data[0] - 1.0).abs() < 1e-6);
        assert!((data[8] - 0.0).abs() < 1e-6);
        assert!((data[16] - 128.0 / 255.0).abs() < 1e-6);
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_preprocess_output_size() {
        let img = solid_image(640, 480, [7, 7, 7]);
        let data = preprocess(&img, 32);
        assert_eq!(data.len(), 3 * 32 * 32);
    }
}
