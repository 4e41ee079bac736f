//! Turns a scanned sheet into a single-channel mask where pencil marks are
//! bright (255) and paper is dark (0).

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, sum_image_pixels};
use kornia::{
    image::{Image, ImageError, ImageSize, allocator::CpuAllocator},
    imgproc,
};
use log::debug;
use serde::{Deserialize, Serialize};

type CpuImage<T, const C: usize> = Image<T, C, CpuAllocator>;

/// Sigma OpenCV derives for a 5x5 Gaussian kernel when none is given.
const BLUR_SIGMA: f32 = 1.1;
const BLOCK_SIZE: u32 = 31;
const THRESHOLD_OFFSET: f64 = 15.0;

/// Parameters of the grayscale -> blur -> adaptive threshold chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizeConfig {
    /// Gaussian blur sigma; `0` disables the blur.
    pub blur_sigma: f32,
    /// Side of the square window used for the local mean. Even values are
    /// bumped to the next odd size.
    pub block_size: u32,
    /// A pixel is ink when it is at least this much darker than its local mean.
    pub offset: f64,
}

impl Default for BinarizeConfig {
    fn default() -> Self {
        Self {
            blur_sigma: BLUR_SIGMA,
            block_size: BLOCK_SIZE,
            offset: THRESHOLD_OFFSET,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BinarizeError {
    #[error("kornia image error: {0}")]
    Kornia(#[from] ImageError),

    #[error("image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("grayscale buffer does not match {width}x{height}")]
    BufferSize { width: u32, height: u32 },
}

/// Runs the full preprocessing chain on a decoded image.
pub fn binarize(source: &DynamicImage, config: &BinarizeConfig) -> Result<GrayImage, BinarizeError> {
    let gray = to_gray(source)?;
    let blurred = if config.blur_sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&gray, config.blur_sigma)
    } else {
        gray
    };
    let mask = adaptive_mean_threshold_inv(&blurred, config.block_size, config.offset);
    debug!(
        "binarized {}x{} sheet (sigma {}, block {}, offset {})",
        mask.width(),
        mask.height(),
        config.blur_sigma,
        config.block_size,
        config.offset
    );
    Ok(mask)
}

fn to_gray(source: &DynamicImage) -> Result<GrayImage, BinarizeError> {
    let rgb = source.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(BinarizeError::EmptyImage { width, height });
    }

    let image = CpuImage::<u8, 3>::new(
        ImageSize {
            width: width as usize,
            height: height as usize,
        },
        rgb.into_raw(),
        CpuAllocator,
    )?;
    let mut gray = CpuImage::<u8, 1>::from_size_val(image.size(), 0u8, CpuAllocator)?;
    imgproc::color::gray_from_rgb_u8(&image, &mut gray)?;

    GrayImage::from_raw(width, height, gray.as_slice().to_vec())
        .ok_or(BinarizeError::BufferSize { width, height })
}

/// Local-mean threshold with inverted output: a pixel becomes 255 when it is
/// `<= mean - offset` over the window around it, else 0. Windows are clipped
/// at the image border and the mean is taken over the pixels inside.
pub fn adaptive_mean_threshold_inv(gray: &GrayImage, block_size: u32, offset: f64) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut out = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    let radius = block_size.max(1) / 2;
    let integral: ImageBuffer<Luma<u64>, Vec<u64>> = integral_image(gray);

    for y in 0..height {
        let y0 = y.saturating_sub(radius);
        let y1 = y.saturating_add(radius).min(height - 1);
        for x in 0..width {
            let x0 = x.saturating_sub(radius);
            let x1 = x.saturating_add(radius).min(width - 1);
            let [sum] = sum_image_pixels(&integral, x0, y0, x1, y1);
            let count = ((x1 - x0 + 1) as u64 * (y1 - y0 + 1) as u64) as f64;
            let mean = sum as f64 / count;
            let value = gray.get_pixel(x, y).0[0] as f64;
            if value <= mean - offset {
                out.put_pixel(x, y, Luma([255]));
            }
        }
    }

    out
}
