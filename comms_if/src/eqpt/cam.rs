//! # Camera Equipment Communications Module
//!
//! Frames arrive either as raw rasters or as compressed (PNG/JPEG) buffers. Both are converted
//! into a decoded [`CamImage`] before they reach the stabilisation loop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{Bgr, DynamicImage, ImageBuffer, Luma, Rgb};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A compressed frame from the camera.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CamFrame {
    /// Sensor timestamp of the frame.
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    /// The format of this frame
    pub format: ImageFormat,

    /// The formatted image data
    pub data: Vec<u8>,
}

/// An uncompressed frame from the camera.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RawImage {
    /// Sensor timestamp of the frame.
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    /// Width of the image in pixels
    pub width: u32,

    /// Height of the image in pixels
    pub height: u32,

    /// Layout of each pixel in `data`
    pub encoding: PixelEncoding,

    /// Row-major pixel data with no padding between rows
    pub data: Vec<u8>,
}

/// A decoded camera image.
#[derive(Clone)]
pub struct CamImage {
    /// Sensor timestamp of the frame.
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    /// The image itself
    pub image: DynamicImage,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Possible formats for compressed camera images. This is used rather than image::ImageFormat to:
///     1. Restrict the formats that can be sent back and forth
///     2. Allow serialisation as image::ImageFormat does not implement serde.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq)]
pub enum ImageFormat {
    /// PNG image
    Png,

    /// JPEG image with a quality value between 1 and 100, where 100 is best.
    Jpeg(u8),
}

/// Pixel layouts supported for raw images.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PixelEncoding {
    Mono8,
    Rgb8,
    Bgr8,
}

/// Which kind of image stream the camera provides. Fixed for the life of the process.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
pub enum ImageSource {
    #[serde(rename = "raw")]
    Raw,

    #[serde(rename = "compressed_jpeg")]
    CompressedJpeg,
}

/// Errors raised while converting frames into images.
#[derive(Debug, Error)]
pub enum CamError {
    #[error("Could not decode the compressed frame: {0}")]
    DecodeError(image::ImageError),

    #[error("Raw image buffer is {found} bytes but a {width}x{height} {encoding:?} image needs {expected}")]
    WrongSize {
        width: u32,
        height: u32,
        encoding: PixelEncoding,
        expected: usize,
        found: usize,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CamFrame {
    /// Convert this camera frame into a camera image
    pub fn to_cam_image(&self) -> Result<CamImage, CamError> {
        let format = match self.format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg(_) => image::ImageFormat::Jpeg,
        };

        let image = image::load_from_memory_with_format(&self.data, format)
            .map_err(CamError::DecodeError)?;

        Ok(CamImage {
            timestamp_s: self.timestamp_s,
            image,
        })
    }
}

impl RawImage {
    /// Number of bytes needed to hold the whole image.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.encoding.bytes_per_pixel()
    }

    /// Convert this raw frame into a camera image, consuming the pixel buffer.
    pub fn into_cam_image(self) -> Result<CamImage, CamError> {
        let expected = self.expected_len();
        if self.data.len() != expected {
            return Err(CamError::WrongSize {
                width: self.width,
                height: self.height,
                encoding: self.encoding,
                expected,
                found: self.data.len(),
            });
        }

        let (w, h, data) = (self.width, self.height, self.data);

        // The length has been checked above so from_raw cannot fail
        let image = match self.encoding {
            PixelEncoding::Mono8 => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, data)
                .map(DynamicImage::ImageLuma8),
            PixelEncoding::Rgb8 => ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, data)
                .map(DynamicImage::ImageRgb8),
            PixelEncoding::Bgr8 => ImageBuffer::<Bgr<u8>, _>::from_raw(w, h, data)
                .map(DynamicImage::ImageBgr8),
        };

        match image {
            Some(image) => Ok(CamImage {
                timestamp_s: self.timestamp_s,
                image,
            }),
            None => Err(CamError::WrongSize {
                width: w,
                height: h,
                encoding: self.encoding,
                expected,
                found: expected,
            }),
        }
    }
}

impl PixelEncoding {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelEncoding::Mono8 => 1,
            PixelEncoding::Rgb8 | PixelEncoding::Bgr8 => 3,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::GenericImageView;

    fn encode_png(img: &CamImage) -> CamFrame {
        let mut data = Vec::<u8>::new();
        img.image
            .write_to(&mut data, image::ImageOutputFormat::Png)
            .unwrap();

        CamFrame {
            timestamp_s: img.timestamp_s,
            format: ImageFormat::Png,
            data,
        }
    }

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        (0..(width * height)).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_raw_mono8() {
        let raw = RawImage {
            timestamp_s: 12.5,
            width: 8,
            height: 4,
            encoding: PixelEncoding::Mono8,
            data: gradient(8, 4),
        };

        let img = raw.into_cam_image().unwrap();
        assert_eq!(img.timestamp_s, 12.5);
        assert_eq!(img.image.dimensions(), (8, 4));
    }

    #[test]
    fn test_raw_wrong_size() {
        let raw = RawImage {
            timestamp_s: 0.0,
            width: 8,
            height: 4,
            encoding: PixelEncoding::Rgb8,
            data: gradient(8, 4),
        };

        match raw.into_cam_image() {
            Err(CamError::WrongSize { expected, found, .. }) => {
                assert_eq!(expected, 96);
                assert_eq!(found, 32);
            }
            Err(e) => panic!("Expected WrongSize, got {}", e),
            Ok(_) => panic!("Expected WrongSize, got an image"),
        }
    }

    #[test]
    fn test_compressed_decode() {
        let raw = RawImage {
            timestamp_s: 3.0,
            width: 16,
            height: 16,
            encoding: PixelEncoding::Mono8,
            data: gradient(16, 16),
        };
        let frame = encode_png(&raw.into_cam_image().unwrap());

        let img = frame.to_cam_image().unwrap();
        assert_eq!(img.timestamp_s, 3.0);
        assert_eq!(img.image.dimensions(), (16, 16));
    }

    #[test]
    fn test_corrupt_jpeg_is_an_error() {
        let frame = CamFrame {
            timestamp_s: 1.0,
            format: ImageFormat::Jpeg(90),
            data: vec![0xFF, 0xD8, 0x00, 0x01, 0x02],
        };

        assert!(matches!(frame.to_cam_image(), Err(CamError::DecodeError(_))));
    }

    #[test]
    fn test_image_source_names() {
        #[derive(Deserialize)]
        struct P {
            source: ImageSource,
        }

        let p: P = serde_json::from_str(r#"{"source": "compressed_jpeg"}"#).unwrap();
        assert_eq!(p.source, ImageSource::CompressedJpeg);
        let p: P = serde_json::from_str(r#"{"source": "raw"}"#).unwrap();
        assert_eq!(p.source, ImageSource::Raw);
        assert!(serde_json::from_str::<P>(r#"{"source": "h264"}"#).is_err());
    }
}
