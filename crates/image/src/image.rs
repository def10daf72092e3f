use {crate::*, base::Vec2};

/// A frame of pixel data in one of the supported capture formats.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub size: Vec2<usize>,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(size: Vec2<usize>, data: Vec<u8>, format: PixelFormat) -> Self {
        Self { size, format, data }
    }

    /// Packed RGB8 image, checking that `data` covers exactly `size`.
    pub fn rgb8(size: Vec2<usize>, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = size.area() * 3;
        if data.len() != expected {
            return Err(ImageError::Size(format!(
                "{} RGB8 image needs {} bytes, got {}",
                size,
                expected,
                data.len()
            )));
        }
        Ok(Self::new(size, data, PixelFormat::Rgb8))
    }

    /// Convert to packed RGB8, decoding or unpacking as needed.
    pub fn into_rgb8(self) -> Result<Image, ImageError> {
        match self.format {
            PixelFormat::Rgb8 => Ok(self),
            PixelFormat::Yuyv => {
                let rgb = yuyv_to_rgb(self.size, &self.data)?;
                Ok(Image::new(self.size, rgb, PixelFormat::Rgb8))
            }
            PixelFormat::Jpeg => jpeg_to_rgb(&self),
        }
    }
}
