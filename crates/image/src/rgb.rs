use {crate::*, base::Vec2};

pub fn yuyv_to_rgb(size: Vec2<usize>, data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let pixel_count = size.area();
    let expected = pixel_count * 2;
    if data.len() < expected || size.x % 2 != 0 {
        return Err(ImageError::Size(format!(
            "{} YUYV image needs {} bytes and an even width, got {} bytes",
            size,
            expected,
            data.len()
        )));
    }

    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for chunk in data[..expected].chunks_exact(4) {
        let (r0, g0, b0) = yuv_to_rgb(chunk[0], chunk[1], chunk[3]);
        let (r1, g1, b1) = yuv_to_rgb(chunk[2], chunk[1], chunk[3]);
        rgb.extend_from_slice(&[r0, g0, b0, r1, g1, b1]);
    }

    Ok(rgb)
}

pub fn jpeg_to_rgb(image: &Image) -> Result<Image, ImageError> {
    image.format.ensure_format(PixelFormat::Jpeg)?;
    let decoded = crates_image::load_from_memory(&image.data)
        .map_err(|e| ImageError::Decode(format!("Failed to decode JPEG: {}", e)))?;

    let rgb_image = decoded.to_rgb8();
    let (width, height) = rgb_image.dimensions();
    let size = Vec2::new(width as usize, height as usize);

    Ok(Image::new(size, rgb_image.into_raw(), PixelFormat::Rgb8))
}
