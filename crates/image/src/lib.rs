//! Pixel buffers for the capture and display ends of the cartoon pipeline.
//!
//! Camera frames arrive in whatever format the device delivers (YUYV, MJPEG
//! or packed RGB). Everything downstream works on packed RGB8 in HWC order,
//! and the display wants packed `0xAARRGGBB` words.

mod error;
pub use error::*;

mod image;
pub use self::image::*;

mod pixelformat;
pub use pixelformat::*;

mod rgb;
pub use rgb::*;

mod u32;
pub use self::u32::*;
