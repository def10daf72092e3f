//! Live video capture for the cartoon pipeline.
//!
//! A `VideoIn` owns a worker thread that pulls frames from a capture device
//! and hands them over a small bounded channel. `capture` always returns the
//! newest frame and discards older ones, so a slow consumer never falls
//! behind the camera.

mod error;
pub use error::*;

mod videoframe;
pub use videoframe::*;

mod videoin;
pub use videoin::*;
