//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, WebP, GIF) |
//! | **Orientation** | EXIF orientation via `ImageDecoder::orientation` |
//! | **Resample** | `fast_image_resize` Lanczos3 into a reusable canvas |
//! | **Encode** | `JpegEncoder` / `AvifEncoder`, optionally through base64 |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Quality, output format, encode targets
//! - **Backend**: [`Surface`], [`Decoder`] and [`Encoder`] traits
//! - **Native / Compat**: the two families of codec implementations
//! - **Toolkit**: picks one decoder and one encoder at startup

pub mod backend;
pub mod calculations;
pub mod canvas;
pub mod codec;
pub mod compat;
pub mod native;
mod params;
pub mod toolkit;

pub use backend::{BackendError, Decoder, Dimensions, Encoder, Surface, SurfaceHandle};
pub use canvas::Canvas;
pub use params::{EncodeTarget, OutputFormat, Quality};
pub use toolkit::{DecoderPreference, EncoderPreference, Toolkit};
