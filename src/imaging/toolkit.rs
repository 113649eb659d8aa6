//! Startup capability probing.
//!
//! The decoder and encoder variants are chosen exactly once, when a
//! [`Toolkit`] is built. Everything downstream holds trait objects and never
//! asks which variant it got.

use super::backend::{BackendError, Decoder, Encoder, Surface};
use super::compat::{Base64Encoder, DataUrlDecoder};
use super::native::{DirectEncoder, NativeDecoder};
use super::params::OutputFormat;
use crate::source::{InputFormat, SourceImage};
use image::ImageFormat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderPreference {
    /// Native when available, compat as fallback.
    #[default]
    Auto,
    Native,
    Compat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderPreference {
    #[default]
    Auto,
    Direct,
    Base64,
}

/// What the linked codecs can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub native_decode: bool,
    pub direct_encode: bool,
}

impl Capabilities {
    pub fn detect(output: OutputFormat) -> Self {
        let native_decode = [
            InputFormat::Jpeg,
            InputFormat::Png,
            InputFormat::WebP,
            InputFormat::Gif,
        ]
        .iter()
        .all(|f| f.image_format().reading_enabled());
        let output_format = match output {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Avif => ImageFormat::Avif,
        };
        Self {
            native_decode,
            direct_encode: output_format.writing_enabled(),
        }
    }
}

/// Tries the native decoder first and retries with the compat decoder when
/// it fails.
pub struct FallbackDecoder {
    primary: Box<dyn Decoder>,
    fallback: Box<dyn Decoder>,
}

impl FallbackDecoder {
    pub fn new(primary: Box<dyn Decoder>, fallback: Box<dyn Decoder>) -> Self {
        Self { primary, fallback }
    }
}

impl Decoder for FallbackDecoder {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    fn decode(&self, source: &SourceImage) -> Result<Box<dyn Surface>, BackendError> {
        match self.primary.decode(source) {
            Ok(surface) => Ok(surface),
            // A pixel limit is a property of the image, not of the decoder
            Err(e @ BackendError::ResourceLimit(_)) => Err(e),
            Err(e) => {
                log::warn!(
                    "{}: {} decoder failed ({e}), retrying with {}",
                    source.filename(),
                    self.primary.name(),
                    self.fallback.name()
                );
                self.fallback.decode(source)
            }
        }
    }
}

/// The decoder/encoder pair one process uses for every pipeline run.
pub struct Toolkit {
    decoder: Box<dyn Decoder>,
    encoder: Box<dyn Encoder>,
}

impl Toolkit {
    pub fn new(decoder: Box<dyn Decoder>, encoder: Box<dyn Encoder>) -> Self {
        Self { decoder, encoder }
    }

    /// Probe the linked codecs and pick variants according to preference.
    pub fn probe(
        decoder: DecoderPreference,
        encoder: EncoderPreference,
        output: OutputFormat,
        max_decoded_pixels: u64,
    ) -> Self {
        let toolkit = Self::select(
            Capabilities::detect(output),
            decoder,
            encoder,
            max_decoded_pixels,
        );
        log::info!(
            "codecs: decoder={} encoder={}",
            toolkit.decoder.name(),
            toolkit.encoder.name()
        );
        toolkit
    }

    pub fn select(
        caps: Capabilities,
        decoder: DecoderPreference,
        encoder: EncoderPreference,
        max_decoded_pixels: u64,
    ) -> Self {
        let decoder: Box<dyn Decoder> = match decoder {
            DecoderPreference::Native => Box::new(NativeDecoder::new(max_decoded_pixels)),
            DecoderPreference::Compat => Box::new(DataUrlDecoder::new(max_decoded_pixels)),
            DecoderPreference::Auto if caps.native_decode => Box::new(FallbackDecoder::new(
                Box::new(NativeDecoder::new(max_decoded_pixels)),
                Box::new(DataUrlDecoder::new(max_decoded_pixels)),
            )),
            DecoderPreference::Auto => Box::new(DataUrlDecoder::new(max_decoded_pixels)),
        };
        let encoder: Box<dyn Encoder> = match encoder {
            EncoderPreference::Direct => Box::new(DirectEncoder),
            EncoderPreference::Base64 => Box::new(Base64Encoder),
            EncoderPreference::Auto if caps.direct_encode => Box::new(DirectEncoder),
            EncoderPreference::Auto => Box::new(Base64Encoder),
        };
        Self { decoder, encoder }
    }

    pub fn decoder(&self) -> &dyn Decoder {
        self.decoder.as_ref()
    }

    pub fn encoder(&self) -> &dyn Encoder {
        self.encoder.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::Dimensions;
    use crate::imaging::backend::tests::MockDecoder;
    use std::sync::atomic::Ordering;

    const ALL: Capabilities = Capabilities {
        native_decode: true,
        direct_encode: true,
    };
    const NONE: Capabilities = Capabilities {
        native_decode: false,
        direct_encode: false,
    };

    fn pick(caps: Capabilities, d: DecoderPreference, e: EncoderPreference) -> (&'static str, &'static str) {
        let t = Toolkit::select(caps, d, e, u64::MAX);
        (t.decoder().name(), t.encoder().name())
    }

    #[test]
    fn linked_codecs_cover_whitelist() {
        assert_eq!(Capabilities::detect(OutputFormat::Jpeg), ALL);
    }

    #[test]
    fn auto_prefers_native_variants() {
        assert_eq!(
            pick(ALL, DecoderPreference::Auto, EncoderPreference::Auto),
            ("native", "direct")
        );
    }

    #[test]
    fn auto_falls_back_when_capabilities_missing() {
        assert_eq!(
            pick(NONE, DecoderPreference::Auto, EncoderPreference::Auto),
            ("compat", "base64")
        );
    }

    #[test]
    fn explicit_preferences_win() {
        assert_eq!(
            pick(ALL, DecoderPreference::Compat, EncoderPreference::Base64),
            ("compat", "base64")
        );
        assert_eq!(
            pick(NONE, DecoderPreference::Native, EncoderPreference::Direct),
            ("native", "direct")
        );
    }

    #[test]
    fn fallback_decoder_retries_on_failure() {
        let primary = MockDecoder::failing();
        let fallback = MockDecoder::with_dimensions(12, 8);
        let chain = FallbackDecoder::new(Box::new(primary), Box::new(fallback));
        let source = SourceImage::new("a.png", "image/png", vec![1]);
        let surface = chain.decode(&source).unwrap();
        assert_eq!(surface.dimensions(), Dimensions { width: 12, height: 8 });
    }

    #[test]
    fn fallback_decoder_skips_fallback_on_success() {
        let fallback = std::sync::Arc::new(MockDecoder::with_dimensions(1, 1));
        struct Shared(std::sync::Arc<MockDecoder>);
        impl Decoder for Shared {
            fn name(&self) -> &'static str {
                "shared"
            }
            fn decode(&self, s: &SourceImage) -> Result<Box<dyn Surface>, BackendError> {
                self.0.decode(s)
            }
        }
        let chain = FallbackDecoder::new(
            Box::new(MockDecoder::with_dimensions(5, 5)),
            Box::new(Shared(std::sync::Arc::clone(&fallback))),
        );
        let source = SourceImage::new("a.png", "image/png", vec![1]);
        chain.decode(&source).unwrap();
        assert_eq!(fallback.decodes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fallback_decoder_does_not_retry_resource_limits() {
        let chain = FallbackDecoder::new(
            Box::new(NativeDecoder::new(10)),
            Box::new(MockDecoder::with_dimensions(5, 5)),
        );
        let source = SourceImage::new(
            "a.png",
            "image/png",
            crate::test_helpers::png_bytes(20, 20),
        );
        assert!(matches!(
            chain.decode(&source),
            Err(BackendError::ResourceLimit(_))
        ));
    }

    #[test]
    fn preferences_parse_lowercase() {
        #[derive(Deserialize)]
        struct W {
            decoder: DecoderPreference,
            encoder: EncoderPreference,
        }
        let w: W = toml::from_str("decoder = \"compat\"\nencoder = \"base64\"").unwrap();
        assert_eq!(w.decoder, DecoderPreference::Compat);
        assert_eq!(w.encoder, EncoderPreference::Base64);
    }
}
