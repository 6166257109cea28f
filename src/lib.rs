//! # QOI Stream Layout
//!
//! A stream is a fixed 14 byte header, one chunk per pixel or per run of
//! identical pixels, and an 8 byte end marker.
//!
//! ```text
//! magic      "qoif"       4 bytes
//! width                   4 bytes, big-endian
//! height                  4 bytes, big-endian
//! channels                1 byte, 3 or 4
//! colorspace              1 byte, 0 = srgb, 1 = linear
//! ```
//!
//! Two chunk kinds use a full tag byte:
//!
//! ```text
//!         1111 1110  rrrrrrrr gggggggg bbbbbbbb            RGB
//!         1111 1111  rrrrrrrr gggggggg bbbbbbbb aaaaaaaa   RGBA
//! ```
//!
//! Everything else is tagged by the top two bits, with the low six bits as
//! operand:
//!
//! ```text
//!         MSB      LSB
//!          │        │
//!          ▼        ▼
//!         TTXX XXXX
//!         ▲▲
//!    tag──┘┘
//!
//!         00iiiiii             INDEX   color cache slot i
//!         01rrggbb             DIFF    per-channel delta in -2..=1, bias 2
//!         10gggggg  rrrrbbbb   LUMA    dg in -32..=31 bias 32,
//!                              dr-dg and db-dg in -8..=7 bias 8
//!         11cccccc             RUN     1..=62 repeats, bias 1
//! ```
//!
//! All deltas are relative to the previously coded pixel and wrap mod 256.
//! RGB, DIFF and LUMA leave alpha unchanged; only RGBA can change it. The
//! run lengths 63 and 64 are unusable since `0b11111110` and `0b11111111`
//! are the RGB/RGBA tags.
//!
//! The color cache holds the last color stored at each of 64 hash slots,
//! `slot = (r*3 + g*5 + b*7 + a*11) % 64`, and is rebuilt by the decoder
//! from the pixel sequence itself, so it is never transmitted. Encoding and
//! decoding both start from a zeroed cache and a previous pixel of
//! `(0, 0, 0, 255)`.
//!
//! The end marker `00 00 00 00 00 00 00 01` terminates the byte stream but
//! carries no pixel data; the decoder stops once `width * height` pixels
//! have been reconstructed.

#[macro_use]
extern crate log;

mod decode;
mod encode;
mod error;
mod header;
mod pixel;

pub use decode::{decode, Image};
pub use encode::encode;
pub use error::Error;
pub use header::{Channels, Colorspace, Header};

/// Size of the fixed preamble.
const HEADER_LEN: usize = 14;
const MAGIC: [u8; 4] = *b"qoif";
const END_MARKER: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];

/// One slot per value of the 6 bit color hash.
const CACHE_SIZE: usize = 64;
/// Longest run a single RUN chunk can carry.
const MAX_RUN: u8 = 62;

const OP_RGB: u8 = 0b1111_1110;
const OP_RGBA: u8 = 0b1111_1111;
const OP_INDEX: u8 = 0b0000_0000;
const OP_DIFF: u8 = 0b0100_0000;
const OP_LUMA: u8 = 0b1000_0000;
const OP_RUN: u8 = 0b1100_0000;

const TAG_MASK: u8 = 0b1100_0000;
const ARG_MASK: u8 = 0b0011_1111;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Setup function that is only run once, even if called multiple times.
    fn setup() {
        INIT.call_once(|| {
            let _ = pretty_env_logger::try_init();
        });
    }

    #[test]
    fn roundtrip_rgb() {
        setup();
        let pixels: Vec<u8> = (0..13u32 * 7 * 3).map(|i| (i * 7) as u8).collect();
        let encoded = encode(&pixels, 13, 7, Channels::Rgb, Colorspace::Srgb).unwrap();
        let image = decode(&encoded, None).unwrap();
        assert_eq!(image.width, 13);
        assert_eq!(image.height, 7);
        assert_eq!(image.channels, Channels::Rgb);
        assert_eq!(image.colorspace, Colorspace::Srgb);
        assert_eq!(image.data, pixels);
    }

    #[test]
    fn roundtrip_rgba_linear() {
        setup();
        let pixels: Vec<u8> = (0..9u32 * 5 * 4).map(|i| (i * 11 + 3) as u8).collect();
        let encoded = encode(&pixels, 9, 5, Channels::Rgba, Colorspace::Linear).unwrap();
        let image = decode(&encoded, None).unwrap();
        assert_eq!(image.channels, Channels::Rgba);
        assert_eq!(image.colorspace, Colorspace::Linear);
        assert_eq!(image.data, pixels);
    }

    #[test]
    fn rgb_source_decoded_as_rgba_gets_opaque_alpha() {
        setup();
        let pixels: Vec<u8> = (0..8u32 * 4 * 3).map(|i| (i * 3) as u8).collect();
        let encoded = encode(&pixels, 8, 4, Channels::Rgb, Colorspace::Srgb).unwrap();
        let image = decode(&encoded, Some(Channels::Rgba)).unwrap();
        assert_eq!(image.channels, Channels::Rgba);
        assert_eq!(image.data.len(), 8 * 4 * 4);
        for (px, expected) in image.data.chunks_exact(4).zip(pixels.chunks_exact(3)) {
            assert_eq!(&px[..3], expected);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn opaque_rgba_source_decoded_as_rgb_drops_alpha() {
        setup();
        let mut pixels = Vec::new();
        for i in 0..6u32 * 6 {
            pixels.extend_from_slice(&[(i * 5) as u8, (i * 9) as u8, (i * 2) as u8, 255]);
        }
        let encoded = encode(&pixels, 6, 6, Channels::Rgba, Colorspace::Srgb).unwrap();
        let image = decode(&encoded, Some(Channels::Rgb)).unwrap();
        assert_eq!(image.channels, Channels::Rgb);
        for (px, expected) in image.data.chunks_exact(3).zip(pixels.chunks_exact(4)) {
            assert_eq!(px, &expected[..3]);
        }
    }

    #[test]
    fn degenerate_dimensions_encode_to_header_and_end_marker() {
        setup();
        let encoded = encode(&[], 0, 5, Channels::Rgb, Colorspace::Srgb).unwrap();
        assert_eq!(encoded.len(), HEADER_LEN + END_MARKER.len());
        assert_eq!(
            hex::encode(&encoded),
            "716f6966000000000000000503000000000000000001"
        );
        let image = decode(&encoded, None).unwrap();
        assert_eq!(image.width, 0);
        assert_eq!(image.height, 5);
        assert!(image.data.is_empty());
    }

    #[test]
    fn pixel_buffer_size_is_validated() {
        setup();
        let result = encode(&[0; 10], 2, 2, Channels::Rgb, Colorspace::Srgb);
        assert!(matches!(
            result,
            Err(Error::PixelBufferSize {
                expected: 12,
                actual: 10,
            })
        ));
    }

    #[test]
    fn randomized_palette_roundtrip() {
        setup();
        let mut rng = StdRng::seed_from_u64(7);
        let palette: Vec<[u8; 4]> = (0..8).map(|_| rng.gen()).collect();
        let mut pixels = Vec::new();
        for _ in 0..64u32 * 32 {
            pixels.extend_from_slice(&palette[rng.gen_range(0..palette.len())]);
        }
        let encoded = encode(&pixels, 64, 32, Channels::Rgba, Colorspace::Srgb).unwrap();
        assert!(encoded.len() < pixels.len());
        let image = decode(&encoded, None).unwrap();
        assert_eq!(image.data, pixels);
    }

    #[test]
    fn randomized_noise_roundtrip() {
        setup();
        let mut rng = StdRng::seed_from_u64(41);
        let pixels: Vec<u8> = (0..31 * 7 * 3).map(|_| rng.gen()).collect();
        let encoded = encode(&pixels, 31, 7, Channels::Rgb, Colorspace::Linear).unwrap();
        let image = decode(&encoded, None).unwrap();
        assert_eq!(image.data, pixels);
    }

    #[test]
    fn gradient_image_roundtrip() {
        setup();
        let img = image::RgbaImage::from_fn(31, 17, |x, y| {
            image::Rgba([(x * 8) as u8, (y * 15) as u8, (x + y) as u8, 255])
        });
        let raw = img.into_raw();
        let encoded = encode(&raw, 31, 17, Channels::Rgba, Colorspace::Srgb).unwrap();
        let image = decode(&encoded, None).unwrap();
        assert_eq!(image.data, raw);
    }
}
