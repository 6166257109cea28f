use std::str::FromStr;

use crate::error::Error;
use crate::{HEADER_LEN, MAGIC};

/// Number of interleaved 8 bit channels per pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Channels {
    Rgb = 3,
    #[default]
    Rgba = 4,
}

impl Channels {
    /// Bytes per pixel.
    #[inline(always)]
    pub fn count(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Channels {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            3 => Ok(Channels::Rgb),
            4 => Ok(Channels::Rgba),
            other => Err(Error::InvalidChannels(other)),
        }
    }
}

/// Colorspace tag carried in the header. Purely informative, pixel values
/// are never converted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Colorspace {
    #[default]
    Srgb = 0,
    Linear = 1,
}

impl Colorspace {
    pub fn name(self) -> &'static str {
        match self {
            Colorspace::Srgb => "srgb",
            Colorspace::Linear => "linear",
        }
    }
}

impl TryFrom<u8> for Colorspace {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(Colorspace::Srgb),
            1 => Ok(Colorspace::Linear),
            other => Err(Error::InvalidColorspace(other)),
        }
    }
}

impl FromStr for Colorspace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "srgb" => Ok(Colorspace::Srgb),
            "linear" => Ok(Colorspace::Linear),
            other => Err(Error::InvalidColorspaceName(other.to_string())),
        }
    }
}

/// The fixed 14 byte preamble of every stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
    pub colorspace: Colorspace,
}

impl Header {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0; HEADER_LEN];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4..8].copy_from_slice(&self.width.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.height.to_be_bytes());
        bytes[12] = self.channels as u8;
        bytes[13] = self.colorspace as u8;
        bytes
    }

    pub fn parse(bytes: &[u8]) -> Result<Header, Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::TruncatedHeader(bytes.len()));
        }
        if bytes[0..4] != MAGIC {
            return Err(Error::BadMagic([bytes[0], bytes[1], bytes[2], bytes[3]]));
        }
        Ok(Header {
            width: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            height: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            channels: Channels::try_from(bytes[12])?,
            colorspace: Colorspace::try_from(bytes[13])?,
        })
    }

    /// Total pixels, wide enough to never overflow.
    pub(crate) fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}
