use crate::error::Error;
use crate::header::{Channels, Colorspace, Header};
use crate::pixel::Pixel;
use crate::{
    ARG_MASK, CACHE_SIZE, HEADER_LEN, OP_DIFF, OP_INDEX, OP_LUMA, OP_RGB, OP_RGBA, OP_RUN,
    TAG_MASK,
};

/// A fully decoded image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// Layout of `data`.
    pub channels: Channels,
    /// Carried over from the header verbatim.
    pub colorspace: Colorspace,
    pub data: Vec<u8>,
}

/// Decompress a QOI stream.
///
/// `channels` selects the output layout; `None` keeps the channel count
/// stored in the header. Decoding an opaque stream at four channels yields
/// an alpha of 255 everywhere; decoding at three channels drops alpha.
pub fn decode(bytes: &[u8], channels: Option<Channels>) -> Result<Image, Error> {
    let header = Header::parse(bytes)?;
    let out_channels = channels.unwrap_or(header.channels);

    let total = header
        .pixel_count()
        .checked_mul(out_channels.count() as u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(Error::OversizedImage)?;
    if header.pixel_count() > 0 && bytes.len() == HEADER_LEN {
        return Err(Error::UnexpectedEof);
    }

    let mut decoder = Decoder {
        input: &bytes[HEADER_LEN..],
        pos: 0,
        cache: [0; CACHE_SIZE],
        prev: Pixel::START,
    };
    let mut data = Vec::with_capacity(total);
    let px_len = out_channels.count();
    while data.len() < total {
        let (px, repeat) = decoder.step()?;
        let remaining = (total - data.len()) / px_len;
        for _ in 0..repeat.min(remaining) {
            data.push(px.r);
            data.push(px.g);
            data.push(px.b);
            if out_channels == Channels::Rgba {
                data.push(px.a);
            }
        }
    }
    debug!(
        "decoded {}x{} ({px_len} channels) from {} bytes",
        header.width,
        header.height,
        bytes.len()
    );

    Ok(Image {
        width: header.width,
        height: header.height,
        channels: out_channels,
        colorspace: header.colorspace,
        data,
    })
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    cache: [u32; CACHE_SIZE],
    prev: Pixel,
}

impl Decoder<'_> {
    #[inline(always)]
    fn take(&mut self) -> Result<u8, Error> {
        let byte = *self.input.get(self.pos).ok_or(Error::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Interpret one chunk. Returns the resolved pixel and how many times
    /// it repeats.
    fn step(&mut self) -> Result<(Pixel, usize), Error> {
        // The encoder inserts each new color before emitting its chunk.
        // Replaying the previous pixel here rebuilds that table one pixel
        // later, collisions included; after INDEX hits and runs the store
        // is a value no-op, so it runs unconditionally.
        self.cache[self.prev.slot()] = self.prev.packed();

        let byte = self.take()?;
        let px = match byte {
            OP_RGB => Pixel {
                r: self.take()?,
                g: self.take()?,
                b: self.take()?,
                a: self.prev.a,
            },
            OP_RGBA => Pixel {
                r: self.take()?,
                g: self.take()?,
                b: self.take()?,
                a: self.take()?,
            },
            _ => match byte & TAG_MASK {
                OP_INDEX => {
                    let slot = (byte & ARG_MASK) as usize;
                    trace!("INDEX {slot}");
                    Pixel::from_packed(self.cache[slot])
                }
                OP_DIFF => Pixel {
                    r: self.prev.r.wrapping_add((byte >> 4) & 0x03).wrapping_sub(2),
                    g: self.prev.g.wrapping_add((byte >> 2) & 0x03).wrapping_sub(2),
                    b: self.prev.b.wrapping_add(byte & 0x03).wrapping_sub(2),
                    a: self.prev.a,
                },
                OP_LUMA => {
                    let dg = (byte & ARG_MASK).wrapping_sub(32);
                    let operand = self.take()?;
                    Pixel {
                        r: self
                            .prev
                            .r
                            .wrapping_add(dg)
                            .wrapping_add((operand >> 4).wrapping_sub(8)),
                        g: self.prev.g.wrapping_add(dg),
                        b: self
                            .prev
                            .b
                            .wrapping_add(dg)
                            .wrapping_add((operand & 0x0f).wrapping_sub(8)),
                        a: self.prev.a,
                    }
                }
                OP_RUN => {
                    let count = (byte & ARG_MASK) as usize + 1;
                    trace!("RUN x{count}");
                    return Ok((self.prev, count));
                }
                _ => unreachable!("two bit tags cover every byte"),
            },
        };
        trace!("pixel {px:?}");
        self.prev = px;
        Ok((px, 1))
    }
}
