use crate::error::Error;
use crate::header::{Channels, Colorspace, Header};
use crate::pixel::Pixel;
use crate::{
    CACHE_SIZE, END_MARKER, HEADER_LEN, MAX_RUN, OP_DIFF, OP_INDEX, OP_LUMA, OP_RGB, OP_RGBA,
    OP_RUN,
};

/// Compress an interleaved pixel buffer into a QOI stream.
///
/// `pixels` must hold exactly `width * height * channels.count()` bytes in
/// row-major order. With three channels every pixel is opaque.
pub fn encode(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: Channels,
    colorspace: Colorspace,
) -> Result<Vec<u8>, Error> {
    let expected = width as u64 * height as u64 * channels.count() as u64;
    if pixels.len() as u64 != expected {
        return Err(Error::PixelBufferSize {
            expected,
            actual: pixels.len() as u64,
        });
    }

    let header = Header {
        width,
        height,
        channels,
        colorspace,
    };
    let mut encoder = Encoder::new(header);
    for chunk in pixels.chunks_exact(channels.count()) {
        let a = match channels {
            Channels::Rgba => chunk[3],
            Channels::Rgb => encoder.prev.a,
        };
        encoder.push(Pixel {
            r: chunk[0],
            g: chunk[1],
            b: chunk[2],
            a,
        });
    }
    let out = encoder.finish();
    debug!(
        "encoded {width}x{height} ({} channels) into {} bytes",
        channels.count(),
        out.len()
    );
    Ok(out)
}

/// Pending run of pixels identical to the previous one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Run {
    Idle,
    Counting(u8),
}

struct Encoder {
    cache: [u32; CACHE_SIZE],
    prev: Pixel,
    run: Run,
    out: Vec<u8>,
}

impl Encoder {
    fn new(header: Header) -> Encoder {
        // worst case is a full RGBA chunk for every pixel
        let cap = HEADER_LEN + header.pixel_count() as usize * 5 + END_MARKER.len();
        let mut out = Vec::with_capacity(cap);
        out.extend_from_slice(&header.to_bytes());
        Encoder {
            cache: [0; CACHE_SIZE],
            prev: Pixel::START,
            run: Run::Idle,
            out,
        }
    }

    #[inline(always)]
    fn push(&mut self, px: Pixel) {
        if px.packed() == self.prev.packed() {
            self.extend_run();
            return;
        }
        self.flush_run();
        self.emit(px);
        self.prev = px;
    }

    /// Grow the pending run by one pixel, flushing eagerly once a single
    /// chunk can no longer hold it.
    fn extend_run(&mut self) {
        self.run = match self.run {
            Run::Idle => Run::Counting(1),
            Run::Counting(n) if n + 1 == MAX_RUN => {
                self.out.push(OP_RUN | (MAX_RUN - 1));
                Run::Idle
            }
            Run::Counting(n) => Run::Counting(n + 1),
        };
        trace!("run state {:?}", self.run);
    }

    fn flush_run(&mut self) {
        if let Run::Counting(n) = self.run {
            debug_assert!(n < MAX_RUN);
            trace!("flush run of {n}");
            self.out.push(OP_RUN | (n - 1));
            self.run = Run::Idle;
        }
    }

    /// Emit the shortest chunk that reproduces `px`. Runs are already
    /// handled, so `px` differs from the previous pixel here.
    fn emit(&mut self, px: Pixel) {
        let v = px.packed();
        let slot = px.slot();
        if self.cache[slot] == v {
            trace!("cache hit, INDEX {slot}");
            self.out.push(OP_INDEX | slot as u8);
            return;
        }
        self.cache[slot] = v;

        if px.a != self.prev.a {
            trace!("alpha changed, RGBA");
            self.out
                .extend_from_slice(&[OP_RGBA, px.r, px.g, px.b, px.a]);
            return;
        }

        let dr = px.r.wrapping_sub(self.prev.r) as i8;
        let dg = px.g.wrapping_sub(self.prev.g) as i8;
        let db = px.b.wrapping_sub(self.prev.b) as i8;
        if (-2..=1).contains(&dr) && (-2..=1).contains(&dg) && (-2..=1).contains(&db) {
            trace!("DIFF {dr} {dg} {db}");
            self.out
                .push(OP_DIFF | ((dr + 2) as u8) << 4 | ((dg + 2) as u8) << 2 | (db + 2) as u8);
            return;
        }

        let dr_dg = dr.wrapping_sub(dg);
        let db_dg = db.wrapping_sub(dg);
        if (-32..=31).contains(&dg) && (-8..=7).contains(&dr_dg) && (-8..=7).contains(&db_dg) {
            trace!("LUMA {dg} {dr_dg} {db_dg}");
            self.out.extend_from_slice(&[
                OP_LUMA | (dg + 32) as u8,
                ((dr_dg + 8) as u8) << 4 | (db_dg + 8) as u8,
            ]);
            return;
        }

        trace!("RGB literal");
        self.out.extend_from_slice(&[OP_RGB, px.r, px.g, px.b]);
    }

    fn finish(mut self) -> Vec<u8> {
        self.flush_run();
        self.out.extend_from_slice(&END_MARKER);
        self.out
    }
}
