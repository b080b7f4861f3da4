//! Colour profile handles
//!
//! A reader resolves a colour profile from whatever the image carries:
//! - an embedded ICC profile (JPEG APP2, PNG iCCP)
//! - a named colour space (PNG sRGB chunk, EXIF ColorSpace tag)
//! - calibration data (PNG cHRM + gAMA, EXIF white point / primaries / gamma)
//!
//! Turning these into a colour-management transform is left to the caller.

/// A CIE 1931 xy chromaticity coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chromaticity {
    pub x: f64,
    pub y: f64,
}

impl Chromaticity {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Red, green and blue primaries of an RGB colour space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primaries {
    pub red: Chromaticity,
    pub green: Chromaticity,
    pub blue: Chromaticity,
}

/// D65 white point shared by sRGB and Adobe RGB (1998)
const D65: Chromaticity = Chromaticity::new(0.3127, 0.3290);

const SRGB_PRIMARIES: Primaries = Primaries {
    red: Chromaticity::new(0.64, 0.33),
    green: Chromaticity::new(0.30, 0.60),
    blue: Chromaticity::new(0.15, 0.06),
};

const ADOBE_RGB_PRIMARIES: Primaries = Primaries {
    red: Chromaticity::new(0.64, 0.33),
    green: Chromaticity::new(0.21, 0.71),
    blue: Chromaticity::new(0.15, 0.06),
};

/// Gamma assumed when calibration data omits it
pub(crate) const DEFAULT_GAMMA: f64 = 2.2;

/// Decoded colour profile of an image
#[derive(Debug, Clone, PartialEq)]
pub enum ColorProfile {
    /// Raw ICC profile bytes embedded in the image
    Embedded(Vec<u8>),
    /// The sRGB colour space
    Srgb,
    /// The Adobe RGB (1998) colour space
    AdobeRgb,
    /// A colour space described by its white point, primaries and gamma
    Calibrated {
        white_point: Chromaticity,
        primaries: Primaries,
        gamma: f64,
    },
}

impl ColorProfile {
    /// ICC profile bytes, if the profile was embedded
    pub fn icc_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Embedded(data) => Some(data),
            _ => None,
        }
    }

    /// White point, primaries and gamma of a non-embedded profile
    ///
    /// sRGB is approximated with a pure 2.2 gamma.
    pub fn chromaticities(&self) -> Option<(Chromaticity, Primaries, f64)> {
        match self {
            Self::Embedded(_) => None,
            Self::Srgb => Some((D65, SRGB_PRIMARIES, DEFAULT_GAMMA)),
            Self::AdobeRgb => Some((D65, ADOBE_RGB_PRIMARIES, 563.0 / 256.0)),
            Self::Calibrated {
                white_point,
                primaries,
                gamma,
            } => Some((*white_point, *primaries, *gamma)),
        }
    }
}

#[cfg(feature = "png")]
pub(crate) use self::png::{from_chrm_gama, inflate_iccp};

#[cfg(feature = "png")]
mod png {
    use super::{Chromaticity, ColorProfile, Primaries};
    use byteorder::{BigEndian, ByteOrder};
    use flate2::{Decompress, FlushDecompress, Status};

    /// Starting size of the inflate output buffer (1KB); doubles as needed
    pub(crate) const INFLATE_INITIAL_SIZE: usize = 1024;

    /// PNG limits iCCP profile names to 79 bytes
    const MAX_PROFILE_NAME: usize = 79;

    /// Fixed-point scale of cHRM and gAMA values
    const PNG_FIXED_POINT: f64 = 100_000.0;

    /// Inflate the profile carried by an iCCP chunk payload
    ///
    /// The payload is `profile-name\0 compression-method compressed-bytes`.
    /// Returns `None` if the name is unterminated, the method is not deflate,
    /// the stream is corrupt or truncated, or the output exceeds `max_size`.
    pub(crate) fn inflate_iccp(chunk: &[u8], max_size: usize) -> Option<Vec<u8>> {
        let name_end = chunk
            .iter()
            .take(MAX_PROFILE_NAME + 1)
            .position(|&b| b == 0)?;
        let method = *chunk.get(name_end + 1)?;
        if method != 0 {
            log::warn!("iCCP: unsupported compression method {}", method);
            return None;
        }
        let compressed = &chunk[name_end + 2..];

        let mut inflater = Decompress::new(true);
        let mut out = Vec::with_capacity(INFLATE_INITIAL_SIZE.min(max_size));

        loop {
            let before_in = inflater.total_in();
            let before_out = inflater.total_out();
            let input = &compressed[before_in as usize..];

            let status = match inflater.decompress_vec(input, &mut out, FlushDecompress::Finish) {
                Ok(status) => status,
                Err(e) => {
                    log::warn!("iCCP: corrupt deflate stream: {}", e);
                    return None;
                }
            };

            if status == Status::StreamEnd {
                if out.len() > max_size {
                    break;
                }
                return Some(out);
            }

            if out.len() == out.capacity() {
                if out.len() > max_size {
                    break;
                }
                // One byte of headroom past the ceiling detects overflow
                let grow = out
                    .capacity()
                    .max(1)
                    .min(max_size.saturating_add(1) - out.len());
                out.reserve_exact(grow);
            } else if inflater.total_in() == before_in && inflater.total_out() == before_out {
                log::warn!("iCCP: deflate stream ended early");
                return None;
            }
        }

        log::warn!("iCCP: inflated profile exceeds {} bytes", max_size);
        None
    }

    /// Build a calibrated profile from cHRM (32 bytes) and gAMA (4 bytes) payloads
    pub(crate) fn from_chrm_gama(chrm: &[u8], gama: &[u8]) -> Option<ColorProfile> {
        if chrm.len() != 32 || gama.len() != 4 {
            return None;
        }

        let gama_value = BigEndian::read_u32(gama);
        if gama_value == 0 {
            return None;
        }

        let mut values = [0u32; 8];
        BigEndian::read_u32_into(chrm, &mut values);
        let point = |i: usize| {
            Chromaticity::new(
                values[i] as f64 / PNG_FIXED_POINT,
                values[i + 1] as f64 / PNG_FIXED_POINT,
            )
        };

        Some(ColorProfile::Calibrated {
            white_point: point(0),
            primaries: Primaries {
                red: point(2),
                green: point(4),
                blue: point(6),
            },
            gamma: PNG_FIXED_POINT / gama_value as f64,
        })
    }
}

#[cfg(feature = "exif")]
pub(crate) fn from_exif(info: &crate::tiff::ExifInfo) -> Option<ColorProfile> {
    use crate::tiff::color_space;

    match info.color_space? {
        color_space::SRGB => Some(ColorProfile::Srgb),
        color_space::ADOBE_RGB => Some(ColorProfile::AdobeRgb),
        color_space::UNCALIBRATED => {
            let [wx, wy] = info.white_point?;
            let [rx, ry, gx, gy, bx, by] = info.primary_chromaticities?;
            Some(ColorProfile::Calibrated {
                white_point: Chromaticity::new(wx, wy),
                primaries: Primaries {
                    red: Chromaticity::new(rx, ry),
                    green: Chromaticity::new(gx, gy),
                    blue: Chromaticity::new(bx, by),
                },
                gamma: info.gamma.unwrap_or(DEFAULT_GAMMA),
            })
        }
        other => {
            log::debug!("EXIF: no profile for colour space 0x{:04X}", other);
            None
        }
    }
}
