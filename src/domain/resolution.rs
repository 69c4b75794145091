use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Frame size of a stream plus the bitrate a rendition should target.
///
/// The two comparisons are partial orders on both dimensions at once: a frame
/// that is wider but shorter than another is neither greater-or-equal nor
/// strictly greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u64,
    pub height: u64,
    #[serde(default)]
    pub bitrate: u64,
}

impl Resolution {
    pub const fn new(width: u64, height: u64) -> Self {
        Self {
            width,
            height,
            bitrate: 0,
        }
    }

    pub const fn with_bitrate(self, bitrate: u64) -> Self {
        Self { bitrate, ..self }
    }

    pub fn greater_or_equal(&self, other: &Resolution) -> bool {
        self.width >= other.width && self.height >= other.height
    }

    pub fn strictly_greater(&self, other: &Resolution) -> bool {
        self.width > other.width && self.height > other.height
    }

    /// `WxH`, the form ffmpeg expects after `-s`.
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bitrate > 0 {
            write!(f, "{}x{}@{}", self.width, self.height, self.bitrate)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid resolution '{0}', expected WIDTHxHEIGHT[@BITRATE]")]
pub struct ParseResolutionError(String);

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseResolutionError(s.to_string());
        let (size, bitrate) = match s.split_once('@') {
            Some((size, bitrate)) => (size, Some(bitrate)),
            None => (s, None),
        };
        let (width, height) = size.split_once('x').ok_or_else(err)?;
        let width = width.trim().parse().map_err(|_| err())?;
        let height = height.trim().parse().map_err(|_| err())?;
        let bitrate = match bitrate {
            Some(b) => b.trim().parse().map_err(|_| err())?,
            None => 0,
        };
        Ok(Resolution {
            width,
            height,
            bitrate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparisons_are_reflexive_only_for_greater_or_equal() {
        for res in [
            Resolution::new(0, 0),
            Resolution::new(640, 480),
            Resolution::new(1920, 1080),
            Resolution::new(1080, 1920),
        ] {
            assert!(res.greater_or_equal(&res));
            assert!(!res.strictly_greater(&res));
        }
    }

    #[test]
    fn test_wide_but_short_is_incomparable() {
        let wide = Resolution::new(1920, 400);
        let tall = Resolution::new(640, 480);
        assert!(!wide.greater_or_equal(&tall));
        assert!(!tall.greater_or_equal(&wide));
        assert!(!wide.strictly_greater(&tall));
        assert!(!tall.strictly_greater(&wide));
    }

    #[test]
    fn test_strictly_greater_needs_both_dimensions() {
        let uhd = Resolution::new(3840, 2160);
        let fhd = Resolution::new(1920, 1080);
        assert!(uhd.strictly_greater(&fhd));
        assert!(!Resolution::new(1920, 2160).strictly_greater(&fhd));
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "854x480@800000".parse::<Resolution>().unwrap(),
            Resolution::new(854, 480).with_bitrate(800000)
        );
        assert_eq!(
            "1280x720".parse::<Resolution>().unwrap(),
            Resolution::new(1280, 720)
        );
        assert!("1280".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }
}
