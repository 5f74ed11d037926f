use aho_corasick::AhoCorasick;
use std::fmt;

pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
pub const PNG_IEND: [u8; 8] = [0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82];
pub const ZIMAGE_MAGIC: [u8; 4] = [0x18, 0x28, 0x6F, 0x01];
pub const LZ4_LEGACY_MAGIC: [u8; 4] = [0x02, 0x21, 0x4C, 0x18];
pub const GZIP_MAGIC: [u8; 3] = [0x1F, 0x8B, 0x08];
pub const ANDROID_BOOT_MAGIC: &[u8] = b"ANDROID!";
pub const CPIO_NEWC_MAGIC: &[u8] = b"070701";

/// Ceiling for payloads whose end must be guessed rather than derived.
/// Deliberately lossy for malformed/streamed PNGs; configurable per carve.
pub const DEFAULT_MAX_PAYLOAD: usize = 5_000_000;

/// Smallest possible BMP: file header alone is 14 bytes.
pub const BMP_MIN_LEN: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Jpeg,
    Png,
    Bmp,
    Gzip,
    Lz4,
    Cpio,
    AndroidBoot,
    ZImage,
}

impl FormatTag {
    pub fn extension(&self) -> &'static str {
        match self {
            FormatTag::Jpeg => "jpg",
            FormatTag::Png => "png",
            FormatTag::Bmp => "bmp",
            FormatTag::Gzip => "gz",
            FormatTag::Lz4 => "lz4",
            FormatTag::Cpio => "cpio",
            FormatTag::AndroidBoot => "img",
            FormatTag::ZImage => "bin",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormatTag::Jpeg => "JPEG",
            FormatTag::Png => "PNG",
            FormatTag::Bmp => "BMP",
            FormatTag::Gzip => "gzip",
            FormatTag::Lz4 => "lz4",
            FormatTag::Cpio => "cpio",
            FormatTag::AndroidBoot => "Android boot",
            FormatTag::ZImage => "zImage",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How the end of a payload is located, given the blob and the match offset.
/// Every strategy is a pure function and never reads past the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndStrategy {
    /// Forward scan for a trailer; no trailer means the candidate is dropped.
    TrailerScan(&'static [u8]),
    /// Forward scan for a trailer, falling back to the configured payload
    /// ceiling when it is absent.
    TrailerOrCap(&'static [u8]),
    /// Little-endian u32 length at bytes 2..6 of the header (BMP).
    LengthField,
    /// No self-contained end marker; the payload is the rest of the blob and
    /// the downstream tool determines its own consumed length.
    RestOfBlob,
}

#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub pattern: &'static [u8],
    pub format: FormatTag,
    pub strategy: EndStrategy,
}

impl Signature {
    pub const fn new(pattern: &'static [u8], format: FormatTag, strategy: EndStrategy) -> Self {
        Self {
            pattern,
            format,
            strategy,
        }
    }
}

/// Process-wide, read-only registry of magics. Built once; the compiled
/// multi-pattern matcher is shared by every scan over the table.
pub struct SignatureTable {
    signatures: Vec<Signature>,
    matcher: Option<AhoCorasick>,
}

impl SignatureTable {
    pub fn new(signatures: Vec<Signature>) -> Self {
        let matcher = AhoCorasick::new(signatures.iter().map(|s| s.pattern)).ok();
        Self {
            signatures,
            matcher,
        }
    }

    /// Raster formats for generic multi-format carving. Longer JPEG markers
    /// come first so the same-offset tie goes to the more specific pattern.
    pub fn images() -> Self {
        Self::new(vec![
            Signature::new(
                &[0xFF, 0xD8, 0xFF, 0xE0],
                FormatTag::Jpeg,
                EndStrategy::TrailerScan(&JPEG_EOI),
            ),
            Signature::new(
                &[0xFF, 0xD8, 0xFF, 0xE1],
                FormatTag::Jpeg,
                EndStrategy::TrailerScan(&JPEG_EOI),
            ),
            Signature::new(
                &[0xFF, 0xD8, 0xFF],
                FormatTag::Jpeg,
                EndStrategy::TrailerScan(&JPEG_EOI),
            ),
            Signature::new(
                &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
                FormatTag::Png,
                EndStrategy::TrailerOrCap(&PNG_IEND),
            ),
            Signature::new(b"BM", FormatTag::Bmp, EndStrategy::LengthField),
        ])
    }

    /// JPEG only, for the name-hint scan over firmware splash containers.
    pub fn jpeg_only() -> Self {
        Self::new(vec![Signature::new(
            &[0xFF, 0xD8, 0xFF],
            FormatTag::Jpeg,
            EndStrategy::TrailerScan(&JPEG_EOI),
        )])
    }

    /// Container formats. Ends are delegated downstream, so everything is
    /// rest-of-blob.
    pub fn containers() -> Self {
        Self::new(vec![
            Signature::new(&ZIMAGE_MAGIC, FormatTag::ZImage, EndStrategy::RestOfBlob),
            Signature::new(
                ANDROID_BOOT_MAGIC,
                FormatTag::AndroidBoot,
                EndStrategy::RestOfBlob,
            ),
            Signature::new(&GZIP_MAGIC, FormatTag::Gzip, EndStrategy::RestOfBlob),
            Signature::new(CPIO_NEWC_MAGIC, FormatTag::Cpio, EndStrategy::RestOfBlob),
            Signature::new(&LZ4_LEGACY_MAGIC, FormatTag::Lz4, EndStrategy::RestOfBlob),
        ])
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub(crate) fn matcher(&self) -> Option<&AhoCorasick> {
        self.matcher.as_ref()
    }
}
