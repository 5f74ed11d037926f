//! Capability seams the carving core delegates to: stream decompression and
//! archive expansion. The built-in providers run in-process and are bounded
//! by their input; an out-of-process provider would hang its timeout here.

use crate::error::{ArchiveError, DecodeError};
use flate2::read::GzDecoder;
use lz4_flex::frame::FrameDecoder;
use std::io::Read;
use tracing::debug;

pub const LZ4_FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Lz4,
}

/// Detect the compression wrapping a slice, if any.
pub fn sniff_compression(data: &[u8]) -> Option<Compression> {
    if data.starts_with(&[0x1F, 0x8B]) {
        Some(Compression::Gzip)
    } else if data.starts_with(&LZ4_FRAME_MAGIC)
        || data.starts_with(&crate::signatures::LZ4_LEGACY_MAGIC)
    {
        Some(Compression::Lz4)
    } else {
        None
    }
}

pub fn is_cpio(data: &[u8]) -> bool {
    data.starts_with(b"070701") || data.starts_with(b"070702")
}

pub trait Decompress {
    fn decompress(&self, data: &[u8], format: Compression) -> Result<Vec<u8>, DecodeError>;
}

pub trait ExpandArchive {
    fn expand(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError>;
}

/// One expanded archive member with its original relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub mode: u32,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn is_dir(&self) -> bool {
        self.mode & 0o170000 == 0o040000
    }
}

/// In-process gzip/lz4 decoder. Kernel ramdisks compressed with the legacy
/// lz4 frame format are reported, not decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinInflater;

impl Decompress for BuiltinInflater {
    fn decompress(&self, data: &[u8], format: Compression) -> Result<Vec<u8>, DecodeError> {
        match format {
            Compression::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(DecodeError::Gzip)?;
                Ok(out)
            }
            Compression::Lz4 => {
                if data.starts_with(&crate::signatures::LZ4_LEGACY_MAGIC) {
                    return Err(DecodeError::LegacyLz4Frame);
                }
                let mut out = Vec::new();
                FrameDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(DecodeError::Lz4)?;
                Ok(out)
            }
        }
    }
}

const NEWC_HEADER_LEN: usize = 110;
const NEWC_TRAILER: &str = "TRAILER!!!";

/// Walker for cpio `newc`/`crc` archives (the ramdisk flavor). Tolerates
/// trailing non-archive bytes after the last entry, since carved slices run
/// to the end of the blob.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewcExpander;

impl ExpandArchive for NewcExpander {
    fn expand(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut entries = Vec::new();
        let mut pos = 0usize;
        let mut index = 0usize;

        loop {
            if pos + NEWC_HEADER_LEN > data.len() {
                if entries.is_empty() {
                    return Err(ArchiveError::BadMagic { index });
                }
                break;
            }
            let header = &data[pos..pos + NEWC_HEADER_LEN];
            if !is_cpio(header) {
                if entries.is_empty() {
                    return Err(ArchiveError::BadMagic { index });
                }
                // past the final entry, into carved trailing garbage
                break;
            }

            let mode = hex_field(header, 1).ok_or(ArchiveError::BadHeaderField { index })?;
            let filesize =
                hex_field(header, 6).ok_or(ArchiveError::BadHeaderField { index })? as usize;
            let namesize =
                hex_field(header, 11).ok_or(ArchiveError::BadHeaderField { index })? as usize;

            let name_start = pos + NEWC_HEADER_LEN;
            let name_end = name_start + namesize;
            if namesize == 0 || name_end > data.len() {
                return Err(ArchiveError::Truncated {
                    index,
                    name: String::new(),
                });
            }
            let raw_name = &data[name_start..name_end];
            let raw_name = raw_name.split(|&b| b == 0).next().unwrap_or(&[]);
            let name = String::from_utf8_lossy(raw_name).into_owned();
            if name == NEWC_TRAILER {
                break;
            }

            // header plus name is padded to a 4-byte boundary, then the data
            let data_start = align4(name_end);
            let data_end = data_start + filesize;
            if data_end > data.len() {
                return Err(ArchiveError::Truncated { index, name });
            }

            match sanitize_path(&name) {
                Some(path) => entries.push(ArchiveEntry {
                    path,
                    mode,
                    data: data[data_start..data_end].to_vec(),
                }),
                None => debug!(name = %name, "skipping archive entry with unsafe path"),
            }

            pos = align4(data_end);
            index += 1;
        }

        Ok(entries)
    }
}

fn align4(n: usize) -> usize {
    n.div_ceil(4) * 4
}

/// Parse one of the 13 fixed-width hex fields following the newc magic.
fn hex_field(header: &[u8], field: usize) -> Option<u32> {
    let start = 6 + field * 8;
    let text = std::str::from_utf8(&header[start..start + 8]).ok()?;
    u32::from_str_radix(text, 16).ok()
}

/// Relative path with no `..` escape and no absolute prefix; `.` and the
/// current-directory entry are dropped.
fn sanitize_path(name: &str) -> Option<String> {
    let trimmed = name.trim_start_matches('/').trim_start_matches("./");
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    if trimmed.split('/').any(|part| part == "..") {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression as GzLevel;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn newc_entry(name: &str, mode: u32, body: &[u8]) -> Vec<u8> {
        let mut header = String::from("070701");
        let fields = [
            1u32,
            mode,
            0,
            0,
            1,
            0,
            body.len() as u32,
            0,
            0,
            0,
            0,
            (name.len() + 1) as u32,
            0,
        ];
        for value in fields {
            header.push_str(&format!("{value:08X}"));
        }
        let mut out = header.into_bytes();
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out.extend_from_slice(body);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }

    fn newc_archive(members: &[(&str, u32, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, mode, body) in members {
            out.extend(newc_entry(name, *mode, body));
        }
        out.extend(newc_entry(NEWC_TRAILER, 0, &[]));
        out
    }

    #[test]
    fn gzip_round_trips_through_the_builtin_inflater() {
        let mut enc = GzEncoder::new(Vec::new(), GzLevel::default());
        enc.write_all(b"ramdisk bytes").unwrap();
        let compressed = enc.finish().unwrap();

        let out = BuiltinInflater
            .decompress(&compressed, Compression::Gzip)
            .unwrap();
        assert_eq!(out, b"ramdisk bytes");
    }

    #[test]
    fn corrupt_gzip_is_a_decode_error() {
        let garbage = [0x1F, 0x8B, 0x08, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            BuiltinInflater.decompress(&garbage, Compression::Gzip),
            Err(DecodeError::Gzip(_))
        ));
    }

    #[test]
    fn legacy_lz4_frames_are_reported_unsupported() {
        let data = [0x02, 0x21, 0x4C, 0x18, 0x00, 0x00];
        assert!(matches!(
            BuiltinInflater.decompress(&data, Compression::Lz4),
            Err(DecodeError::LegacyLz4Frame)
        ));
    }

    #[test]
    fn newc_archive_expands_to_its_members() {
        let archive = newc_archive(&[
            ("etc", 0o040755, b""),
            ("etc/fstab", 0o100644, b"/dev/root / ext4"),
            ("init", 0o100755, b"#!/bin/sh"),
        ]);
        let entries = NewcExpander.expand(&archive).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_dir());
        assert_eq!(entries[1].path, "etc/fstab");
        assert_eq!(entries[1].data, b"/dev/root / ext4");
        assert_eq!(entries[2].path, "init");
    }

    #[test]
    fn trailing_garbage_after_the_trailer_is_tolerated() {
        let mut archive = newc_archive(&[("init", 0o100755, b"x")]);
        archive.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let entries = NewcExpander.expand(&archive).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn non_archive_input_is_a_bad_magic_error() {
        assert!(matches!(
            NewcExpander.expand(b"not an archive at all"),
            Err(ArchiveError::BadMagic { index: 0 })
        ));
    }

    #[test]
    fn truncated_member_body_is_an_archive_error() {
        let full = newc_entry("data.bin", 0o100644, &[0x55; 64]);
        let cut = &full[..full.len() - 32];
        assert!(matches!(
            NewcExpander.expand(cut),
            Err(ArchiveError::Truncated { .. })
        ));
    }

    #[test]
    fn absolute_and_escaping_paths_are_dropped() {
        let archive = newc_archive(&[
            ("/etc/passwd", 0o100644, b"a"),
            ("../outside", 0o100644, b"b"),
            ("ok.txt", 0o100644, b"c"),
        ]);
        let entries = NewcExpander.expand(&archive).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["etc/passwd", "ok.txt"]);
    }
}
