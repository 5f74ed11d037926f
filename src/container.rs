use crate::capability::{
    ArchiveEntry, BuiltinInflater, Decompress, ExpandArchive, NewcExpander, is_cpio,
    sniff_compression,
};
use crate::scanner;
use crate::signatures::{
    ANDROID_BOOT_MAGIC, CPIO_NEWC_MAGIC, FormatTag, GZIP_MAGIC, LZ4_LEGACY_MAGIC, ZIMAGE_MAGIC,
};
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Branch {
    name: &'static str,
    magic: &'static [u8],
    format: FormatTag,
    /// Ramdisk/initrd branches get handed to the decompression and archive
    /// capabilities after slicing.
    delegate: bool,
}

const BRANCHES: [Branch; 5] = [
    Branch {
        name: "zImage",
        magic: &ZIMAGE_MAGIC,
        format: FormatTag::ZImage,
        delegate: false,
    },
    Branch {
        name: "kernel",
        magic: ANDROID_BOOT_MAGIC,
        format: FormatTag::AndroidBoot,
        delegate: false,
    },
    Branch {
        name: "initrd.img",
        magic: &GZIP_MAGIC,
        format: FormatTag::Gzip,
        delegate: true,
    },
    Branch {
        name: "ramdisk.cpio",
        magic: CPIO_NEWC_MAGIC,
        format: FormatTag::Cpio,
        delegate: true,
    },
    Branch {
        name: "lz4",
        magic: &LZ4_LEGACY_MAGIC,
        format: FormatTag::Lz4,
        delegate: false,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchStatus {
    /// Magic not present; a skipped branch, not an error.
    Absent,
    /// Part written out as the rest of the blob from its offset.
    Extracted { offset: usize },
    /// Part written out, decompressed and expanded into a subdirectory.
    Expanded { offset: usize, entries: usize },
    /// Part located but the branch failed; siblings are unaffected.
    Failed { offset: usize, reason: String },
}

#[derive(Debug, Clone)]
pub struct BranchOutcome {
    pub name: &'static str,
    pub format: FormatTag,
    pub status: BranchStatus,
}

#[derive(Debug, Clone)]
pub struct InspectReport {
    pub outcomes: Vec<BranchOutcome>,
}

impl InspectReport {
    /// Branches that produced at least a part file.
    pub fn produced_output(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.status,
                    BranchStatus::Extracted { .. } | BranchStatus::Expanded { .. }
                )
            })
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, BranchStatus::Failed { .. }))
            .count()
    }
}

/// One-shot splitter for Android boot/recovery images: a fixed set of
/// branches, each tried once on the first occurrence of its magic. Container
/// tools self-delimit, so every slice runs from the magic to the end of the
/// blob and may carry trailing unrelated data.
pub struct ContainerInspector<D = BuiltinInflater, A = NewcExpander> {
    inflater: D,
    expander: A,
}

impl ContainerInspector {
    pub fn new() -> Self {
        Self {
            inflater: BuiltinInflater,
            expander: NewcExpander,
        }
    }
}

impl Default for ContainerInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Decompress, A: ExpandArchive> ContainerInspector<D, A> {
    pub fn with_capabilities(inflater: D, expander: A) -> Self {
        Self { inflater, expander }
    }

    /// Attempt all branches once and report each outcome. Only the output
    /// directory itself failing to materialize is fatal.
    pub fn inspect(&self, blob: &[u8], output_dir: &Path) -> io::Result<InspectReport> {
        fs::create_dir_all(output_dir)?;

        let mut outcomes = Vec::with_capacity(BRANCHES.len());
        for branch in &BRANCHES {
            let status = match scanner::find_first(blob, branch.magic) {
                None => BranchStatus::Absent,
                Some(offset) => self.run_branch(branch, blob, offset, output_dir),
            };
            outcomes.push(BranchOutcome {
                name: branch.name,
                format: branch.format,
                status,
            });
        }
        Ok(InspectReport { outcomes })
    }

    fn run_branch(
        &self,
        branch: &Branch,
        blob: &[u8],
        offset: usize,
        output_dir: &Path,
    ) -> BranchStatus {
        let slice = &blob[offset..];
        let part_path = output_dir.join(branch.name);
        if let Err(e) = fs::write(&part_path, slice) {
            warn!(part = branch.name, offset, error = %e, "failed to write container part");
            return BranchStatus::Failed {
                offset,
                reason: e.to_string(),
            };
        }

        if !branch.delegate {
            return BranchStatus::Extracted { offset };
        }
        match self.expand_ramdisk(branch, slice, output_dir) {
            Ok(entries) => BranchStatus::Expanded { offset, entries },
            Err(reason) => {
                warn!(part = branch.name, offset, %reason, "ramdisk branch failed");
                BranchStatus::Failed { offset, reason }
            }
        }
    }

    fn expand_ramdisk(
        &self,
        branch: &Branch,
        slice: &[u8],
        output_dir: &Path,
    ) -> Result<usize, String> {
        let inflated;
        let payload: &[u8] = match sniff_compression(slice) {
            Some(format) => {
                inflated = self
                    .inflater
                    .decompress(slice, format)
                    .map_err(|e| e.to_string())?;
                &inflated
            }
            None => slice,
        };

        // compression hides the inner format, so sniff again after inflating
        if !is_cpio(payload) {
            return Err("decompressed stream is not a cpio archive".to_string());
        }
        let entries = self.expander.expand(payload).map_err(|e| e.to_string())?;

        let contents_dir = output_dir.join(contents_dir_name(branch.name));
        write_entries(&entries, &contents_dir).map_err(|e| e.to_string())?;
        Ok(entries.len())
    }
}

/// `initrd.img` expands under `initrd_contents/`, `ramdisk.cpio` under
/// `ramdisk_contents/`.
fn contents_dir_name(part: &str) -> String {
    let stem = part.split('.').next().unwrap_or(part);
    format!("{stem}_contents")
}

fn write_entries(entries: &[ArchiveEntry], dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    for entry in entries {
        if let Err(e) = write_entry(entry, dir) {
            warn!(path = %entry.path, error = %e, "failed to materialize archive entry");
        }
    }
    Ok(())
}

fn write_entry(entry: &ArchiveEntry, dir: &Path) -> io::Result<()> {
    let path = dir.join(&entry.path);
    if entry.is_dir() {
        return fs::create_dir_all(&path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &entry.data)
}
