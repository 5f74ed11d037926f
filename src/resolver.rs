use crate::error::{RejectReason, Rejection};
use crate::scanner::Candidate;
use crate::signatures::{BMP_MIN_LEN, EndStrategy, FormatTag};
use memchr::memmem;

/// A validated byte range inside the blob. Invariant: start < end <= blob len.
/// Carries offsets only; the carver borrows the slice when materializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPayload {
    pub start: usize,
    pub end: usize,
    pub format: FormatTag,
}

/// Compute where the candidate's payload ends, or reject it. Never panics on
/// malformed input and never reads past the blob boundary.
pub fn resolve(
    blob: &[u8],
    candidate: &Candidate,
    max_payload: usize,
) -> Result<ResolvedPayload, Rejection> {
    let start = candidate.offset;
    let reject = |reason| Rejection {
        offset: start,
        format: candidate.format,
        reason,
    };

    let end = match candidate.strategy {
        EndStrategy::TrailerScan(trailer) => {
            // No trailer inside the registered magics can false-positive, so
            // searching from the match offset itself is safe and also finds
            // degenerate zero-body payloads.
            match memmem::find(&blob[start..], trailer) {
                Some(pos) => start + pos + trailer.len(),
                None => return Err(reject(RejectReason::MissingTrailer)),
            }
        }
        EndStrategy::TrailerOrCap(trailer) => match memmem::find(&blob[start..], trailer) {
            Some(pos) => start + pos + trailer.len(),
            // Lossy fallback for streamed or malformed payloads; the cap is
            // a configured guess, not a derived fact.
            None => (start + max_payload).min(blob.len()),
        },
        EndStrategy::LengthField => {
            if blob.len() < start + 6 {
                return Err(reject(RejectReason::TruncatedHeader));
            }
            let declared = u32::from_le_bytes([
                blob[start + 2],
                blob[start + 3],
                blob[start + 4],
                blob[start + 5],
            ]);
            if declared < BMP_MIN_LEN {
                return Err(reject(RejectReason::LengthTooSmall { declared }));
            }
            if declared as usize > blob.len() - start {
                return Err(reject(RejectReason::LengthOutOfBounds { declared }));
            }
            start + declared as usize
        }
        EndStrategy::RestOfBlob => blob.len(),
    };

    Ok(ResolvedPayload {
        start,
        end,
        format: candidate.format,
    })
}
