pub mod capability;
pub mod carver;
pub mod container;
pub mod error;
pub mod resolver;
pub mod scanner;
pub mod signatures;

pub use carver::{CarveConfig, CarveReport, CarveSummary, CarvedPayload, Carver, NamingPolicy};
pub use container::{BranchOutcome, BranchStatus, ContainerInspector, InspectReport};
pub use error::{ArchiveError, DecodeError, RejectReason, Rejection};
pub use resolver::ResolvedPayload;
pub use scanner::Candidate;
pub use signatures::{EndStrategy, FormatTag, Signature, SignatureTable};
