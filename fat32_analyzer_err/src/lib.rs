//! Error and warning taxonomy for the FAT32 volume analyzer.
//!
//! `Error` carries the fatal cases that abort an analysis session.
//! `Warning` carries the non-fatal anomalies the walker records and
//! continues past (§7 of the spec: chain and directory anomalies are
//! recorded, not propagated).

/// Fatal errors. Any of these abort the analysis.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("truncated image: boot sector read returned fewer than 512 bytes")]
    TruncatedImage,
    #[error("invalid boot sector: {reason}")]
    InvalidBootSector { reason: &'static str },
    #[error("invalid boot sector signature (expected 0x55AA)")]
    InvalidSignature,
    #[error("invalid cluster number {cluster}: clusters 0 and 1 are reserved")]
    InvalidClusterNumber { cluster: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal anomalies. Collected on an analysis session rather than
/// returned; the walker skips the offending item and continues.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind")]
pub enum Warning {
    #[error("cluster {cluster}: read past end of image, short cluster")]
    TruncatedCluster { cluster: u32 },
    #[error("cluster {cluster}: cyclic chain detected, chain truncated")]
    CyclicChain { cluster: u32 },
    #[error("cluster {cluster}: link out of range, chain truncated")]
    OutOfRangeLink { cluster: u32 },
    #[error("directory entry at byte offset {offset}: malformed, slot skipped")]
    MalformedDirectoryEntry { offset: u64 },
}
