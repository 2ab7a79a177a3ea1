use core::fmt;

use thiserror::Error;

use crate::bits::OutOfBits;

/// Pipeline stage an error was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    Framer,
    Reassembler,
    Decoder,
    Rtcm,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Framer => f.write_str("framer"),
            Stage::Reassembler => f.write_str("reassembler"),
            Stage::Decoder => f.write_str("decoder"),
            Stage::Rtcm => f.write_str("rtcm"),
        }
    }
}

/// Error kinds are tagged, not thrown: they travel as records in the output
/// stream and none of them aborts the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    #[error("sync lost")]
    SyncLost,

    #[error("checksum fail (expect {expect:#x}, got {got:#x})")]
    ChecksumFail { expect: u32, got: u32 },

    #[error("length fail ({len})")]
    LengthFail { len: usize },

    #[error("RS uncorrectable")]
    RsUncorrectable,

    #[error("week invalid")]
    WeekInvalid,

    #[error("TOW invalid")]
    TowInvalid,

    #[error("receiver flag set ({0:#04x})")]
    FlagBitSet(u8),

    #[error("MS mismatch (group={group}, page={page})")]
    MsMismatch { group: u8, page: u8 },

    #[error("IODSSR mismatch (active={active}, msg={msg})")]
    IodssrMismatch { active: u8, msg: u8 },

    #[error("waiting for mask")]
    MaskAbsent,

    #[error("unknown subtype {0}")]
    UnknownSubtype(u8),

    #[error("short payload (need {need} bits, have {have})")]
    ShortPayload { need: usize, have: usize },

    /// Byte-source failure. The only kind a driver may treat as fatal.
    #[error("i/o: {0}")]
    Io(String),
}

impl From<OutOfBits> for ErrorKind {
    fn from(e: OutOfBits) -> Self {
        ErrorKind::ShortPayload {
            need: e.requested,
            have: e.remaining,
        }
    }
}

/// A tagged error together with where and when it was observed.
///
/// Carries the PRN and GPS time-of-week of the byte that triggered it, when
/// those are known at that point of the stream (a framer hunting for sync
/// knows neither).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamError {
    pub stage: Stage,
    pub prn: Option<u16>,
    pub tow: Option<u32>,
    pub kind: ErrorKind,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.kind)?;
        if let Some(prn) = self.prn {
            write!(f, " prn={prn}")?;
        }
        if let Some(tow) = self.tow {
            write!(f, " tow={tow}")?;
        }
        Ok(())
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl StreamError {
    pub fn new(stage: Stage, kind: ErrorKind) -> Self {
        Self {
            stage,
            prn: None,
            tow: None,
            kind,
        }
    }

    pub fn with_prn(mut self, prn: u16) -> Self {
        self.prn = Some(prn);
        self
    }

    pub fn with_tow(mut self, tow: u32) -> Self {
        self.tow = Some(tow);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let e = StreamError::new(
            Stage::Decoder,
            ErrorKind::IodssrMismatch { active: 3, msg: 4 },
        )
        .with_prn(199)
        .with_tow(83504);
        let s = e.to_string();
        assert!(s.contains("decoder"));
        assert!(s.contains("active=3"));
        assert!(s.contains("prn=199"));
        assert!(s.contains("tow=83504"));
    }
}
