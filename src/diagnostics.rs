//! Diagnostics for the recoverable surfaces of the crate
//!
//! The data-movement and accessor primitives never return errors: contract
//! violations are compile errors or debug assertions. What remains here is the
//! ambient layer around them (pointer registration, tier-table configuration,
//! runtime planning and argument parsing), reported through miette.

use miette::Diagnostic;
use thiserror::Error;

/// A policy, tier or mode name that could not be parsed
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
#[diagnostic(code(kernmem::parse), help("expected one of: {expected}"))]
pub struct ParsePolicyError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

/// The pointer attribute query itself failed
///
/// This is distinct from a pointer living in the wrong space, which is a
/// normal query result.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ProvenanceError {
    #[error("pointer attribute query failed: memory registry lock is poisoned")]
    #[diagnostic(code(provenance::poisoned))]
    Poisoned,
}

/// Rejected registration of an address range
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("cannot register an empty range at {addr:#x}")]
    #[diagnostic(code(registry::empty))]
    EmptyRange { addr: usize },

    #[error("cannot register a range at the null address")]
    #[diagnostic(code(registry::null))]
    NullRange,

    #[error("range {start:#x}..{end:#x} overlaps registered range {other_start:#x}..{other_end:#x}")]
    #[diagnostic(
        code(registry::overlap),
        help("drop the existing registration before registering the range again")
    )]
    Overlap {
        start: usize,
        end: usize,
        other_start: usize,
        other_end: usize,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Provenance(#[from] ProvenanceError),
}

/// Tier-table configuration errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read tier table `{path}`")]
    #[diagnostic(code(config::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid tier table")]
    #[diagnostic(code(config::parse))]
    Parse(#[from] toml::de::Error),

    #[error("tier table entry `{name}` does not name a hardware tier")]
    #[diagnostic(code(config::unknown_tier), help("valid tiers: baseline, sm70, sm75, sm80"))]
    UnknownTier { name: String },
}

/// A runtime load request that the typed entry points would reject at compile time
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("zero-element accesses are not allowed")]
    #[diagnostic(code(plan::empty))]
    Empty,

    #[error("alignment {align} is not a power of two")]
    #[diagnostic(code(plan::align_not_pow2))]
    AlignmentNotPowerOfTwo { align: usize },

    #[error("alignment {align} exceeds the widest single access (16 bytes)")]
    #[diagnostic(code(plan::align_too_large))]
    AlignmentTooLarge { align: usize },

    #[error("alignment {align} is smaller than the element alignment {element_align}")]
    #[diagnostic(code(plan::align_too_small))]
    AlignmentTooSmall { align: usize, element_align: usize },

    #[error("{count} x {size} bytes is not a multiple of the alignment {align}")]
    #[diagnostic(code(plan::not_multiple))]
    NotMultiple {
        count: usize,
        size: usize,
        align: usize,
    },

    #[error("element size {size} is not a power of two")]
    #[diagnostic(
        code(plan::size_not_pow2),
        help("qualified single-element loads need a power-of-two size; use an array load instead")
    )]
    SizeNotPowerOfTwo { size: usize },

    #[error("{count} x {size} bytes does not fit in the address space")]
    #[diagnostic(code(plan::too_large))]
    TooLarge { count: usize, size: usize },

    #[error("element alignment {element_align} is not a power of two")]
    #[diagnostic(code(plan::element_align))]
    ElementAlignment { element_align: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_message() {
        let err = RegistryError::Overlap {
            start: 0x1000,
            end: 0x1100,
            other_start: 0x1080,
            other_end: 0x1200,
        };
        assert_eq!(
            err.to_string(),
            "range 0x1000..0x1100 overlaps registered range 0x1080..0x1200"
        );
    }

    #[test]
    fn test_diagnostic_codes() {
        let err = PlanError::AlignmentNotPowerOfTwo { align: 6 };
        assert_eq!(err.code().map(|c| c.to_string()), Some("plan::align_not_pow2".to_string()));
    }
}
