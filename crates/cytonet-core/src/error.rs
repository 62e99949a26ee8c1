use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for every way a frame or repeat can abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InputLoad,
    EmptyMask,
    DegenerateVolume,
    DegenerateSkeleton,
    StructuralInconsistency,
    ZeroCapacity,
    RandomizationConstraintExhausted,
    ConfigInvalid,
    Cancelled,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InputLoad => "E1001",
            Self::EmptyMask => "E1002",
            Self::ConfigInvalid => "E1003",
            Self::DegenerateVolume => "E2001",
            Self::DegenerateSkeleton => "E2002",
            Self::StructuralInconsistency => "E3001",
            Self::ZeroCapacity => "E3002",
            Self::RandomizationConstraintExhausted => "E4001",
            Self::Cancelled => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InputLoad => "Input could not be loaded",
            Self::EmptyMask => "Mask has no foreground",
            Self::ConfigInvalid => "Invalid configuration",
            Self::DegenerateVolume => "Degenerate intensity volume",
            Self::DegenerateSkeleton => "Skeleton yields no network",
            Self::StructuralInconsistency => "No in-mask bridge between components",
            Self::ZeroCapacity => "Total edge capacity is zero",
            Self::RandomizationConstraintExhausted => "Randomization constraints exhausted",
            Self::Cancelled => "Frame cancelled",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InputLoad => Some("Check the file path, format (.npy, .png, .tif) and element type."),
            Self::EmptyMask => Some("Draw a region of interest with at least one non-zero pixel."),
            Self::ConfigInvalid => Some("Fix the offending value in the config file or flag and retry."),
            Self::DegenerateVolume => {
                Some("Check that the frame is not blank and matches the mask's lateral size.")
            }
            Self::DegenerateSkeleton => {
                Some("Lower min_component_size or intensity_fraction, or widen line_width.")
            }
            Self::StructuralInconsistency => {
                Some("The mask splits the skeleton into regions that cannot be bridged; enlarge it.")
            }
            Self::ZeroCapacity => None,
            Self::RandomizationConstraintExhausted => {
                Some("Raise randomize.max_attempts or disable planarity preservation.")
            }
            Self::Cancelled => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the extraction and randomization stages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CytoError {
    #[error("failed to load {what} from {path}: {reason}")]
    InputLoad {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("mask has no foreground pixels")]
    EmptyMask,

    #[error("degenerate volume: {0}")]
    DegenerateVolume(String),

    #[error("degenerate skeleton: {0}")]
    DegenerateSkeleton(String),

    #[error("no in-mask bridge exists between {components} remaining components")]
    StructuralInconsistency { components: usize },

    #[error("total edge capacity is {total}; cannot normalize")]
    ZeroCapacity { total: f64 },

    #[error("randomization constraints exhausted after {attempts} attempts: {reason}")]
    RandomizationConstraintExhausted { attempts: usize, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("frame {frame} was cancelled")]
    Cancelled { frame: usize },
}

impl CytoError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InputLoad { .. } => ErrorCode::InputLoad,
            Self::EmptyMask => ErrorCode::EmptyMask,
            Self::DegenerateVolume(_) => ErrorCode::DegenerateVolume,
            Self::DegenerateSkeleton(_) => ErrorCode::DegenerateSkeleton,
            Self::StructuralInconsistency { .. } => ErrorCode::StructuralInconsistency,
            Self::ZeroCapacity { .. } => ErrorCode::ZeroCapacity,
            Self::RandomizationConstraintExhausted { .. } => {
                ErrorCode::RandomizationConstraintExhausted
            }
            Self::ConfigInvalid(_) => ErrorCode::ConfigInvalid,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
        }
    }

    pub(crate) fn input_load(
        what: &'static str,
        path: impl Into<PathBuf>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::InputLoad {
            what,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias for stage results.
pub type Result<T, E = CytoError> = std::result::Result<T, E>;
