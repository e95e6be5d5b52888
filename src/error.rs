//! Error types for the chart analysis core.
//!
//! None of these ever escape a frame: the analyzer turns them into a
//! skipped-frame outcome and the element keeps streaming.

use thiserror::Error;

/// Failure to build a projective transform from four correspondences.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HomographyError {
    #[error("{side} points {a}, {b} and {c} are collinear")]
    Collinear {
        side: &'static str,
        a: usize,
        b: usize,
        c: usize,
    },
    #[error("{side} quad is not convex")]
    NotConvex { side: &'static str },
    #[error("linear system is singular")]
    Singular,
    #[error("transform is not invertible")]
    NotInvertible,
}

/// Failure to sample a region of the frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("polygon has zero area")]
    ZeroArea,
    #[error("polygon covers no pixel centers inside the frame")]
    EmptyRegion,
}

/// Pixel buffer does not match the declared frame layout.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("stride {stride} is smaller than a row of {width} BGR pixels")]
    StrideTooSmall { stride: usize, width: usize },
    #[error("buffer holds {got} bytes, layout needs {needed}")]
    BufferTooSmall { needed: usize, got: usize },
}

/// Reason a frame's chart analysis was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("degenerate chart geometry: {0}")]
    Geometry(#[from] HomographyError),
    #[error("sampling failed for region {region}: {source}")]
    Sample {
        region: usize,
        #[source]
        source: SampleError,
    },
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
