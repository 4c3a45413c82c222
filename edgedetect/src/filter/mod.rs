//! Filter families, axes and the dispatch table that maps a request to one of
//! the eight device operations.

pub(crate) mod kernels;

#[cfg(test)]
mod tests;

use std::fmt;

use crate::image::SampleKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterFamily {
    Scharr,
    #[default]
    Sobel,
    Prewitt,
    Roberts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Axis {
    #[default]
    Horizontal,
    Vertical,
}

/// Which filter to run; fixed for the whole invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FilterRequest {
    pub family: FilterFamily,
    pub axis: Axis,
}

impl FilterRequest {
    pub fn new(family: FilterFamily, axis: Axis) -> Self {
        Self { family, axis }
    }
}

/// One of the eight filter operations a backend can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    ScharrHoriz,
    ScharrVert,
    SobelHoriz,
    SobelVert,
    PrewittHoriz,
    PrewittVert,
    RobertsDown,
    RobertsUp,
}

impl FilterOp {
    pub const ALL: [FilterOp; 8] = [
        FilterOp::ScharrHoriz,
        FilterOp::ScharrVert,
        FilterOp::SobelHoriz,
        FilterOp::SobelVert,
        FilterOp::PrewittHoriz,
        FilterOp::PrewittVert,
        FilterOp::RobertsDown,
        FilterOp::RobertsUp,
    ];

    /// Sample kind the operation writes.
    pub fn output_kind(self) -> SampleKind {
        match self {
            FilterOp::ScharrHoriz | FilterOp::ScharrVert => SampleKind::Signed16,
            _ => SampleKind::Unsigned8,
        }
    }

    /// 3x3 correlation mask, row-major, centred on the output pixel.
    pub fn mask(self) -> [[i32; 3]; 3] {
        match self {
            FilterOp::ScharrHoriz => [[3, 10, 3], [0, 0, 0], [-3, -10, -3]],
            FilterOp::ScharrVert => [[3, 0, -3], [10, 0, -10], [3, 0, -3]],
            FilterOp::SobelHoriz => [[1, 2, 1], [0, 0, 0], [-1, -2, -1]],
            FilterOp::SobelVert => [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]],
            FilterOp::PrewittHoriz => [[1, 1, 1], [0, 0, 0], [-1, -1, -1]],
            FilterOp::PrewittVert => [[-1, 0, 1], [-1, 0, 1], [-1, 0, 1]],
            FilterOp::RobertsDown => [[0, 0, 0], [0, 1, 0], [0, 0, -1]],
            FilterOp::RobertsUp => [[0, 0, 0], [0, 1, 0], [-1, 0, 0]],
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterOp::ScharrHoriz => "Scharr horizontal",
            FilterOp::ScharrVert => "Scharr vertical",
            FilterOp::SobelHoriz => "Sobel horizontal",
            FilterOp::SobelVert => "Sobel vertical",
            FilterOp::PrewittHoriz => "Prewitt horizontal",
            FilterOp::PrewittVert => "Prewitt vertical",
            FilterOp::RobertsDown => "Roberts down",
            FilterOp::RobertsUp => "Roberts up",
        };
        write!(f, "{}", name)
    }
}

/// Resolves a request to the operation to invoke and the sample kind of its output.
///
/// The table is total: every family/axis pair maps to exactly one operation.
pub fn select_operation(request: FilterRequest) -> (FilterOp, SampleKind) {
    let op = match (request.family, request.axis) {
        (FilterFamily::Scharr, Axis::Horizontal) => FilterOp::ScharrHoriz,
        (FilterFamily::Scharr, Axis::Vertical) => FilterOp::ScharrVert,
        (FilterFamily::Sobel, Axis::Horizontal) => FilterOp::SobelHoriz,
        (FilterFamily::Sobel, Axis::Vertical) => FilterOp::SobelVert,
        (FilterFamily::Prewitt, Axis::Horizontal) => FilterOp::PrewittHoriz,
        (FilterFamily::Prewitt, Axis::Vertical) => FilterOp::PrewittVert,
        (FilterFamily::Roberts, Axis::Horizontal) => FilterOp::RobertsDown,
        (FilterFamily::Roberts, Axis::Vertical) => FilterOp::RobertsUp,
    };

    (op, op.output_kind())
}
