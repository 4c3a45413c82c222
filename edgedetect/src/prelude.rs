// Error handling
pub use crate::common::{Error, ListRole, Result, TransferDirection};

// Image types
pub use crate::image::{
    to_tight_buffer, BufferDesc, PixelBuffer, SampleKind, TightBuffer, SUPPORTED_EXTENSIONS,
};

// Filter selection
pub use crate::filter::{select_operation, Axis, FilterFamily, FilterOp, FilterRequest};

// Accelerator
#[cfg(feature = "wgpu")]
pub use crate::device::GpuBackend;
pub use crate::device::{
    AcceleratorContext, BackendPreference, BufferId, DeviceAllocation, DeviceBuffer,
    FilterBackend, HostBackend, Roi,
};

// Processing
pub use crate::batch::{run_list, BatchReport};
pub use crate::pipeline::{make_output_file_name, Pipeline, OUTPUT_SUFFIX};
pub use crate::timing::{ProcessingTimestamps, TimingReport};
pub use crate::transfer::{execute, TransferSession};

// Command line and configuration
pub use crate::cli::{parse_args, CliOptions, Command, INVALID_ARGUMENT, USAGE};
pub use crate::config::{
    LogConfig, RunConfig, BACKEND_ENV, DEFAULT_LOG_LEVEL, LOG_DIR_ENV, LOG_ENV,
};
