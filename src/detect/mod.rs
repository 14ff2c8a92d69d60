mod backend;
mod backends;
mod labels;
mod registry;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{ReplayBackend, StubBackend};
pub use labels::COCO_LABELS;
pub use registry::{open_backend, open_backends, BackendKind, BackendOptions, DEFAULT_INPUT_SIZE};
