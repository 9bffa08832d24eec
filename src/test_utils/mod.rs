//! Fakes, recording notify targets and response encoders shared by the unit
//! tests and the integration tests under `tests/`.
mod fakes;
mod harness;
mod notify;
mod responses;

pub use fakes::*;
pub use harness::*;
pub use notify::*;
pub use responses::*;
