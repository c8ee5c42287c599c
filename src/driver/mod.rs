//! Demo drivers used by the binary.
//!
//! The simulator generates counter activity in the background; the sampler
//! reads it back periodically the way an external monitor would.

pub mod sampler;
pub mod simulator;

pub use sampler::Sampler;
pub use simulator::Simulator;
