//! Audio sampling through external capture/analysis tools.

pub mod sampler;

pub use sampler::{CommandSampler, Sampler, parse_max_amplitude};
