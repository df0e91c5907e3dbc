pub mod pe;

// Export the main functionality
pub use pe::{BuildError, Error, ParseError, PeImage, Result, Section};
