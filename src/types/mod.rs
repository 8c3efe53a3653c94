mod error;
mod overpass_types;

pub use error::*;
pub use overpass_types::*;
