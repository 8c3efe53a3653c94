mod buildings;

pub use buildings::*;
