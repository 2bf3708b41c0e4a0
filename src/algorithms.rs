pub mod fill;
pub mod interpolation;
pub mod least_squares;
pub mod query;
pub mod tilt;
