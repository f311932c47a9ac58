pub mod maths_utils;

pub use maths_utils::RangeF64;
