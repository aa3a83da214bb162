//! File input and output

pub mod fits;
