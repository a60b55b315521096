//! gradekit-core: answer segregation, normalization and hybrid scoring.
//!
//! This crate defines the data model, the provider and similarity traits, and
//! the scoring pipeline that the rest of gradekit builds on.

pub mod engine;
pub mod error;
pub mod judge;
pub mod model;
pub mod normalize;
pub mod ocr;
pub mod parser;
pub mod report;
pub mod results;
pub mod scoring;
pub mod segregate;
pub mod statistics;
pub mod traits;
