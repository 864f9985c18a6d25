//! recap-core: exam planning, deterministic selection and grading.
//!
//! This crate defines the data model, the exam-bank loader, the generation
//! engine and the grading rules that the rest of recap builds on. Storage is
//! reached only through the [`traits::ExamStore`] seam.

pub mod engine;
pub mod error;
pub mod grading;
pub mod hints;
pub mod model;
pub mod parser;
pub mod planner;
pub mod selector;
pub mod session;
pub mod stats;
pub mod traits;
pub mod validity;
pub mod weights;
