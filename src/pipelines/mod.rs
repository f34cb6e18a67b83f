//! Render pipelines and the GPU resources they bind.
//!
//! - `basic` builds the lit, textured model pipeline
//! - `light` holds the ambient + directional light uniform

pub mod basic;
pub mod light;
