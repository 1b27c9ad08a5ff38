pub mod adjustments;
pub mod effects;
pub mod filters;
