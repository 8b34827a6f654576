//! Domain layer for Boundary Guardian
//!
//! Architecture: Domain Model - Pure business logic for module-boundary enforcement
//! - Contains the core entities: modules, layer tags, import edges, and the graph
//! - Independent of infrastructure concerns like file systems or output formats
//! - Expresses the ubiquitous language of layered-architecture policy checking

pub mod model;
pub mod violations;

// Re-export main domain types for convenience
pub use model::*;
pub use violations::*;
