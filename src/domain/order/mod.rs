// ============================================================================
// Order Domain - the order document and its business rules
// ============================================================================
//
// - Value objects (Delivery, Payment, Item, OrderLine)
// - Aggregate (Order)
// - Validation rules for inbound orders
// - Errors (ValidationError, QueryError)
// - Query handler (cache-first reads)
//
// ============================================================================

pub mod value_objects;
pub mod aggregate;
pub mod errors;
pub mod validation;
pub mod query_handler;

// Re-export for convenience
pub use value_objects::*;
pub use aggregate::*;
pub use errors::*;
pub use validation::*;
pub use query_handler::*;
