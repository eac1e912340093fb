// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Order shape, validation and the read path. Persistence and transport live
// outside this module and are reached through the OrderStore trait.
//
// ============================================================================

pub mod order;
