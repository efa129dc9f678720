// ============================================================================
// Enrollment Domain
// ============================================================================
//
// Enrollment is an independent fact entity referencing a student and a
// course. It is created as a side effect of payment (or by self-enrollment)
// and is never deleted.
//
// ============================================================================

pub mod value_objects;
pub mod provisioner;

pub use value_objects::*;
pub use provisioner::*;
