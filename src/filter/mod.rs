//! Eligibility filtering
//!
//! The staged safety checks that must all agree before capital is
//! committed to a detected mint.

pub mod eligibility;

pub use eligibility::{EligibilityEvaluator, RejectReason, Verdict};
