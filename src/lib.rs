//! Admission webhook for the platform's multi-cluster RBAC custom
//! resources: rule resolution (who holds what, where) and the
//! admission-time checks built on top of it (no-escalation, structural
//! invariants, owner-reference mutation).

pub mod admission;
pub mod cache;
pub mod config;
pub mod rules;
pub mod sar;
pub mod testharness;
pub mod types;
pub mod webhookconfig;
