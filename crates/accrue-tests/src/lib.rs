//! Scenario and adversarial test suite for Accrue.
//!
//! Integration tests drive the engine the way an attacker or a busy
//! deployment would: Sybil referral rings, device farms, content farming,
//! concurrent writers and unresponsive collaborators.

pub mod helpers;
