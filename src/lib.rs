//! Core entry point for the gearmotor_qc crate.
//!
//! The crate turns a gear-motor inspection record into a branded PDF report:
//! [`warranty`] computes the coverage window, [`layout`] paginates the
//! inspection photos, and [`report`] renders both into a document through
//! `genpdf`.

pub mod builder;
pub mod elements;
pub mod fetch;
pub mod fonts;
pub mod labels;
pub mod layout;
pub mod qr;
pub mod record;
pub mod report;
pub mod store;
pub mod warranty;
