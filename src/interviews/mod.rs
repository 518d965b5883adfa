//! # Interviews Module
//!
//! Interview scheduling and the time-windowed access gate. Interviewers
//! schedule and cancel; candidates and interviewers enter through the gate,
//! which writes an audit record for every admitted entry.

pub mod gate;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod validators;

#[cfg(test)]
mod tests;

pub use gate::InterviewAccessGate;
pub use routes::interviews_routes;
