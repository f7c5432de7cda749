//! API Routes

pub mod fatigue;
