//! Sofía intake: caller identification, identity verification and
//! service-case filing over SMS and voice.

pub mod api;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod extraction;
pub mod session;
