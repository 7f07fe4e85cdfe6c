//! Careers bot — Telegram application intake for hotel job seekers.

pub mod channels;
pub mod config;
pub mod error;
pub mod intake;
pub mod store;
