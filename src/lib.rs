// ABOUTME: Library root for toolgate — a proposal/approval gate in front of downstream API tools.
// ABOUTME: The binary entry point is in main.rs, which uses this crate as a library.

pub mod app;
pub mod approval;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod downstream;
pub mod error;
pub mod proposals;
pub mod rpc;
pub mod scanner;
pub mod tools;
