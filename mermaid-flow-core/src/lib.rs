#![doc = "mermaid-flow-core: core pipeline library for mermaid-flow."]

//! This crate holds the request/response pipeline that turns source text into a
//! Mermaid flow diagram: input aggregation, prompt construction, diagram
//! extraction, the preview session and its command protocol.
//!
//! Network, shell, dialog and clipboard access live behind the traits in
//! [`contract`]; the `mermaid-flow` binary crate provides the real implementations.
//!
//! # Usage
//! Build a [`config::GenerationConfig`], wire up a [`generate::Collaborators`]
//! and call [`generate::generate`].

pub mod aggregate;
pub mod config;
pub mod contract;
pub mod error;
pub mod extract;
pub mod generate;
pub mod preview;
pub mod prompt;
