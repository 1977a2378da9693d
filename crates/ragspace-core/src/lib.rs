//! Core of a multi-tenant workspace RAG service: ingestion pipeline,
//! retrieval engine, answer generation, and workspace access control.
//! Transport, concrete model providers, and the vector database sit behind
//! ports; the binaries wire them together.

pub mod config;
pub mod database;
pub mod document;
pub mod domain;
pub mod error;
pub mod ingestion;
pub mod ports;
pub mod providers;
pub mod queue;
pub mod retry;
pub mod services;
pub mod similarity;
pub mod storage;
pub mod timing;

pub use error::{CoreError, CoreResult};
