// src/ingest/providers/mod.rs
pub mod ircc_json;
