pub mod alleles;
pub mod app;
pub mod archive;
pub mod builder;
pub mod config;
pub mod dataset;
pub mod document;
pub mod domain;
pub mod error;
pub mod flatten;
pub mod fs_util;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod profile;
pub mod sample;
pub mod store;
