pub mod api;
pub mod config;
pub mod data_models;
pub mod db;
pub mod discovery;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod links;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod query_router;
pub mod sitemap;
pub mod url_filter;
pub mod url_utils;
pub mod vector_store;
