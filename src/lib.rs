pub mod config;
pub mod demo;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod images;
pub mod models;
pub mod normalize;
pub mod prompts;
pub mod routes;
pub mod sanitize;
pub mod wizard;
