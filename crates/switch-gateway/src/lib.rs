//! Switch gateway - HTTP front door for the Switch Food Explorer assistants
//!
//! Each endpoint validates a question, resolves recipe or product data
//! (inline or fetched from the record service), builds a prompt, calls
//! OpenAI or Anthropic and normalizes the answer into a stable JSON shape.

pub mod config;
pub mod demographics;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod server;
pub mod testing;

pub use error::GatewayError;
