//! # Polyglot Core
//!
//! The "Engine" of the Polyglot system - generates English directory
//! content for AI tools and fans it out into every target language.
//!
//! ## Architecture
//!
//! - `gateway/` - Model tier fallback, restart passes, and the shared rate-limiter clock
//! - `sanitize/` - Total response cleanup and regex-based partial field recovery
//! - `probe/` - Site liveness, bounded same-origin crawl, and page signal harvesting
//! - `synth` / `translate` - English synthesis and per-language translation state machines
//! - `runner` - The stage sequence that turns one tool record into a report
//!
//! ## Usage
//!
//! ```rust,ignore
//! use polyglot_core::config::PipelineConfig;
//! use polyglot_core::content::ToolRecord;
//! use polyglot_core::gateway::client::HttpModelClient;
//! use polyglot_core::runner::PipelineRunner;
//!
//! let client = HttpModelClient::new(api_url, api_key, timeout)?;
//! let runner = PipelineRunner::new(PipelineConfig::default(), Arc::new(client))?;
//! let report = runner.run(&tool).await?;
//! ```

pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod gateway;
pub mod probe;
pub mod prompts;
pub mod runner;
pub mod sanitize;
pub mod synth;
pub mod translate;

pub use config::PipelineConfig;
pub use content::{PipelineReport, ToolRecord};
pub use error::PipelineError;
pub use runner::PipelineRunner;
