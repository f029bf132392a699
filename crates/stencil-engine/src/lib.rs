//! Stencil: compiles text templates with embedded code tags and renders
//! them with caller-supplied bindings.
//!
//! ```text
//! source → scan (stencil-parser) → Template → cache
//!                                        ↓
//!                    render: assemble + execute (stencil-eval) → String
//! ```
//!
//! ```rust,ignore
//! use stencil_engine::{Engine, EngineConfig, TemplateSource};
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! let mut imports = stencil_engine::Bindings::new();
//! imports.insert("name".into(), "World".into());
//! let out = engine.render(TemplateSource::anonymous("Hello <%= name %>!"), &imports)?;
//! assert_eq!(out, "Hello World!");
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod resolver;
pub mod source;

pub use cache::{content_digest, CacheEntry, TemplateCache};
pub use config::EngineConfig;
pub use engine::Engine;
pub use resolver::{
    ChangeKind, FsResolver, MemoryResolver, SourceResolver, WatchCallback, WatchControl,
};
pub use source::TemplateSource;
pub use stencil_types::{Bindings, EvalError, Result, SyntaxError, Template, TemplateError, Value};
