//! # Docshelf
//!
//! A document shelf for office-format files: register documents, edit them
//! through an external collaborative editor (OnlyOffice), and ask
//! natural-language questions about their content, answered by one of
//! several interchangeable LLM providers.
//!
//! Two subsystems carry the interesting work:
//!
//! - **Question answering** — extract text from PDF/OOXML binaries, index
//!   it as embedding vectors when an embedding provider is configured, and
//!   fall back to truncated raw text when it is not (or when retrieval
//!   fails). An answer is always attempted as long as the document is
//!   extractable and one chat credential exists.
//! - **Revision sync** — consume the editor's asynchronous save callbacks,
//!   fetch the updated binary over the internal network, and atomically
//!   replace the stored revision before bumping the metadata record.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, credentials read from the environment |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format text extraction (PDF, docx, pptx, xlsx, raw) |
//! | [`chunk`] | Overlapping fixed-size text chunking |
//! | [`provider`] | Chat/embedding backend resolution and dispatch |
//! | [`index`] | Indexing pipeline and bounded background queue |
//! | [`retrieve`] | Similarity search over stored chunks |
//! | [`answer`] | Retrieval-augmented answering with raw-text fallback |
//! | [`sync`] | Editor save-notification handling |
//! | [`server`] | HTTP API |
//! | [`store`] | Document and chunk persistence |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod extract;
pub mod index;
pub mod locks;
pub mod migrate;
pub mod models;
pub mod provider;
pub mod retrieve;
pub mod server;
pub mod store;
pub mod sync;
