//! # pdfqa
//!
//! A PDF question-answering service: upload a PDF, extract its text, and ask
//! natural-language questions answered from the document's own content.
//!
//! ## Pipeline
//!
//! ```text
//! upload            ask
//!   │                 │
//!   ▼                 ▼
//! validate → store  find document
//!   │                 │
//!   ▼                 ▼
//! extract text     extract text ──► split into overlapping chunks
//!   │                                       │
//!   ▼                                       ▼
//! derive title                     embed chunks (cached per document)
//!   │                                       │
//!   ▼                                       ▼
//! insert row                  embed question → cosine top-K retrieval
//!                                            │
//!                                            ▼
//!                              grounded prompt → completion provider
//!                                            │
//!                                            ▼
//!                              persist question/answer → return record
//! ```
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`chunk`] | Sliding-window text splitter with overlap and boundary snapping |
//! | [`index`] | In-memory vector index + per-document index cache |
//! | [`engine`] | The retrieval-QA pipeline (`answer`, `list_questions`) |
//! | [`upload`] | PDF validation, storage, title derivation, document insert |
//! | [`embedding`] | `Embedder` trait with OpenAI/Ollama backends |
//! | [`completion`] | `Completer` trait with OpenAI/Ollama backends |
//! | [`extract`] | PDF → plain text via `pdf-extract` |
//! | [`store`] | `Store` trait; SQLite production backend, in-memory test backend |
//! | [`server`] | axum JSON API |
//! | [`config`] | TOML configuration loading and validation |
//! | [`db`], [`migrate`] | SQLite connection pool and schema migrations |
//! | [`models`] | Core data types (`Document`, `Chunk`, `AnswerRecord`) |

pub mod chunk;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod index;
pub mod migrate;
pub mod models;
pub mod server;
pub mod store;
pub mod upload;
