//! # Folio: a thin, strongly-typed query gateway over a document collection
//!
//! Folio opens one connection-scoped session to a named MongoDB collection
//! and exposes a small, closed set of typed operations on it: filtered
//! reads, sorted and paginated reads, single-document updates and deletes,
//! aggregation pipelines, index declarations and query-plan inspection.
//! The connection is owned by exactly one [`QueryGateway`](gateway/struct.QueryGateway.html)
//! and released exactly once.
//!
//! ### The Prelude
//!
//! The most frequently used types from Folio as well as the `bson` crate
//! are publicly re-exported under the module [`prelude`](prelude/index.html):
//!
//! ```rust
//! use folio::prelude::*;
//! ```
//!
//! ### Connecting
//!
//! A [`Config`](config/struct.Config.html) names the server, the database
//! and the collection, and optionally the default deadline of operations.
//! It can be built in code or loaded from `FOLIO_*` environment variables.
//!
//! ```no_run
//! # use folio::prelude::*;
//! #
//! # async fn connect() -> FolioResult<()> {
//! let config = Config::from_env()?;
//! let mut books = QueryGateway::connect(&config).await?;
//!
//! // ... use the gateway ...
//!
//! books.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! Unreachable servers are reported as `ErrorKind::Connection` errors.
//!
//! ### Operations
//!
//! Every operation is described by a value implementing one of the traits
//! in [`ops`](ops/index.html): `Query`, `Update`, `Delete` or `Aggregate`.
//! Raw BSON `Document`s implement them, and so do the builders [`Filter`],
//! [`Find`], [`UpdateSpec`] and [`Pipeline`]. A query can also name the type
//! its results are deserialized into:
//!
//! ```no_run
//! # use serde_derive::Deserialize;
//! # use folio::prelude::*;
//! #
//! #[derive(Debug, Deserialize)]
//! struct Book {
//!     title: String,
//!     author: String,
//!     price: f64,
//! }
//!
//! # async fn run(books: &QueryGateway) -> FolioResult<()> {
//! let cheapest_first: Find<Book> = Find::new(Filter::new().eq("genre", "Fiction"))
//!     .sort_by("price", Order::Ascending)
//!     .page(Page::new(1, 5)?);
//!
//! for book in books.find_many(cheapest_first, None).await?.into_vec().await? {
//!     println!("{} by {}: {}", book.title, book.author, book.price);
//! }
//!
//! let outcome = books.update_one(
//!     (Filter::new().eq("title", "The Great Book"), UpdateSpec::new().set("price", 19.99)),
//!     None,
//! ).await?;
//! assert!(outcome.matched <= 1);
//!
//! let by_genre = books
//!     .aggregate(average_by("genre", "price", "avgPrice"), None)
//!     .await?
//!     .into_vec()
//!     .await?;
//! println!("{}", render_documents(by_genre)?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Deadlines
//!
//! Every operation takes a deadline as its last argument. Passing `None`
//! applies the configured `operation_timeout`; when neither is set, the
//! operation is unbounded. Expired deadlines are `ErrorKind::Timeout` errors
//! and leave the gateway usable.
//!
//! [`Filter`]: filter/struct.Filter.html
//! [`Find`]: query/struct.Find.html
//! [`UpdateSpec`]: update/struct.UpdateSpec.html
//! [`Pipeline`]: pipeline/struct.Pipeline.html

#![doc(html_root_url = "https://docs.rs/folio/0.1.0")]
#![deny(missing_debug_implementations, missing_copy_implementations,
        unsafe_code,
        unstable_features,
        anonymous_parameters, bare_trait_objects,
        unused_import_braces, missing_docs)]
#![allow(clippy::single_match, clippy::match_same_arms, clippy::match_ref_pats,
         clippy::needless_pass_by_value, clippy::module_name_repetitions)]
#![deny(clippy::used_underscore_binding, clippy::similar_names,
        clippy::non_ascii_literal, clippy::unicode_not_nfc,
        clippy::int_plus_one, clippy::string_add_assign, clippy::if_not_else,
        clippy::invalid_upcast_comparisons,
        clippy::mutex_integer, clippy::mut_mut, clippy::items_after_statements,
        clippy::print_stdout, clippy::mem_forget, clippy::maybe_infinite_iter)]

pub mod gateway;
pub mod store;
pub mod db;
pub mod cursor;
pub mod ops;
pub mod filter;
pub mod update;
pub mod query;
pub mod pipeline;
pub mod index;
pub mod literal;
pub mod config;
pub mod bsn;
pub mod utils;
pub mod error;
pub mod prelude;
