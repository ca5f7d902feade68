//! The seam between the gateway and the document store it relays to.
//!
//! Each method of `Store` is a single request/response round trip. The
//! gateway adds deadlines, validation, logging and lifecycle on top.

use std::future::Future;
use bson::Document;
use futures::stream::BoxStream;
use mongodb::IndexModel;
use mongodb::options::{ FindOptions, AggregateOptions };
use crate::{
    literal::Verbosity,
    error::Result,
};

/// A lazily-fetched sequence of raw documents produced by the store.
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// How many documents an update matched and how many it changed.
/// A document that already had the new values counts as matched only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UpdateOutcome {
    /// Number of documents matching the filter (0 or 1).
    pub matched: u64,
    /// Number of documents actually modified (0 or 1).
    pub modified: u64,
}

/// A collection in a document store, as seen by the gateway.
pub trait Store: Send + Sync {
    /// `database.collection`, for diagnostics.
    fn namespace(&self) -> String;

    /// Starts a filtered read, returning a lazy stream of the results.
    fn find(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> impl Future<Output = Result<DocumentStream>> + Send;

    /// Inserts documents, returning how many were inserted.
    fn insert_many(
        &self,
        docs: Vec<Document>,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Applies `update` to the first document matching `filter`.
    fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> impl Future<Output = Result<UpdateOutcome>> + Send;

    /// Removes the first document matching `filter`, returning the number
    /// of deleted documents.
    fn delete_one(
        &self,
        filter: Document,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Starts an aggregation, returning a lazy stream of the results.
    fn aggregate(
        &self,
        stages: Vec<Document>,
        options: AggregateOptions,
    ) -> impl Future<Output = Result<DocumentStream>> + Send;

    /// Creates an index unless an identical one exists, returning its name.
    fn create_index(
        &self,
        index: IndexModel,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Reports the execution plan of a filtered read.
    fn explain(
        &self,
        filter: Document,
        verbosity: Verbosity,
    ) -> impl Future<Output = Result<Document>> + Send;

    /// Drops the whole collection along with its indexes.
    fn drop_collection(&self) -> impl Future<Output = Result<()>> + Send;

    /// Releases the underlying connection.
    fn shutdown(self) -> impl Future<Output = Result<()>> + Send where Self: Sized;
}
