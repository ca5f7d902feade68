//! The query gateway: a connection-scoped handle to one collection.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use futures::future::LocalBoxFuture;
use log::{ debug, info, warn, error };
use serde::Serialize;
use bson::Document;
use tokio::time;
use crate::{
    config::Config,
    cursor::Cursor,
    db::MongoStore,
    index::IndexSpec,
    literal::Verbosity,
    store::{ Store, UpdateOutcome },
    update::validate_update,
    bsn::serialize_documents,
    ops::*,
    error::{ Error, ErrorKind, Result, ResultExt },
};

/// Exclusively owns the connection to one collection and relays a small set
/// of typed operations to it.
///
/// Every operation accepts an optional deadline. When it is `None`, the
/// operation timeout the gateway was created with applies instead. An
/// expired deadline fails the operation with `ErrorKind::Timeout`, and the
/// gateway remains usable afterwards.
///
/// The connection is released exactly once, by `close()`. Use `scope()` to
/// run a sequence of operations with guaranteed release at the end.
pub struct QueryGateway<S: Store = MongoStore> {
    /// The store; `None` once the gateway has been closed.
    store: Option<S>,
    /// `database.collection`, for diagnostics.
    namespace: String,
    /// Deadline for operations that don't specify their own.
    operation_timeout: Option<Duration>,
}

impl QueryGateway<MongoStore> {
    /// Connects to the collection described by `config`. Fails with
    /// `ErrorKind::Connection` if the store is unreachable.
    pub async fn connect(config: &Config) -> Result<Self> {
        info!("connecting to {} ({}.{})", config.uri, config.database, config.collection);

        let store = MongoStore::connect(config).await?;
        let gateway = Self::with_store(store, config.operation_timeout);

        info!("connected to {}", gateway.namespace);

        Ok(gateway)
    }
}

impl<S: Store> QueryGateway<S> {
    /// Wraps an already-connected store.
    pub fn with_store(store: S, operation_timeout: Option<Duration>) -> Self {
        QueryGateway {
            namespace: store.namespace(),
            store: Some(store),
            operation_timeout,
        }
    }

    /// `database.collection` this gateway operates on.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The deadline applied to operations that don't specify their own.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    /// Returns `true` once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    /// Reads the documents selected by `query`, lazily.
    ///
    /// Sorting happens before skipping and limiting. A limit of 0 selects
    /// nothing and returns an empty cursor without contacting the store.
    pub async fn find_many<Q, D>(&self, query: Q, deadline: D) -> Result<Cursor<'_, Q::Output>>
        where Q: Query,
              D: Into<Option<Duration>>,
    {
        let store = self.store()?;
        let deadline = self.deadline(deadline);
        let filter = query.filter();
        let mut options = query
            .options()
            .chain(|| format!("invalid options in {}::find({:#?})", self.namespace, query))?;

        if options.limit == Some(0) {
            debug!("{}::find with limit 0, not contacting store", self.namespace);
            return Ok(Cursor::empty());
        }

        if options.max_time.is_none() {
            options.max_time = deadline;
        }

        debug!("{}::find({:?}) {:?}", self.namespace, filter, options);

        let stream = self.bounded("find", deadline, store.find(filter, options))
            .await
            .chain(|| format!("error in {}::find({:#?})", self.namespace, query))?;

        Ok(Cursor::from_stream_and_transform(stream, Q::transform))
    }

    /// Applies an update to the first document matching its filter. No match
    /// is not an error: the outcome then reports 0 matched documents.
    pub async fn update_one<U, D>(&self, update: U, deadline: D) -> Result<UpdateOutcome>
        where U: Update,
              D: Into<Option<Duration>>,
    {
        let store = self.store()?;
        let deadline = self.deadline(deadline);
        let filter = update.filter();
        let change = update.update();

        validate_update(&change)
            .chain(|| format!("invalid update in {}::update_one({:#?})", self.namespace, update))?;

        debug!("{}::update_one({:?}, {:?})", self.namespace, filter, change);

        self.bounded("update_one", deadline, store.update_one(filter, change))
            .await
            .chain(|| format!("error in {}::update_one({:#?})", self.namespace, update))
    }

    /// Deletes the first document matching the filter, returning the number
    /// of deleted documents (0 or 1).
    pub async fn delete_one<Q, D>(&self, query: Q, deadline: D) -> Result<u64>
        where Q: Delete,
              D: Into<Option<Duration>>,
    {
        let store = self.store()?;
        let deadline = self.deadline(deadline);
        let filter = query.filter();

        debug!("{}::delete_one({:?})", self.namespace, filter);

        self.bounded("delete_one", deadline, store.delete_one(filter))
            .await
            .chain(|| format!("error in {}::delete_one({:#?})", self.namespace, query))
    }

    /// Runs an aggregation pipeline, returning its results lazily.
    /// Every stage is validated before the store is contacted.
    pub async fn aggregate<A, D>(&self, pipeline: A, deadline: D) -> Result<Cursor<'_, A::Output>>
        where A: Aggregate,
              D: Into<Option<Duration>>,
    {
        let store = self.store()?;
        let deadline = self.deadline(deadline);
        let stages = pipeline
            .stages()
            .chain(|| format!("invalid pipeline in {}::aggregate({:#?})", self.namespace, pipeline))?;
        let mut options = pipeline.options();

        if options.max_time.is_none() {
            options.max_time = deadline;
        }

        debug!("{}::aggregate({:?})", self.namespace, stages);

        let stream = self.bounded("aggregate", deadline, store.aggregate(stages, options))
            .await
            .chain(|| format!("error in {}::aggregate({:#?})", self.namespace, pipeline))?;

        Ok(Cursor::from_stream_and_transform(stream, A::transform))
    }

    /// Declares an index, returning its name. Declaring the same index again
    /// is a no-op returning the same name. Fails with `ErrorKind::Index` if
    /// the declaration is malformed or conflicts with an existing index.
    pub async fn create_index<D>(&self, spec: &IndexSpec, deadline: D) -> Result<String>
        where D: Into<Option<Duration>>,
    {
        let store = self.store()?;
        let deadline = self.deadline(deadline);
        let model = spec
            .to_model()
            .chain(|| format!("invalid index in {}::create_index({:#?})", self.namespace, spec))?;

        debug!("{}::create_index({:?})", self.namespace, model);

        self.bounded("create_index", deadline, store.create_index(model))
            .await
            .chain(|| format!("error in {}::create_index({:#?})", self.namespace, spec))
    }

    /// Reports how the store would execute the filter of `query`. The
    /// report is passed through unchanged.
    pub async fn explain<Q, D>(&self, query: Q, verbosity: Verbosity, deadline: D) -> Result<Document>
        where Q: Query,
              D: Into<Option<Duration>>,
    {
        let store = self.store()?;
        let deadline = self.deadline(deadline);
        let filter = query.filter();

        debug!("{}::explain({:?}, {})", self.namespace, filter, verbosity);

        self.bounded("explain", deadline, store.explain(filter, verbosity))
            .await
            .chain(|| format!("error in {}::explain({:#?})", self.namespace, query))
    }

    /// Inserts the given values as new documents, returning how many were
    /// inserted. Inserting nothing is a no-op.
    pub async fn insert_many<I, D>(&self, values: I, deadline: D) -> Result<u64>
        where I: IntoIterator,
              I::Item: Serialize,
              D: Into<Option<Duration>>,
    {
        let store = self.store()?;
        let deadline = self.deadline(deadline);
        let docs = serialize_documents::<I::Item, _>(values)
            .chain(|| format!("can't serialize documents for {}::insert_many", self.namespace))?;

        if docs.is_empty() {
            return Ok(0);
        }

        debug!("{}::insert_many({} documents)", self.namespace, docs.len());

        self.bounded("insert_many", deadline, store.insert_many(docs))
            .await
            .chain(|| format!("error in {}::insert_many", self.namespace))
    }

    /// Drops the collection, including its documents and indexes.
    pub async fn drop_collection<D>(&self, deadline: D) -> Result<()>
        where D: Into<Option<Duration>>,
    {
        let store = self.store()?;
        let deadline = self.deadline(deadline);

        debug!("{}::drop()", self.namespace);

        self.bounded("drop", deadline, store.drop_collection())
            .await
            .chain(|| format!("error in {}::drop()", self.namespace))
    }

    /// Releases the connection. Calling it again does nothing. A failure to
    /// release is logged, not returned.
    ///
    /// Cursors borrow the gateway, so every cursor must be dropped before
    /// the gateway can be closed:
    /// ```compile_fail
    /// # use folio::prelude::*;
    /// #
    /// # async fn run(mut books: QueryGateway) -> FolioResult<()> {
    /// let cursor = books.find_many(doc!{}, None).await?;
    /// books.close().await;
    /// let docs = cursor.into_vec().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn close(&mut self) {
        if let Some(store) = self.store.take() {
            info!("closing connection to {}", self.namespace);

            if let Err(err) = store.shutdown().await {
                error!("failed to release connection to {}: {}", self.namespace, err);
            }
        }
    }

    /// Runs `body` against this gateway, then closes it, whether or not
    /// `body` succeeded. Returns the result of `body`.
    /// ```no_run
    /// # use futures::FutureExt;
    /// # use folio::prelude::*;
    /// #
    /// # async fn run() -> FolioResult<()> {
    /// let gateway = QueryGateway::connect(&Config::default()).await?;
    ///
    /// let fiction = gateway.scope(|books| async move {
    ///     books.find_many(doc!{ "genre": "Fiction" }, None).await?.into_vec().await
    /// }.boxed_local()).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// The result of `body` cannot borrow the gateway, so a cursor has to
    /// be drained inside `body`:
    /// ```compile_fail
    /// # use futures::FutureExt;
    /// # use folio::prelude::*;
    /// #
    /// # async fn run(gateway: QueryGateway) -> FolioResult<()> {
    /// let cursor = gateway.scope(|books| async move {
    ///     books.find_many(doc!{ "genre": "Fiction" }, None).await
    /// }.boxed_local()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scope<F, R>(mut self, body: F) -> Result<R>
        where F: for<'g> FnOnce(&'g Self) -> LocalBoxFuture<'g, Result<R>>
    {
        let result = body(&self).await;
        self.close().await;
        result
    }

    /// The store, unless the gateway has been closed.
    fn store(&self) -> Result<&S> {
        self.store.as_ref().ok_or_else(|| Error::new(
            ErrorKind::Closed,
            format!("connection to {} has already been released", self.namespace),
        ))
    }

    /// The deadline of an operation: its own, or else the default one.
    fn deadline<D: Into<Option<Duration>>>(&self, deadline: D) -> Option<Duration> {
        deadline.into().or(self.operation_timeout)
    }

    /// Awaits one round trip, giving up with `ErrorKind::Timeout` once the
    /// deadline, if any, expires.
    async fn bounded<T, F>(&self, op: &str, deadline: Option<Duration>, future: F) -> Result<T>
        where F: Future<Output = Result<T>>
    {
        match deadline {
            Some(limit) => time::timeout(limit, future).await.unwrap_or_else(|_| Err(Error::new(
                ErrorKind::Timeout,
                format!("{}::{} exceeded its deadline of {:?}", self.namespace, op, limit),
            ))),
            None => future.await,
        }
    }
}

impl<S: Store> fmt::Debug for QueryGateway<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("QueryGateway")
            .field("namespace", &self.namespace)
            .field("operation_timeout", &self.operation_timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<S: Store> Drop for QueryGateway<S> {
    fn drop(&mut self) {
        if self.store.is_some() {
            warn!("connection to {} dropped without being closed", self.namespace);
        }
    }
}
