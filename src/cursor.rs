//! Typed, generic wrapper around store cursors.

use std::fmt;
use std::pin::Pin;
use std::marker::PhantomData;
use std::task::{ Context, Poll };
use futures::stream::{ self, Stream, StreamExt, TryStreamExt };
use serde::de::DeserializeOwned;
use bson::{ Bson, Document, from_bson };
use crate::{
    store::DocumentStream,
    error::{ Result, ResultExt },
};

/// A lazy, finite, typed sequence of query or aggregation results.
/// Documents are fetched from the store as the cursor is advanced;
/// restarting requires running the operation again.
///
/// A cursor borrows the gateway that opened it, so it must be dropped
/// before that gateway can be closed.
pub struct Cursor<'g, T> {
    /// The underlying stream of raw documents.
    inner: DocumentStream,
    /// The function applied to each returned `Document` before deserialization.
    transform: fn(Document) -> Result<Bson>,
    /// Ties the cursor to the gateway borrow and uses the type parameter.
    _marker: PhantomData<(&'g (), fn() -> T)>,
}

impl<'g, T> Cursor<'g, T> where T: DeserializeOwned {
    /// Creates a strongly-typed cursor from an untyped document stream
    /// and a transformation function.
    #[doc(hidden)]
    pub fn from_stream_and_transform(
        inner: DocumentStream,
        transform: fn(Document) -> Result<Bson>,
    ) -> Self {
        Cursor {
            inner,
            transform,
            _marker: PhantomData,
        }
    }

    /// A cursor that yields nothing, without touching the store.
    pub fn empty() -> Self {
        Self::from_stream_and_transform(stream::empty::<Result<Document>>().boxed(), |doc| Ok(doc.into()))
    }

    /// Retrieves the next at most `n` documents.
    pub async fn next_n(&mut self, n: usize) -> Result<Vec<T>> {
        let mut items = Vec::with_capacity(n.min(64));

        while items.len() < n {
            match self.next().await {
                Some(item) => items.push(item?),
                None => break,
            }
        }

        Ok(items)
    }

    /// Drains the cursor, collecting every remaining document.
    pub async fn into_vec(self) -> Result<Vec<T>> {
        self.try_collect().await
    }

    /// Transforms and tries to deserialize a single document.
    fn transform_and_deserialize_one(&self, doc: Document) -> Result<T> {
        (self.transform)(doc).and_then(|b| from_bson(b).map_err(From::from))
    }
}

impl<'g, T> Stream for Cursor<'g, T> where T: DeserializeOwned {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx).map(|next| {
            next.map(|result| {
                result
                    .chain("can't step Cursor")
                    .and_then(|doc| self.transform_and_deserialize_one(doc))
            })
        })
    }
}

impl<'g, T> fmt::Debug for Cursor<'g, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cursor").finish()
    }
}
