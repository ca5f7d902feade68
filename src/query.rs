//! Filtered, projected, sorted and paginated reads.

use std::fmt;
use std::marker::PhantomData;
use bson::{ Bson, Document };
use mongodb::options::FindOptions;
use serde::de::DeserializeOwned;
use crate::{
    ops::Query,
    literal::Order,
    utils::u64_to_i64_with_msg,
    error::{ Error, ErrorKind, Result },
};

/// The field inclusion (or exclusion) set of a query.
/// ```
/// # use bson::doc;
/// # use folio::query::Projection;
/// #
/// let projection = Projection::include(["title", "author", "price"]).without_id();
///
/// assert_eq!(projection.into_document(), doc!{
///     "title": 1, "author": 1, "price": 1, "_id": 0,
/// });
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection(Document);

impl Projection {
    /// Returns only the specified fields (and `_id`, unless excluded).
    pub fn include<I>(fields: I) -> Self
        where I: IntoIterator,
              I::Item: Into<String>,
    {
        Projection(fields.into_iter().map(|field| (field.into(), Bson::from(1))).collect())
    }

    /// Returns every field except the specified ones.
    pub fn exclude<I>(fields: I) -> Self
        where I: IntoIterator,
              I::Item: Into<String>,
    {
        Projection(fields.into_iter().map(|field| (field.into(), Bson::from(0))).collect())
    }

    /// Suppresses the `_id` field, which is otherwise always returned.
    pub fn without_id(mut self) -> Self {
        self.0.insert("_id", 0);
        self
    }

    /// Converts the projection into the raw document sent to the store.
    pub fn into_document(self) -> Document {
        self.0
    }
}

/// One page of a paginated read. Page numbers start at 1.
/// ```
/// # use folio::query::Page;
/// #
/// let third = Page::new(3, 5).unwrap();
/// assert_eq!(third.skip(), 10);
/// assert_eq!(third.limit(), 5);
///
/// assert!(Page::new(0, 5).is_err());
/// assert!(Page::new(1, 0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    /// The 1-based page number.
    number: u64,
    /// The maximal number of documents on a page.
    size: u64,
}

impl Page {
    /// Creates a page descriptor, checking that both the page number and the
    /// page size are positive and that the resulting offset is representable.
    pub fn new(number: u64, size: u64) -> Result<Self> {
        if number == 0 {
            return Err(Error::new(ErrorKind::Query, "page numbers start at 1"));
        }
        if size == 0 {
            return Err(Error::new(ErrorKind::Query, "page size must be positive"));
        }
        (number - 1).checked_mul(size).ok_or_else(|| Error::new(
            ErrorKind::IntConversionOverflow,
            format!("offset of page {} with size {} overflows", number, size),
        ))?;

        Ok(Page { number, size })
    }

    /// The 1-based page number.
    pub fn number(self) -> u64 {
        self.number
    }

    /// The maximal number of documents on this page.
    pub fn size(self) -> u64 {
        self.size
    }

    /// How many documents precede this page: `(number - 1) * size`.
    pub fn skip(self) -> u64 {
        (self.number - 1) * self.size
    }

    /// How many documents this page holds at most.
    pub fn limit(self) -> u64 {
        self.size
    }
}

/// A read of many documents: filter, optional projection, sort and
/// pagination. Sorting is always applied before skipping and limiting.
///
/// Paginated reads are made deterministic by sorting on `_id` as the last
/// key, so consecutive pages neither overlap nor leave gaps even when
/// several documents share the same sort key.
pub struct Find<T = Document> {
    /// The filter selecting the documents.
    filter: Document,
    /// The fields to return, if not all of them.
    projection: Option<Document>,
    /// Sort keys in order of significance.
    sort: Vec<(String, Order)>,
    /// Number of leading documents to skip.
    skip: Option<u64>,
    /// Maximal number of documents to return.
    limit: Option<u64>,
    /// The type each returned document is deserialized into.
    _marker: PhantomData<fn() -> T>,
}

impl<T> Find<T> {
    /// Creates a read of every document matching `filter`.
    pub fn new<F: Into<Document>>(filter: F) -> Self {
        Find {
            filter: filter.into(),
            projection: None,
            sort: Vec::new(),
            skip: None,
            limit: None,
            _marker: PhantomData,
        }
    }

    /// Creates a read of all documents in the collection.
    pub fn all() -> Self {
        Self::new(Document::new())
    }

    /// Restricts the returned fields.
    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = Some(projection.into_document());
        self
    }

    /// Adds a sort key, less significant than the ones already added.
    /// Sorting by a field again changes its direction but not its rank.
    pub fn sort_by<K: Into<String>>(mut self, field: K, order: Order) -> Self {
        let field = field.into();

        match self.sort.iter_mut().find(|(existing, _)| *existing == field) {
            Some(key) => key.1 = order,
            None => self.sort.push((field, order)),
        }

        self
    }

    /// Skips the first `n` documents of the sorted result.
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Returns at most `n` documents. A limit of 0 selects nothing.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Returns exactly the documents of the given page.
    pub fn page(self, page: Page) -> Self {
        self.skip(page.skip()).limit(page.limit())
    }

    /// The effective sort document, including the `_id` tie-breaker of
    /// paginated reads.
    fn sort_document(&self) -> Option<Document> {
        let mut sort: Document = self.sort
            .iter()
            .map(|(field, order)| (field.clone(), Bson::from(*order)))
            .collect();

        let paginated = self.skip.is_some() || self.limit.is_some();

        if paginated && !sort.contains_key("_id") {
            sort.insert("_id", Order::Ascending);
        }

        if sort.is_empty() {
            None
        } else {
            Some(sort)
        }
    }
}

impl<T: DeserializeOwned> Query for Find<T> {
    type Output = T;

    fn filter(&self) -> Document {
        self.filter.clone()
    }

    fn options(&self) -> Result<FindOptions> {
        let mut options = FindOptions::default();

        options.projection = self.projection.clone();
        options.sort = self.sort_document();
        options.skip = self.skip;
        options.limit = self.limit
            .map(|n| u64_to_i64_with_msg(n, "limit"))
            .transpose()?;

        Ok(options)
    }
}

impl<T> Clone for Find<T> {
    fn clone(&self) -> Self {
        Find {
            filter: self.filter.clone(),
            projection: self.projection.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Find<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Find")
            .field("filter", &self.filter)
            .field("projection", &self.projection)
            .field("sort", &self.sort)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use crate::error::ErrorExt;
    use crate::filter::Filter;
    use super::*;

    #[test]
    fn plain_find_sends_only_the_filter() -> Result<()> {
        let find: Find = Find::new(Filter::new().eq("genre", "Fiction"));
        let options = find.options()?;

        assert_eq!(find.filter(), doc!{ "genre": "Fiction" });
        assert_eq!(options.sort, None);
        assert_eq!(options.projection, None);
        assert_eq!(options.skip, None);
        assert_eq!(options.limit, None);

        Ok(())
    }

    #[test]
    fn sort_keys_keep_rank_and_latest_direction() -> Result<()> {
        let find: Find = Find::all()
            .sort_by("price", Order::Ascending)
            .sort_by("title", Order::Ascending)
            .sort_by("price", Order::Descending);

        assert_eq!(find.options()?.sort, Some(doc!{ "price": -1, "title": 1 }));

        Ok(())
    }

    #[test]
    fn pagination_adds_id_tie_breaker() -> Result<()> {
        let page = Page::new(2, 5)?;

        let sorted: Find = Find::all().sort_by("price", Order::Descending).page(page);
        let options = sorted.options()?;
        assert_eq!(options.sort, Some(doc!{ "price": -1, "_id": 1 }));
        assert_eq!(options.skip, Some(5));
        assert_eq!(options.limit, Some(5));

        let unsorted: Find = Find::all().limit(3);
        assert_eq!(unsorted.options()?.sort, Some(doc!{ "_id": 1 }));

        let explicit_id: Find = Find::all().sort_by("_id", Order::Descending).skip(1);
        assert_eq!(explicit_id.options()?.sort, Some(doc!{ "_id": -1 }));

        Ok(())
    }

    #[test]
    fn projection_is_forwarded() -> Result<()> {
        let find: Find = Find::all()
            .project(Projection::include(vec!["title", "author", "price"]).without_id());

        assert_eq!(find.options()?.projection,
                   Some(doc!{ "title": 1, "author": 1, "price": 1, "_id": 0 }));

        let hidden = Projection::exclude(["summary"]).into_document();
        assert_eq!(hidden, doc!{ "summary": 0 });

        Ok(())
    }

    #[test]
    fn huge_limit_is_rejected() {
        let find: Find = Find::all().limit(u64::MAX);
        let error = find.options().unwrap_err();

        assert_eq!(error.kind(), ErrorKind::IntConversionOverflow);
    }

    #[test]
    fn pages_cover_consecutive_ranges() -> Result<()> {
        let pages = (1..=4)
            .map(|number| Page::new(number, 3))
            .collect::<Result<Vec<_>>>()?;
        let ranges: Vec<_> = pages.iter().map(|p| (p.skip(), p.skip() + p.limit())).collect();

        assert_eq!(ranges, vec![(0, 3), (3, 6), (6, 9), (9, 12)]);
        assert_eq!(pages[2].number(), 3);
        assert_eq!(pages[2].size(), 3);

        Ok(())
    }

    #[test]
    fn page_offset_overflow_is_rejected() {
        let error = Page::new(u64::MAX, 2).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::IntConversionOverflow);
    }
}
