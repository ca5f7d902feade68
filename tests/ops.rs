//! Integration tests against a real `mongod` server, checking the
//! observable properties of every gateway operation. Namely, these tests
//! exercise the following modules end to end:
//! * [`gateway`](gateway/index.html)
//! * [`db`](db/index.html)
//! * [`cursor`](cursor/index.html)
//! * [`query`](query/index.html)
//! * [`pipeline`](pipeline/index.html)
//! * [`index`](index/index.html)
//!
//! They spawn their own server, so they need the `mongod` binary on the
//! `PATH`. Run them with `cargo test --test ops -- --ignored`.
//!
//! The server is killed once every test in this file has resigned from its
//! `ProcessGuard`. Running only a subset (e.g. with a name filter) leaves
//! the spawned `mongod` running; stop it by hand afterwards, e.g. with
//! `mongod --shutdown --dbpath <tmp>/folio_test_db`.

use std::env::temp_dir;
use std::fs::create_dir_all;
use std::sync::Mutex;
use std::time::Duration;
use std::collections::HashSet;
use std::process::{ Command, Child, Stdio };
use futures::FutureExt;
use lazy_static::lazy_static;
use scopeguard::defer;
use serde_derive::{ Serialize, Deserialize };
use folio::prelude::*;

/// Used for killing the MongoDB server process once all tests have run.
struct ProcessGuard {
    handle: Child,
    owners: HashSet<&'static str>,
}

impl ProcessGuard {
    fn new(handle: Child, owners: &[&'static str]) -> Self {
        ProcessGuard {
            handle,
            owners: owners.iter().copied().collect(),
        }
    }

    fn resign(&mut self, owner: &str) {
        let pid = self.handle.id();

        println!("=== ProcessGuard(#{}): Resigning owner '{}'", pid, owner);
        self.owners.remove(owner);

        if self.owners.is_empty() {
            println!("=== ProcessGuard(#{}): All owners resigned; killing", pid);
            self.handle.kill().expect("couldn't kill child process");
        }
    }
}

macro_rules! implement_tests {
    ($(#[test] $(#[$attr:meta])* async fn $test_name:ident() -> $ret_ty:ty $test_code:block)*) => {
        lazy_static! {
            static ref DB_SERVER_GUARD: Mutex<ProcessGuard> = {
                let dbpath = {
                    let mut tmp = temp_dir();
                    tmp.push(DB_NAME);
                    create_dir_all(&tmp).expect("couldn't create DB temp dir");
                    tmp
                };
                let owners = [$(stringify!($test_name),)*];
                let process = Command::new("mongod")
                    .arg("--noscripting")
                    .arg("--dbpath")
                    .arg(&dbpath)
                    .arg("--port")
                    .arg(DB_PORT)
                    .stdout(Stdio::piped())
                    .spawn()
                    .expect("couldn't start DB server; do you have Mongo installed?");

                Mutex::new(ProcessGuard::new(process, &owners))
            };
        }

        $(
            #[test]
            $(#[$attr])*
            fn $test_name() -> $ret_ty {
                lazy_static::initialize(&DB_SERVER_GUARD);
                defer!({
                    DB_SERVER_GUARD.lock().unwrap().resign(stringify!($test_name));
                });

                tokio::runtime::Runtime::new()
                    .expect("can't start async runtime")
                    .block_on(async move $test_code)
            }
        )*
    }
}

/// Port of the spawned server; never the default one.
static DB_PORT: &str = "12985";
/// Database (and temp directory) name.
static DB_NAME: &str = "folio_test_db";

fn config(collection: &str) -> Config {
    Config::default()
        .with_uri(format!("mongodb://127.0.0.1:{}", DB_PORT))
        .with_database(DB_NAME)
        .with_collection(collection)
        .with_connect_timeout(Duration::from_secs(20))
        .with_operation_timeout(Duration::from_secs(10))
}

/// Connects to a fresh, empty collection.
async fn fresh_gateway(collection: &str) -> FolioResult<QueryGateway> {
    let gateway = QueryGateway::connect(&config(collection)).await?;
    gateway.drop_collection(None).await?;
    Ok(gateway)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Book {
    title: String,
    author: String,
    genre: String,
    published_year: i32,
    price: f64,
    in_stock: bool,
}

fn book(title: &str, author: &str, genre: &str, published_year: i32, price: f64) -> Book {
    Book {
        title: title.into(),
        author: author.into(),
        genre: genre.into(),
        published_year,
        price,
        in_stock: true,
    }
}

fn catalog() -> Vec<Book> {
    vec![
        book("The Great Book", "John Doe", "Fiction", 2012, 10.0),
        book("Old Book", "Jane Roe", "History", 1999, 5.0),
        book("Tomorrow", "John Doe", "Fiction", 2020, 30.0),
        book("Atlas", "Ann Poe", "Science", 2015, 25.0),
        book("Orbit", "Ann Poe", "Science", 2019, 25.0),
        book("Verses", "John Doe", "Poetry", 2018, 12.5),
        book("Margins", "Jane Roe", "History", 2011, 12.5),
    ]
}

/// Projects away `_id`, so results compare equal to the inserted values.
fn without_id<T>(query: Find<T>) -> Find<T> {
    query.project(Projection::exclude(["_id"]))
}

implement_tests!{
    #[test]
    #[ignore]
    async fn unreachable_server_is_a_connection_error() -> FolioResult<()> {
        let config = Config::default()
            .with_uri("mongodb://127.0.0.1:1")
            .with_connect_timeout(Duration::from_millis(300));
        let error = QueryGateway::connect(&config).await.unwrap_err();

        assert_eq!(error.kind(), FolioErrorKind::Connection);

        Ok(())
    }

    #[test]
    #[ignore]
    async fn no_matches_are_not_errors() -> FolioResult<()> {
        let gateway = fresh_gateway("no_matches").await?;

        gateway.scope(|books| async move {
            books.insert_many(catalog(), None).await?;

            let missing = Filter::new().eq("title", "Nonexistent");
            let found = books.find_many(missing.clone(), None).await?.into_vec().await?;
            let updated = books
                .update_one((missing.clone(), UpdateSpec::new().set("price", 1.0)), None)
                .await?;
            let deleted = books.delete_one(missing, None).await?;

            assert!(found.is_empty());
            assert_eq!(updated, UpdateOutcome { matched: 0, modified: 0 });
            assert_eq!(deleted, 0);

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn inserted_document_is_found_by_unique_field() -> FolioResult<()> {
        let gateway = fresh_gateway("round_trip").await?;

        gateway.scope(|books| async move {
            let original = book("Unique Title", "Solo Author", "Drama", 2001, 8.75);
            books.insert_many(vec![&original], None).await?;

            let query: Find<Book> = without_id(Find::new(Filter::new().eq("title", "Unique Title")));
            let found = books.find_many(query, None).await?.into_vec().await?;

            assert_eq!(found, vec![original]);

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn opposite_sorts_are_reversed() -> FolioResult<()> {
        let gateway = fresh_gateway("sorting").await?;

        gateway.scope(|books| async move {
            let distinct_prices: Vec<_> = catalog()
                .into_iter()
                .filter(|b| b.title != "Orbit" && b.title != "Margins")
                .collect();
            books.insert_many(&distinct_prices, None).await?;

            let ascending: Find<Book> = without_id(Find::all().sort_by("price", Order::Ascending));
            let descending: Find<Book> = without_id(Find::all().sort_by("price", Order::Descending));

            let up = books.find_many(ascending, None).await?.into_vec().await?;
            let mut down = books.find_many(descending, None).await?.into_vec().await?;
            down.reverse();

            assert_eq!(up.len(), distinct_prices.len());
            assert_eq!(up, down);
            assert!(up.windows(2).all(|w| w[0].price <= w[1].price));

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn pages_reconstruct_the_sorted_sequence() -> FolioResult<()> {
        let gateway = fresh_gateway("pagination").await?;

        gateway.scope(|books| async move {
            let all = catalog();
            books.insert_many(&all, None).await?;

            let full: Find = Find::all().sort_by("price", Order::Ascending).sort_by("_id", Order::Ascending);
            let expected = books.find_many(full, None).await?.into_vec().await?;

            for size in 1..=4 {
                let pages = (all.len() as u64 + size - 1) / size;
                let mut joined = Vec::new();

                for number in 1..=pages {
                    let query: Find = Find::all()
                        .sort_by("price", Order::Ascending)
                        .page(Page::new(number, size)?);
                    joined.extend(books.find_many(query, None).await?.into_vec().await?);
                }

                assert_eq!(joined, expected, "page size {}", size);
            }

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn decades_group_by_integer_floor() -> FolioResult<()> {
        let gateway = fresh_gateway("decades").await?;

        gateway.scope(|books| async move {
            books.insert_many(vec![
                book("A", "X", "Fiction", 2015, 1.0),
                book("B", "Y", "Fiction", 2019, 1.0),
                book("C", "Z", "Fiction", 2020, 1.0),
            ], None).await?;

            let decades = books
                .aggregate(count_by_decade("published_year"), None)
                .await?
                .into_vec()
                .await?;

            assert_eq!(decades, vec![
                doc!{ "_id": 2010, "count": 2 },
                doc!{ "_id": 2020, "count": 1 },
            ]);

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn average_price_by_genre() -> FolioResult<()> {
        let gateway = fresh_gateway("averages").await?;

        gateway.scope(|books| async move {
            books.insert_many(vec![
                doc!{ "title": "A", "genre": "Fiction", "published_year": 2012, "price": 10 },
                doc!{ "title": "B", "genre": "Fiction", "published_year": 2020, "price": 30 },
            ], None).await?;

            let averages = books
                .aggregate(average_by("genre", "price", "avgPrice"), None)
                .await?
                .into_vec()
                .await?;

            assert_eq!(averages, vec![doc!{ "_id": "Fiction", "avgPrice": 20.0 }]);

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn most_frequent_author() -> FolioResult<()> {
        let gateway = fresh_gateway("authors").await?;

        gateway.scope(|books| async move {
            books.insert_many(catalog(), None).await?;

            let top = books
                .aggregate(most_frequent("author", 1), None)
                .await?
                .into_vec()
                .await?;

            assert_eq!(top, vec![doc!{ "_id": "John Doe", "count": 3 }]);

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn updates_and_deletes_touch_one_document() -> FolioResult<()> {
        let gateway = fresh_gateway("single_writes").await?;

        gateway.scope(|books| async move {
            books.insert_many(catalog(), None).await?;

            let by_john = Filter::new().eq("author", "John Doe");
            let outcome = books
                .update_one((by_john.clone(), UpdateSpec::new().set("price", 19.99)), None)
                .await?;
            assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

            let repriced: Find = Find::new(Filter::new().eq("price", 19.99));
            assert_eq!(books.find_many(repriced, None).await?.into_vec().await?.len(), 1);

            assert_eq!(books.delete_one(by_john.clone(), None).await?, 1);

            let remaining = books.find_many(by_john, None).await?.into_vec().await?;
            assert_eq!(remaining.len(), 2);

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn index_creation_is_idempotent() -> FolioResult<()> {
        let gateway = fresh_gateway("indexes").await?;

        gateway.scope(|books| async move {
            books.insert_many(catalog(), None).await?;

            let title = IndexSpec::on("title");
            let compound = IndexSpec::new().ascending("author").descending("published_year");

            let first = books.create_index(&title, None).await?;
            let second = books.create_index(&title, None).await?;
            assert_eq!(first, "title_1");
            assert_eq!(first, second);

            let name = books.create_index(&compound, None).await?;
            assert_eq!(name, "author_1_published_year_-1");

            let conflicting = IndexSpec::on("author").named("title_1");
            let error = books.create_index(&conflicting, None).await.unwrap_err();
            assert_eq!(error.kind(), FolioErrorKind::Index);

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn explain_reports_plan() -> FolioResult<()> {
        let gateway = fresh_gateway("explain").await?;

        gateway.scope(|books| async move {
            books.insert_many(catalog(), None).await?;
            books.create_index(&IndexSpec::on("title"), None).await?;

            let report = books
                .explain(Filter::new().eq("title", "The Great Book"), Verbosity::ExecutionStats, None)
                .await?;

            assert!(report.contains_key("queryPlanner"));
            assert_eq!(report.get_document("executionStats")?.get_i32("nReturned")?, 1);

            Ok(())
        }.boxed_local()).await
    }

    #[test]
    #[ignore]
    async fn malformed_filter_is_a_query_error() -> FolioResult<()> {
        let gateway = fresh_gateway("bad_filter").await?;

        gateway.scope(|books| async move {
            let error = books
                .find_many(doc!{ "price": { "$bogus": 1 } }, None)
                .await
                .unwrap_err();

            assert_eq!(error.kind(), FolioErrorKind::Query);

            Ok(())
        }.boxed_local()).await
    }
}
