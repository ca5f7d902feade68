//! Runs the bookstore queries, updates, aggregations and index declarations
//! against a running server, printing every result:
//! ```sh
//! FOLIO_URI=mongodb://127.0.0.1:27017 cargo run --example queries -- --page 2
//! ```
//! Set `RUST_LOG=folio=debug` to see each operation as it is issued.

use std::process;
use clap::Parser;
use futures::FutureExt;
use serde_derive::Deserialize;
use folio::prelude::*;

/// Command-line arguments.
#[derive(Debug, Clone, Copy, Parser)]
#[command(about = "Runs the bookstore queries against a document store")]
struct Args {
    /// Which page of books to print, starting at 1.
    #[arg(long, default_value_t = 1)]
    page: u64,
    /// How many books are on a page.
    #[arg(long, default_value_t = 5)]
    page_size: u64,
}

// Types for representing a book.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Book {
    title: String,
    author: String,
    genre: String,
    published_year: i32,
    price: f64,
    in_stock: bool,
}

// Types for querying the collection for books.

#[derive(Debug, Clone, Copy)]
struct PublishedAfter {
    year: i32,
    in_stock_only: bool,
}

impl Query for PublishedAfter {
    type Output = Book;

    fn filter(&self) -> Document {
        let filter = if self.in_stock_only {
            Filter::new().eq("in_stock", true)
        } else {
            Filter::new()
        };

        filter.gt("published_year", self.year).into_document()
    }
}

fn heading(title: &str) {
    println!();
    println!("{}", title);
    println!("{}", "-".repeat(title.len()));
}

fn print_books(books: &[Book]) {
    for book in books {
        let stock = if book.in_stock { "in stock" } else { "sold out" };

        println!("{:>4}  {:<32} {:<20} {:<12} {:>7.2}  {}",
                 book.published_year, book.title, book.author, book.genre, book.price, stock);
    }
}

async fn print_all(cursor: Cursor<'_, Document>) -> FolioResult<()> {
    let docs = cursor.into_vec().await?;
    println!("{}", render_documents(docs)?);
    Ok(())
}

async fn run(books: &QueryGateway, page: Page) -> FolioResult<()> {
    println!("\n===== BASIC CRUD OPERATIONS =====");

    heading("Books in genre 'Fiction':");
    print_all(books.find_many(Filter::new().eq("genre", "Fiction"), None).await?).await?;

    heading("Books published after 2015:");
    let recent = PublishedAfter { year: 2015, in_stock_only: false };
    print_books(&books.find_many(recent, None).await?.into_vec().await?);

    heading("Books by 'John Doe':");
    print_all(books.find_many(doc!{ "author": "John Doe" }, None).await?).await?;

    heading("Updating price of 'The Great Book'...");
    let outcome = books.update_one(
        (Filter::new().eq("title", "The Great Book"), UpdateSpec::new().set("price", 19.99)),
        None,
    ).await?;
    println!("matched {}, modified {}", outcome.matched, outcome.modified);

    heading("Deleting book titled 'Old Book'...");
    let deleted = books.delete_one(Filter::new().eq("title", "Old Book"), None).await?;
    println!("deleted {}", deleted);

    println!("\n===== ADVANCED QUERIES =====");

    heading("Books in stock & published after 2010:");
    let in_stock = PublishedAfter { year: 2010, in_stock_only: true };
    print_books(&books.find_many(in_stock, None).await?.into_vec().await?);

    heading("Projection (title, author, price):");
    let projected: Find = Find::all()
        .project(Projection::include(["title", "author", "price"]).without_id());
    print_all(books.find_many(projected, None).await?).await?;

    heading("Books sorted by price ascending:");
    let ascending: Find<Book> = Find::all().sort_by("price", Order::Ascending);
    print_books(&books.find_many(ascending, None).await?.into_vec().await?);

    heading("Books sorted by price descending:");
    let descending: Find<Book> = Find::all().sort_by("price", Order::Descending);
    print_books(&books.find_many(descending, None).await?.into_vec().await?);

    heading(&format!("Books on page {} ({} per page):", page.number(), page.size()));
    let paged: Find<Book> = Find::all().page(page);
    print_books(&books.find_many(paged, None).await?.into_vec().await?);

    println!("\n===== AGGREGATION PIPELINES =====");

    heading("Average price by genre:");
    print_all(books.aggregate(average_by("genre", "price", "avgPrice"), None).await?).await?;

    heading("Author with the most books:");
    print_all(books.aggregate(most_frequent("author", 1), None).await?).await?;

    heading("Books grouped by publication decade:");
    print_all(books.aggregate(count_by_decade("published_year"), None).await?).await?;

    println!("\n===== INDEXING =====");

    heading("Creating index on 'title'...");
    let name = books.create_index(&IndexSpec::on("title"), None).await?;
    println!("created {}", name);

    heading("Creating compound index on author + published_year...");
    let compound = IndexSpec::new().ascending("author").descending("published_year");
    let name = books.create_index(&compound, None).await?;
    println!("created {}", name);

    heading("Explain index usage for title search:");
    let report = books.explain(
        Filter::new().eq("title", "The Great Book"),
        Verbosity::ExecutionStats,
        None,
    ).await?;
    println!("{}", render_documents(vec![report])?);

    Ok(())
}

async fn example_main(args: Args) -> FolioResult<()> {
    let page = Page::new(args.page, args.page_size)?;
    let config = Config::from_env()?;
    let gateway = QueryGateway::connect(&config).await?;

    gateway.scope(move |books| run(books, page).boxed_local()).await
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(error) = example_main(Args::parse()).await {
        eprintln!("{:#}", error);
        process::exit(1);
    }
}
