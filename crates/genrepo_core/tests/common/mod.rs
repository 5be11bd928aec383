#![allow(dead_code)]

use genrepo_core::entity::{Entity, MappingError, Record, Relation};
use genrepo_core::query::Column;
use genrepo_core::{
    open_connection, JournalMode, SqliteSession, SqliteSessionFactory, StoreConfig,
};
use std::path::Path;

pub const SCHEMA: &str = "
    CREATE TABLE authors (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        country TEXT,
        born INTEGER NOT NULL
    );
    CREATE TABLE books (
        id INTEGER PRIMARY KEY,
        author_id INTEGER NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        year INTEGER NOT NULL
    );
    CREATE TABLE tags (
        code TEXT PRIMARY KEY,
        label TEXT NOT NULL
    );
";

pub const SEED: &str = "
    INSERT INTO authors (id, name, country, born) VALUES
        (1, 'Ursula K. Le Guin', 'US', 1929),
        (2, 'Stanislaw Lem', 'PL', 1921),
        (3, 'Octavia E. Butler', 'US', 1947),
        (4, 'Anonymous', NULL, 1900);
    INSERT INTO books (id, author_id, title, year) VALUES
        (1, 1, 'A Wizard of Earthsea', 1968),
        (2, 1, 'The Left Hand of Darkness', 1969),
        (3, 1, 'The Dispossessed', 1974),
        (4, 2, 'Solaris', 1961),
        (5, 2, 'The Cyberiad', 1965),
        (6, 3, 'Kindred', 1979);
";

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub id: Option<i64>,
    pub name: String,
    pub country: Option<String>,
    pub born: i64,
    pub books: Vec<Book>,
}

impl Author {
    pub const ID: Column<Author> = Column::new("id");
    pub const NAME: Column<Author> = Column::new("name");
    pub const COUNTRY: Column<Author> = Column::new("country");
    pub const BORN: Column<Author> = Column::new("born");

    pub fn new(name: &str, country: Option<&str>, born: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            country: country.map(str::to_string),
            born,
            books: Vec::new(),
        }
    }

    pub fn books() -> Relation<Author> {
        Relation::has_many::<Book>("books", "author_id", |author, books| author.books = books)
    }
}

impl Entity for Author {
    type Key = i64;

    const TABLE: &'static str = "authors";
    const PRIMARY_KEY: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["name", "country", "born"];

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn set_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("country", self.country.clone())
            .with("born", self.born)
    }

    fn from_record(record: &Record) -> Result<Self, MappingError> {
        Ok(Self {
            id: record.opt_integer("id")?,
            name: record.text("name")?,
            country: record.opt_text("country")?,
            born: record.integer("born")?,
            books: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: Option<i64>,
    pub author_id: i64,
    pub title: String,
    pub year: i64,
    pub author: Option<Box<Author>>,
}

impl Book {
    pub const ID: Column<Book> = Column::new("id");
    pub const TITLE: Column<Book> = Column::new("title");
    pub const YEAR: Column<Book> = Column::new("year");
    pub const AUTHOR_ID: Column<Book> = Column::new("author_id");

    pub fn new(author_id: i64, title: &str, year: i64) -> Self {
        Self {
            id: None,
            author_id,
            title: title.to_string(),
            year,
            author: None,
        }
    }

    pub fn author() -> Relation<Book> {
        Relation::belongs_to::<Author>("author", "author_id", |book, author| {
            book.author = author.map(Box::new)
        })
    }
}

impl Entity for Book {
    type Key = i64;

    const TABLE: &'static str = "books";
    const PRIMARY_KEY: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["author_id", "title", "year"];

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn set_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("author_id", self.author_id)
            .with("title", self.title.as_str())
            .with("year", self.year)
    }

    fn from_record(record: &Record) -> Result<Self, MappingError> {
        Ok(Self {
            id: record.opt_integer("id")?,
            author_id: record.integer("author_id")?,
            title: record.text("title")?,
            year: record.integer("year")?,
            author: None,
        })
    }
}

/// Entity whose text key is always assigned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub code: Option<String>,
    pub label: String,
}

impl Tag {
    pub fn new(code: Option<&str>, label: &str) -> Self {
        Self {
            code: code.map(str::to_string),
            label: label.to_string(),
        }
    }
}

impl Entity for Tag {
    type Key = String;

    const TABLE: &'static str = "tags";
    const PRIMARY_KEY: &'static str = "code";
    const COLUMNS: &'static [&'static str] = &["label"];

    fn key(&self) -> Option<String> {
        self.code.clone()
    }

    fn set_key(&mut self, key: String) {
        self.code = Some(key);
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("code", self.code.clone())
            .with("label", self.label.as_str())
    }

    fn from_record(record: &Record) -> Result<Self, MappingError> {
        Ok(Self {
            code: record.opt_text("code")?,
            label: record.text("label")?,
        })
    }
}

/// Session over a private in-memory database with the schema applied.
pub fn memory_session() -> SqliteSession {
    let session = SqliteSession::open(&StoreConfig::in_memory()).unwrap();
    session.connection().unwrap().execute_batch(SCHEMA).unwrap();
    session
}

/// In-memory session holding the seeded library.
pub fn seeded_session() -> SqliteSession {
    let session = memory_session();
    session.connection().unwrap().execute_batch(SEED).unwrap();
    session
}

/// File-backed WAL store under `dir` with the schema applied.
pub fn file_store(dir: &Path) -> StoreConfig {
    let config = StoreConfig::file(dir.join("library.db")).journal_mode(JournalMode::Wal);
    open_connection(&config)
        .unwrap()
        .execute_batch(SCHEMA)
        .unwrap();
    config
}

pub fn file_factory(dir: &Path) -> SqliteSessionFactory {
    SqliteSessionFactory::new(file_store(dir))
}

pub fn seeded_file_factory(dir: &Path) -> SqliteSessionFactory {
    let config = file_store(dir);
    open_connection(&config)
        .unwrap()
        .execute_batch(SEED)
        .unwrap();
    SqliteSessionFactory::new(config)
}

/// Rows currently stored in `table`, read through a separate connection.
pub fn count_rows(config: &StoreConfig, table: &str) -> i64 {
    open_connection(config)
        .unwrap()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

pub fn names(authors: &[Author]) -> Vec<&str> {
    authors.iter().map(|author| author.name.as_str()).collect()
}
