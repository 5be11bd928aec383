mod common;

use common::{count_rows, file_factory, names, seeded_file_factory, Author, Book};
use genrepo_core::db::DbError;
use genrepo_core::{
    open_connection, FactoryRepository, QuerySpec, RepoError, Repository, SqliteSessionFactory,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn insert_and_get_use_independent_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = FactoryRepository::<_, Author>::new(file_factory(dir.path()));

    let inserted = repo
        .insert(Author::new("N. K. Jemisin", Some("US"), 1972))
        .unwrap();
    assert_eq!(inserted.id, Some(1));
    assert_eq!(repo.get(&1).unwrap(), Some(inserted));
    assert_eq!(repo.get(&2).unwrap(), None);
}

#[test]
fn update_without_prior_load_persists_values() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = FactoryRepository::<_, Author>::new(seeded_file_factory(dir.path()));

    let mut butler = Author::new("Octavia Estelle Butler", Some("US"), 1947);
    butler.id = Some(3);
    repo.update(butler.clone()).unwrap();

    assert_eq!(repo.get(&3).unwrap(), Some(butler));
}

#[test]
fn loaded_entity_is_reattached_by_later_calls() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = FactoryRepository::<_, Author>::new(seeded_file_factory(dir.path()));

    let mut lem = repo.get(&2).unwrap().unwrap();
    lem.country = Some("Poland".to_string());
    let updated = repo.update(lem.clone()).unwrap();
    assert_eq!(updated, lem);
    assert!(repo.delete(updated).unwrap());
    assert_eq!(repo.get(&2).unwrap(), None);
}

#[test]
fn delete_by_key_crosses_session_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(seeded_file_factory(dir.path()));
    let mut repo = FactoryRepository::<_, Author>::from_shared(Arc::clone(&factory));

    assert!(repo.delete_by_key(&1).unwrap());
    assert_eq!(repo.get(&1).unwrap(), None);
    assert_eq!(count_rows(factory.config(), "authors"), 3);
    assert_eq!(count_rows(factory.config(), "books"), 3);
}

#[test]
fn delete_by_key_on_absent_key_is_null_entity_fault() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = FactoryRepository::<_, Author>::new(seeded_file_factory(dir.path()));

    let error = repo.delete_by_key(&404).unwrap_err();
    assert!(matches!(error, RepoError::NullEntity { entity: "authors" }));
}

#[test]
fn delete_of_missing_row_reports_false() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = FactoryRepository::<_, Author>::new(file_factory(dir.path()));

    let mut ghost = Author::new("Ghost", None, 1800);
    ghost.id = Some(77);
    assert!(!repo.delete(ghost).unwrap());
}

#[test]
fn commit_fault_does_not_leak_into_later_calls() {
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(seeded_file_factory(dir.path()));
    let mut books = FactoryRepository::<_, Book>::from_shared(Arc::clone(&factory));

    let error = books.insert(Book::new(999, "Orphan", 2000)).unwrap_err();
    assert!(matches!(error, RepoError::Commit(DbError::Sqlite(_))));

    let valid = books.insert(Book::new(2, "His Master's Voice", 1968)).unwrap();
    assert_eq!(valid.id, Some(7));
    assert_eq!(count_rows(factory.config(), "books"), 7);
}

#[test]
fn find_supports_filter_ordering_and_includes() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = FactoryRepository::<_, Author>::new(seeded_file_factory(dir.path()));

    let found = repo.find(
        QuerySpec::new()
            .filter(Author::BORN.ge(1921))
            .include(Author::books())
            .order_by(|query| query.order_by_desc(Author::BORN)),
    );
    assert_eq!(
        names(&found),
        vec!["Octavia E. Butler", "Ursula K. Le Guin", "Stanislaw Lem"]
    );
    let counts = found.iter().map(|author| author.books.len()).collect::<Vec<_>>();
    assert_eq!(counts, vec![1, 3, 2]);
}

#[test]
fn repositories_share_one_factory() {
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(seeded_file_factory(dir.path()));
    let mut authors = FactoryRepository::<_, Author>::from_shared(Arc::clone(&factory));
    let mut books = FactoryRepository::<_, Book>::from_shared(Arc::clone(&factory));

    let author = authors
        .insert(Author::new("Ted Chiang", Some("US"), 1967))
        .unwrap();
    let author_id = author.id.unwrap();
    books
        .insert(Book::new(author_id, "Stories of Your Life", 2002))
        .unwrap();

    let loaded = authors.find(
        QuerySpec::new()
            .filter(Author::ID.eq(author_id))
            .include(Author::books()),
    );
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].books[0].title, "Stories of Your Life");
    assert_eq!(Arc::strong_count(&factory), 3);
}

#[test]
fn query_fault_is_absorbed() {
    let dir = tempfile::tempdir().unwrap();
    let factory = seeded_file_factory(dir.path());
    open_connection(factory.config())
        .unwrap()
        .execute_batch("DROP TABLE books; DROP TABLE authors;")
        .unwrap();
    let mut repo = FactoryRepository::<_, Author>::new(factory);

    assert!(repo.get_all(vec![Author::books()]).is_empty());
    assert!(repo
        .find(QuerySpec::new().filter(Author::COUNTRY.eq("US")))
        .is_empty());
    assert!(repo.get(&1).is_err());
}

#[test]
fn session_acquisition_failure_is_absorbed_by_queries_only() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing").join("library.db");
    let mut repo = FactoryRepository::<_, Author>::new(SqliteSessionFactory::new(
        genrepo_core::StoreConfig::file(missing),
    ));

    assert!(repo.get_all(Vec::new()).is_empty());
    assert!(matches!(
        repo.insert(Author::new("Nobody", None, 2000)),
        Err(RepoError::Db(DbError::Sqlite(_)))
    ));
}

#[test]
fn concurrent_inserts_from_threads_all_succeed() {
    const WRITERS: i64 = 16;

    let dir = tempfile::tempdir().unwrap();
    let repo = FactoryRepository::<_, Author>::new(file_factory(dir.path()));

    let handles = (0..WRITERS)
        .map(|index| {
            let mut repo = repo.clone();
            thread::spawn(move || {
                repo.insert(Author::new(&format!("writer-{index}"), None, 1900 + index))
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();

    let inserted = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    let ids = inserted
        .iter()
        .map(|author| author.id.unwrap())
        .collect::<HashSet<_>>();
    assert_eq!(ids.len(), WRITERS as usize);

    let mut reader = repo.clone();
    for author in &inserted {
        assert_eq!(reader.get(&author.id.unwrap()).unwrap().as_ref(), Some(author));
    }
    assert_eq!(reader.get_all(Vec::new()).len(), WRITERS as usize);
}
