use posting_index::{lookup, lookup_conjunctive, Config, Error};
use test_log::test;

#[test]
fn conjunctive_title_and_author() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    let mut titles = Config::new(&folder, "title").bucket_count(4).create()?;
    let mut authors = Config::new(&folder, "author").bucket_count(8).create()?;

    let records = [
        (0, "Dune", "Frank Herbert"),
        (30, "Dune", "Brian Herbert"),
        (60, "Children of Dune", "Frank Herbert"),
        (90, "Dune", "Frank Herbert"),
    ];

    for (offset, title, author) in records {
        titles.insert_one(title, offset)?;
        authors.insert_one(author, offset)?;
    }

    assert_eq!(
        vec![0, 90],
        lookup_conjunctive(&titles, &authors, "Dune", "FRANK HERBERT")?.into_vec()
    );
    assert_eq!(
        vec![30],
        lookup_conjunctive(&titles, &authors, "dune", "brian herbert")?.into_vec()
    );
    assert!(lookup_conjunctive(&titles, &authors, "children of dune", "brian herbert")?.is_empty());

    Ok(())
}

#[test]
fn conjunctive_dedups_repeated_offsets() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    let mut a = Config::new(&folder, "a").create()?;
    let mut b = Config::new(&folder, "b").create()?;

    a.insert_posting("x", &[7, 3, 7])?;
    a.insert_one("x", 3)?;
    b.insert_posting("y", &[3, 3, 7, 11])?;

    assert_eq!(4, lookup(&a, "x")?.len());
    assert_eq!(vec![3, 7], lookup_conjunctive(&a, &b, "x", "y")?.into_vec());

    Ok(())
}

#[test]
fn conjunctive_single_key_passthrough() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    let mut a = Config::new(&folder, "a").create()?;
    let b = Config::new(&folder, "b").create()?;

    a.insert_one("x", 9)?;
    a.insert_one("x", 1)?;
    a.insert_one("x", 9)?;

    // Unchanged, neither sorted nor deduplicated
    assert_eq!(vec![9, 1, 9], lookup_conjunctive(&a, &b, "x", "")?.into_vec());
    assert!(lookup_conjunctive(&a, &b, "", "x")?.is_empty());

    Ok(())
}

#[test]
fn conjunctive_empty_query() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    let a = Config::new(&folder, "a").create()?;
    let b = Config::new(&folder, "b").create()?;

    assert!(matches!(
        lookup_conjunctive(&a, &b, "", ""),
        Err(Error::EmptyQuery)
    ));
    assert!(matches!(
        lookup_conjunctive(&a, &b, "   ", "!!!"),
        Err(Error::EmptyQuery)
    ));

    Ok(())
}
