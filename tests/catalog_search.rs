use posting_index::{Catalog, CatalogOptions, Error};
use test_log::test;

const BOOKS: &str = "title,author_name
Dune,Frank Herbert
Dune,Brian Herbert
Children of Dune,Frank Herbert
\"Pride and Prejudice\",Jane Austen
Emma,Jane Austen
";

#[test]
fn catalog_search_builds_when_missing() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let csv = folder.path().join("books.csv");
    std::fs::write(&csv, BOOKS)?;

    let index_folder = folder.path().join("index");
    assert!(!index_folder.join("title.buckets").exists());

    let catalog = Catalog::open_or_build(&index_folder, &csv, &CatalogOptions::default())?;

    assert!(index_folder.join("title.buckets").exists());
    assert!(index_folder.join("author.nodes").exists());

    assert_eq!(
        vec!["\"Pride and Prejudice\",Jane Austen".to_string()],
        catalog.search("pride and prejudice", "jane austen")?,
    );

    let mut by_author = catalog.search("", "Jane Austen")?;
    by_author.sort();
    assert_eq!(
        vec![
            "\"Pride and Prejudice\",Jane Austen".to_string(),
            "Emma,Jane Austen".to_string(),
        ],
        by_author,
    );

    assert!(matches!(catalog.search("", ""), Err(Error::EmptyQuery)));

    Ok(())
}

#[test]
fn catalog_search_add_persists() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let csv = folder.path().join("books.csv");
    std::fs::write(&csv, BOOKS)?;

    {
        let mut catalog = Catalog::open_or_build(&folder, &csv, &CatalogOptions::default())?;
        catalog.add("Persuasion,Jane Austen")?;
    }

    let catalog = Catalog::open_or_build(&folder, &csv, &CatalogOptions::default())?;

    assert_eq!(
        vec!["Persuasion,Jane Austen".to_string()],
        catalog.search("persuasion", "")?,
    );
    assert_eq!(3, catalog.search("", "jane austen")?.len());

    Ok(())
}

#[test]
fn catalog_search_rebuild() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let csv = folder.path().join("books.csv");
    std::fs::write(&csv, BOOKS)?;

    drop(Catalog::open_or_build(&folder, &csv, &CatalogOptions::default())?);

    // Appended behind the catalog's back, only a rebuild picks it up
    std::fs::write(&csv, format!("{BOOKS}Ulysses,James Joyce\n"))?;

    let catalog = Catalog::open_or_build(&folder, &csv, &CatalogOptions::default())?;
    assert!(catalog.search("ulysses", "")?.is_empty());

    let catalog = Catalog::open_or_build(
        &folder,
        &csv,
        &CatalogOptions::default().rebuild(true).author_buckets(16),
    )?;
    assert_eq!(1, catalog.search("ulysses", "james joyce")?.len());
    assert_eq!(16, catalog.authors().bucket_count());

    Ok(())
}
