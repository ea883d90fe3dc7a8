use posting_index::{lookup, Config};
use test_log::test;

#[test]
fn index_scenario_hello_world() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    let mut index = Config::new(&folder, "title").bucket_count(8).create()?;

    index.insert_one("Hello, World", 0)?;
    index.insert_one("hello world", 13)?;
    index.insert_one("Goodbye", 27)?;

    // Newest first, both spellings are the same key
    assert_eq!(vec![13, 0], lookup(&index, "HELLO WORLD")?.into_vec());
    assert_eq!(vec![27], lookup(&index, "goodbye")?.into_vec());
    assert!(lookup(&index, "nope")?.is_empty());

    Ok(())
}

#[test]
fn index_scenario_reopen() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    let before = {
        let mut index = Config::new(&folder, "title")
            .bucket_count(8)
            .seed(42)
            .create()?;

        index.insert_one("Hello, World", 0)?;
        index.insert_one("hello world", 13)?;
        index.insert_one("Goodbye", 27)?;
        index.sync()?;

        lookup(&index, "hello world")?
    };

    // Setters are ignored on open
    let index = Config::new(&folder, "title")
        .bucket_count(1_024)
        .seed(0)
        .open()?;

    assert_eq!(8, index.bucket_count());
    assert_eq!(42, index.seed());
    assert_eq!(before, lookup(&index, "hello world")?);
    assert_eq!(vec![27], lookup(&index, "Goodbye")?.into_vec());

    Ok(())
}

#[test]
fn index_scenario_read_only() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    {
        let mut index = Config::new(&folder, "author").create()?;
        index.insert_one("Jane Austen", 100)?;
    }

    let mut index = Config::new(&folder, "author").read_only(true).open()?;
    assert_eq!(vec![100], index.lookup("jane austen")?.into_vec());

    assert!(matches!(
        index.insert_one("Jane Austen", 200),
        Err(posting_index::Error::Io(_))
    ));

    Ok(())
}

#[test]
fn index_scenario_accents() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    let mut index = Config::new(&folder, "author").create()?;
    index.insert_one("Gabriel García Márquez", 5)?;
    index.insert_one("Pérez", 6)?;

    assert_eq!(vec![5], index.lookup("gabriel garcia marquez")?.into_vec());
    assert_eq!(vec![5], index.lookup("GABRIEL GARCÍA MÁRQUEZ")?.into_vec());
    assert_eq!(vec![6], index.lookup("perez")?.into_vec());

    Ok(())
}

#[test]
fn index_scenario_missing_files() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    assert!(!Config::new(&folder, "title").exists()?);
    assert!(matches!(
        Config::new(&folder, "title").open(),
        Err(posting_index::Error::Io(_))
    ));

    Ok(())
}
