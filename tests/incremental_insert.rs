use posting_index::{build, Config, CsvSource, Field, RecordSource};
use test_log::test;

#[test]
fn incremental_insert_after_build() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let csv = folder.path().join("books.csv");
    std::fs::write(&csv, "title,author\nDune,Frank Herbert\n")?;

    let source = CsvSource::open(&csv)?;
    let (mut index, _) = build(&source, Field::Title, Config::new(&folder, "title"))?;

    let offset = source.append("Dune,Kevin J. Anderson")?;
    index.insert_one("Dune", offset)?;

    assert_eq!(vec![offset, 13], index.lookup("dune")?.into_vec());
    assert_eq!(
        b"Dune,Kevin J. Anderson".to_vec(),
        source.read_record_at(offset)?
    );

    drop(index);

    let index = Config::new(&folder, "title").open()?;
    assert_eq!(vec![offset, 13], index.lookup("dune")?.into_vec());

    Ok(())
}

#[test]
fn incremental_insert_without_sync() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    {
        let mut index = Config::new(&folder, "title")
            .sync_each_insert(false)
            .create()?;

        for i in 0..1_000 {
            index.insert_one(&format!("key {}", i % 10), i)?;
        }

        index.sync()?;
    }

    let index = Config::new(&folder, "title").open()?;

    for k in 0..10 {
        let hits = index.lookup(&format!("key {k}"))?.into_vec();
        assert_eq!(100, hits.len());
        assert!(hits.windows(2).all(|w| w[0] > w[1]), "newest first");
    }

    Ok(())
}

#[test]
fn incremental_insert_node_offsets_increase() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let mut index = Config::new(&folder, "title").create()?;

    let mut last = 0;

    for i in 0..100 {
        let offset = index.insert_one("same", i)?;
        assert!(offset >= 4_096);
        assert!(offset > last);
        last = offset;
    }

    assert_eq!(index.node_store().len()?, last + 8 + 14 + 4);

    Ok(())
}
