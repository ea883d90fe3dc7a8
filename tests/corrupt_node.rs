use posting_index::{coding::DecodeError, Config, Error, Node};
use std::io::Write;
use test_log::test;

#[test]
fn corrupt_node_truncated_store() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let mut index = Config::new(&folder, "title").bucket_count(1).create()?;

    index.insert_one("dune", 1)?;
    index.insert_one("emma", 2)?;

    let len = index.node_store().len()?;

    // Cut into the newest node
    std::fs::OpenOptions::new()
        .write(true)
        .open(index.node_store().path())?
        .set_len(len - 3)?;

    assert!(matches!(
        index.lookup("dune"),
        Err(Error::Decode(DecodeError::ShortRead { .. }))
    ));

    Ok(())
}

#[test]
fn corrupt_node_head_past_eof() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let mut index = Config::new(&folder, "title").create()?;

    index.insert_one("dune", 1)?;

    let bucket = index.bucket_of("dune");
    index.bucket_table().write_head(bucket, 1_000_000)?;

    assert!(matches!(
        index.lookup("dune"),
        Err(Error::Decode(DecodeError::ShortRead { got: 0, .. }))
    ));

    Ok(())
}

#[test]
fn corrupt_node_head_inside_header() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let index = Config::new(&folder, "title").create()?;

    let bucket = index.bucket_of("dune");
    index.bucket_table().write_head(bucket, 100)?;

    assert!(matches!(index.lookup("dune"), Err(Error::InvalidOffset(100))));

    Ok(())
}

#[test]
fn corrupt_node_self_loop() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let index = Config::new(&folder, "title").bucket_count(1).create()?;

    let offset = index.node_store().len()?;
    let node = Node::single(b"loop".to_vec(), 1, offset);
    assert_eq!(offset, index.node_store().append(&node)?);
    index.bucket_table().write_head(0, offset)?;

    assert!(matches!(
        index.lookup("other"),
        Err(Error::InvalidOffset(next)) if next == offset
    ));

    Ok(())
}

#[test]
fn corrupt_node_forward_pointer() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let index = Config::new(&folder, "title").bucket_count(1).create()?;

    let first = Node::single(b"dune".to_vec(), 1, 0);
    let second_offset = index.node_store().len()? + first.encoded_len() as u64;

    // first -> second -> first
    let first = Node::single(b"dune".to_vec(), 1, second_offset);
    let first_offset = index.node_store().append(&first)?;
    let second = Node::single(b"emma".to_vec(), 2, first_offset);
    assert_eq!(second_offset, index.node_store().append(&second)?);

    // Walking from the second node is fine until the first hop back
    index.bucket_table().write_head(0, second_offset)?;
    assert!(matches!(
        index.lookup("dune"),
        Err(Error::InvalidOffset(next)) if next == second_offset
    ));

    index.bucket_table().write_head(0, first_offset)?;
    assert!(matches!(
        index.lookup("emma"),
        Err(Error::InvalidOffset(next)) if next == second_offset
    ));

    Ok(())
}

#[test]
fn corrupt_node_huge_list_len() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;
    let index = Config::new(&folder, "title").create()?;

    let offset = index.node_store().len()?;

    // key "dune", list length u32::MAX, but nothing behind it
    let mut node = Vec::new();
    node.extend_from_slice(&4u16.to_le_bytes());
    node.extend_from_slice(b"dune");
    node.extend_from_slice(&u32::MAX.to_le_bytes());

    std::fs::OpenOptions::new()
        .append(true)
        .open(index.node_store().path())?
        .write_all(&node)?;

    index.bucket_table().write_head(index.bucket_of("dune"), offset)?;

    match index.lookup("dune") {
        Err(Error::Decode(DecodeError::ShortRead { expected, got, .. })) => {
            assert_eq!(u32::MAX as usize * 8 + 8, expected);
            assert_eq!(0, got);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    Ok(())
}

#[test]
fn corrupt_node_header_rejected() -> posting_index::Result<()> {
    let folder = tempfile::tempdir()?;

    let (buckets_path, nodes_path) = {
        let index = Config::new(&folder, "title").create()?;
        (
            index.bucket_table().path().to_path_buf(),
            index.node_store().path().to_path_buf(),
        )
    };

    // Swapped files
    assert!(matches!(
        posting_index::Index::open(&nodes_path, &buckets_path),
        Err(Error::Decode(DecodeError::InvalidHeader(_)))
    ));

    // Flip one byte of the bucket count
    let mut bytes = std::fs::read(&buckets_path)?;
    bytes[12] ^= 0xFF;
    std::fs::write(&buckets_path, &bytes)?;

    assert!(matches!(
        Config::new(&folder, "title").open(),
        Err(Error::Decode(DecodeError::ChecksumMismatch { .. }))
    ));

    Ok(())
}
