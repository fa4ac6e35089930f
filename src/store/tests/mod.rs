use super::*;
use tempfile::TempDir;

async fn create_test_store() -> (Store, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(temp_dir.path().join("torrents")).await.unwrap();
    (store, temp_dir)
}

async fn store_file(store: &Store, name: &str, bytes: &[u8]) {
    let mut pending = store.create(name).await.unwrap();
    pending.write(bytes).await.unwrap();
    pending.commit().await.unwrap();
}

fn dir_entries(store: &Store) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(store.root())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_open_creates_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("a").join("b");

    let store = Store::open(&root).await.unwrap();

    assert!(root.is_dir());
    assert_eq!(store.root(), root.as_path());
}

#[tokio::test]
async fn test_commit_publishes_file() {
    let (store, _temp_dir) = create_test_store().await;

    assert!(!store.exists("a.torrent").await.unwrap());
    store_file(&store, "a.torrent", b"d8:announce0:e").await;

    assert!(store.exists("a.torrent").await.unwrap());
    assert_eq!(
        std::fs::read(store.root().join("a.torrent")).unwrap(),
        b"d8:announce0:e"
    );
    // Only the published file is left behind
    assert_eq!(dir_entries(&store), vec!["a.torrent".to_string()]);
}

#[tokio::test]
async fn test_long_name_can_be_stored() {
    let (store, _temp_dir) = create_test_store().await;
    // 250 bytes: a legal file name, too long to carry a temp suffix in full
    let name = format!("{}.torrent", "a".repeat(242));
    assert_eq!(name.len(), 250);

    store_file(&store, &name, b"d4:infoe").await;

    assert!(store.exists(&name).await.unwrap());
    assert_eq!(dir_entries(&store), vec![name]);
}

#[test]
fn test_temp_file_name_is_bounded_and_hidden() {
    let long = format!("{}.torrent", "é".repeat(120));

    let temp = temp_file_name(&long, 7);

    assert!(temp.starts_with('.'));
    assert!(temp.ends_with(PARTIAL_SUFFIX));
    assert!(temp.len() < TEMP_NAME_PREFIX_BYTES + 40);
    assert!(!has_torrent_suffix(&temp));
}

#[tokio::test]
async fn test_pending_file_is_invisible_until_commit() {
    let (store, _temp_dir) = create_test_store().await;

    let mut pending = store.create("a.torrent").await.unwrap();
    pending.write(b"partial").await.unwrap();

    assert!(!store.exists("a.torrent").await.unwrap());
    assert!(store.list().await.unwrap().is_empty());

    pending.commit().await.unwrap();
    assert!(store.exists("a.torrent").await.unwrap());
}

#[tokio::test]
async fn test_dropped_pending_file_leaves_nothing_behind() {
    let (store, _temp_dir) = create_test_store().await;

    {
        let mut pending = store.create("a.torrent").await.unwrap();
        pending.write(b"half of a torr").await.unwrap();
        // dropped here, simulating a transfer that failed mid-way
    }

    assert!(!store.exists("a.torrent").await.unwrap());
    assert!(dir_entries(&store).is_empty(), "temp file should be gone");
}

#[tokio::test]
async fn test_create_rejects_existing_name() {
    let (store, _temp_dir) = create_test_store().await;
    store_file(&store, "a.torrent", b"first").await;

    let result = store.create("a.torrent").await;

    assert!(
        matches!(result, Err(StoreError::AlreadyExists { ref name }) if name == "a.torrent"),
        "got {:?}",
        result
    );
}

#[tokio::test]
async fn test_concurrent_writers_first_commit_wins() {
    let (store, _temp_dir) = create_test_store().await;

    let mut first = store.create("a.torrent").await.unwrap();
    let mut second = store.create("a.torrent").await.unwrap();
    first.write(b"first").await.unwrap();
    second.write(b"second").await.unwrap();

    first.commit().await.unwrap();
    let result = second.commit().await;

    assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
    assert_eq!(std::fs::read(store.root().join("a.torrent")).unwrap(), b"first");
    assert_eq!(dir_entries(&store), vec!["a.torrent".to_string()]);
}

#[tokio::test]
async fn test_distinct_names_write_independently() {
    let (store, _temp_dir) = create_test_store().await;

    let mut a = store.create("a.torrent").await.unwrap();
    let mut b = store.create("b.torrent").await.unwrap();
    a.write(b"aaa").await.unwrap();
    b.write(b"bbb").await.unwrap();
    b.commit().await.unwrap();
    a.commit().await.unwrap();

    assert_eq!(
        dir_entries(&store),
        vec!["a.torrent".to_string(), "b.torrent".to_string()]
    );
}

#[tokio::test]
async fn test_invalid_names_are_rejected() {
    let (store, _temp_dir) = create_test_store().await;

    for name in ["", ".", "..", "../escape.torrent", "dir/a.torrent", "a\\b.torrent"] {
        let result = store.create(name).await;
        assert!(
            matches!(result, Err(StoreError::InvalidName { .. })),
            "{:?} should be rejected, got {:?}",
            name,
            result
        );
        assert!(store.exists(name).await.is_err());
    }
}

#[tokio::test]
async fn test_list_filters_non_torrents_and_directories() {
    let (store, _temp_dir) = create_test_store().await;
    store_file(&store, "a.torrent", b"aaaa").await;
    store_file(&store, "B.TORRENT", b"bb").await;
    std::fs::write(store.root().join("notes.txt"), b"ignore me").unwrap();
    std::fs::create_dir(store.root().join("nested.torrent")).unwrap();
    let _in_flight = store.create("c.torrent").await.unwrap();

    let mut files = store.list().await.unwrap();
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["B.TORRENT", "a.torrent"]);
    assert_eq!(files[0].size_bytes, 2);
    assert_eq!(files[1].size_bytes, 4);
    assert!(files[1].modified.is_some());
}

#[tokio::test]
async fn test_list_fails_when_root_is_gone() {
    let (store, temp_dir) = create_test_store().await;
    std::fs::remove_dir_all(temp_dir.path().join("torrents")).unwrap();

    assert!(matches!(store.list().await, Err(StoreError::Io { .. })));
}

#[tokio::test]
async fn test_remove_is_best_effort() {
    let (store, _temp_dir) = create_test_store().await;
    store_file(&store, "a.torrent", b"aaaa").await;

    store.remove("a.torrent").await;
    assert!(!store.exists("a.torrent").await.unwrap());

    // Missing files and bad names are logged, never surfaced
    store.remove("a.torrent").await;
    store.remove("../outside.torrent").await;
}
