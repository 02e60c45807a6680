mod common;

use std::{sync::Arc, time::Duration};

use common::{new_memory_client, BarrierObjectStore, TruncatingObjectStore, BUCKET};
use lgn_object_store::{Checksum, Error, MemoryObjectStore, ObjectStoreClient};
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn test_put_then_get_round_trips_content() {
    let (_store, client) = new_memory_client();

    let data = {
        let mut data = vec![0x41; 128];
        data.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        data
    };

    client
        .put_object("assets/data.bin", data.as_slice())
        .await
        .unwrap();

    let mut reader = client.get_object("assets/data.bin").await.unwrap();
    let mut content = Vec::new();
    reader.read_to_end(&mut content).await.unwrap();

    assert_eq!(content, data);
    assert_eq!(client.read_object("assets/data.bin").await.unwrap(), data);
}

#[tokio::test]
async fn test_put_overwrites_existing_object() {
    let (store, client) = new_memory_client();

    client.put_object("a.txt", &b"first"[..]).await.unwrap();
    client.put_object("a.txt", &b"second"[..]).await.unwrap();

    assert_eq!(client.read_object("a.txt").await.unwrap(), b"second");
    assert_eq!(store.len(BUCKET).await, 1);
}

#[tokio::test]
async fn test_put_attaches_checksum_of_the_content() {
    let (store, client) = new_memory_client();

    client.put_object("a.txt", &b"hello world"[..]).await.unwrap();

    let object = store.object(BUCKET, "a.txt").await.unwrap();

    assert_eq!(
        object.checksum.to_string(),
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
    assert_ne!(object.checksum, Checksum::new_from_data(b""));
    assert_eq!(object.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_get_unknown_key_is_not_found() {
    let (_store, client) = new_memory_client();

    match client.get_object("never/written").await {
        Err(Error::NotFound { bucket, key }) => {
            assert_eq!(bucket, BUCKET);
            assert_eq!(key, "never/written");
        }
        Err(err) => panic!("unexpected error: {:?}", err),
        Ok(_) => panic!("expected error"),
    }
}

#[tokio::test]
async fn test_delete_unknown_key_succeeds() {
    let (store, client) = new_memory_client();

    client.delete_object("never/written").await.unwrap();

    assert_eq!(store.delete_requests(), 1);
}

#[tokio::test]
async fn test_delete_object() {
    let (_store, client) = new_memory_client();

    client.put_object("a.txt", &b"a"[..]).await.unwrap();
    client.delete_object("a.txt").await.unwrap();

    assert!(matches!(
        client.get_object("a.txt").await,
        Err(err) if err.is_not_found()
    ));
}

#[tokio::test]
async fn test_delete_objects_empty_does_not_issue_requests() {
    let (store, client) = new_memory_client();

    client.delete_objects::<&str>(&[]).await.unwrap();

    assert_eq!(store.requests(), 0);
}

#[tokio::test]
async fn test_delete_objects_issues_a_single_request() {
    let (store, client) = new_memory_client();

    let keys = ["a", "b", "c", "missing"];

    client
        .put_objects(vec![&b"a"[..], &b"b"[..], &b"c"[..]], &keys[..3])
        .await
        .unwrap();
    client.delete_objects(&keys).await.unwrap();

    assert_eq!(store.bulk_delete_requests(), 1);
    assert_eq!(store.delete_requests(), 0);
    assert!(store.is_empty(BUCKET).await);
}

#[tokio::test]
async fn test_put_objects_count_mismatch_does_not_issue_requests() {
    let (store, client) = new_memory_client();

    for (streams, keys) in [(0, 1), (1, 0), (2, 3), (5, 1)] {
        let readers = vec![&b"data"[..]; streams];
        let keys: Vec<String> = (0..keys).map(|i| format!("key-{}", i)).collect();

        match client.put_objects(readers, &keys).await {
            Err(Error::CountMismatch {
                streams: actual_streams,
                keys: actual_keys,
            }) => {
                assert_eq!(actual_streams, streams);
                assert_eq!(actual_keys, keys.len());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    assert_eq!(store.requests(), 0);
}

#[tokio::test]
async fn test_put_objects_issues_one_request_per_item() {
    let (store, client) = new_memory_client();

    let keys: Vec<String> = (0..16).map(|i| format!("batch/{}.bin", i)).collect();
    let contents: Vec<Vec<u8>> = keys.iter().map(|key| key.as_bytes().to_vec()).collect();
    let readers: Vec<&[u8]> = contents.iter().map(Vec::as_slice).collect();

    client.put_objects(readers, &keys).await.unwrap();

    assert_eq!(store.put_requests(), keys.len());

    for (key, content) in keys.iter().zip(&contents) {
        assert_eq!(&client.read_object(key).await.unwrap(), content);
    }
}

#[tokio::test]
async fn test_put_objects_runs_uploads_concurrently() {
    const COUNT: usize = 8;

    let memory = MemoryObjectStore::new();
    let store = BarrierObjectStore::new(memory.clone(), COUNT);
    let client = ObjectStoreClient::new(Arc::new(store), BUCKET).unwrap();

    let keys: Vec<String> = (0..COUNT).map(|i| format!("{}.txt", i)).collect();
    let readers = vec![&b"data"[..]; COUNT];

    // Sequential uploads would wait on the barrier forever.
    tokio::time::timeout(Duration::from_secs(10), client.put_objects(readers, &keys))
        .await
        .expect("uploads did not run concurrently")
        .unwrap();

    assert_eq!(memory.put_requests(), COUNT);
}

#[tokio::test]
async fn test_put_objects_aggregates_failures() {
    let (store, client) = new_memory_client();

    store.reject_key("b.txt").await;
    store.reject_key("d.txt").await;

    let keys = ["a.txt", "b.txt", "c.txt", "d.txt"];
    let readers = vec![&b"a"[..], &b"b"[..], &b"c"[..], &b"d"[..]];

    match client.put_objects(readers, &keys).await {
        Err(Error::BatchUpload { failures }) => {
            let failed: Vec<_> = failures.iter().map(|(key, _)| key.as_str()).collect();

            assert_eq!(failed, vec!["b.txt", "d.txt"]);
            assert!(failures
                .iter()
                .all(|(_, err)| matches!(err, Error::Transport(_))));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // Every upload was attempted, and the successful ones were stored.
    assert_eq!(store.put_requests(), 4);
    assert!(store.object(BUCKET, "a.txt").await.is_some());
    assert!(store.object(BUCKET, "c.txt").await.is_some());
    assert!(store.object(BUCKET, "b.txt").await.is_none());
}

#[tokio::test]
async fn test_upload_and_download_files() {
    let (_store, client) = new_memory_client();
    let dir = tempfile::tempdir().unwrap();

    let source = dir.path().join("source.csv");
    tokio::fs::write(&source, b"a,b\n1,2\n").await.unwrap();

    client.upload_file(&source, "tables/data.csv").await.unwrap();

    let destination = dir.path().join("destination.csv");
    let size = client
        .download_object("tables/data.csv", &destination)
        .await
        .unwrap();

    assert_eq!(size, 8);
    assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"a,b\n1,2\n");

    let missing = dir.path().join("missing.csv");

    assert!(client
        .download_object("tables/missing.csv", &missing)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(!missing.exists());
}

#[tokio::test]
async fn test_interrupted_download_removes_partial_file() {
    let store = MemoryObjectStore::new();
    let client =
        ObjectStoreClient::new(Arc::new(TruncatingObjectStore::new(store.clone())), BUCKET)
            .unwrap();
    let dir = tempfile::tempdir().unwrap();

    client
        .put_object("tables/data.csv", &b"a,b\n1,2\n3,4\n"[..])
        .await
        .unwrap();

    let destination = dir.path().join("destination.csv");

    assert!(matches!(
        client
            .download_object("tables/data.csv", &destination)
            .await,
        Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::ConnectionReset
    ));
    assert!(!destination.exists());
    assert!(store.object(BUCKET, "tables/data.csv").await.is_some());
}

#[tokio::test]
async fn test_upload_missing_file_is_an_io_error() {
    let (store, client) = new_memory_client();
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(
        client
            .upload_file(dir.path().join("nope.txt"), "nope.txt")
            .await,
        Err(Error::Io(_))
    ));
    assert_eq!(store.requests(), 0);
}

#[tokio::test]
async fn test_clients_share_a_store() {
    let store = MemoryObjectStore::new();
    let shared: Arc<dyn lgn_object_store::ObjectStore> = Arc::new(store.clone());

    let first = ObjectStoreClient::new(Arc::clone(&shared), "first").unwrap();
    let second = ObjectStoreClient::new(shared, "second").unwrap();

    first.put_object("a.txt", &b"first"[..]).await.unwrap();

    assert!(matches!(
        second.get_object("a.txt").await,
        Err(err) if err.is_not_found()
    ));
    assert_eq!(store.len("first").await, 1);
}
