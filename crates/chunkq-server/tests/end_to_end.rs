//! End-to-end tests: a real server on an ephemeral port, driven by
//! SimpleClient producers and consumers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chunkq_client::{ClientError, RecordError, SimpleClient};
use chunkq_server::{create_router, serve_with_shutdown, AppState, CategoryRegistry};
use chunkq_storage::{NoopHooks, StorageConfig};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::watch;

const MAX_N: i64 = 100_000;
const SEND_BATCH: usize = 16 * 1024;
const SCRATCH_SIZE: usize = 8 * 1024;

/// Contents of a chunk that exists before the server starts.
const PREEXISTING: &[u8] = b"12345\n";
const PREEXISTING_SUM: i64 = 12345;

async fn start_server(dir: &Path) -> String {
    start_server_with_registry(dir).await.0
}

async fn start_server_with_registry(dir: &Path) -> (String, Arc<CategoryRegistry>) {
    let registry = Arc::new(CategoryRegistry::new(
        dir,
        "moscow",
        Arc::new(NoopHooks),
        StorageConfig {
            max_chunk_size: 64 * 1024,
            ..Default::default()
        },
    ));
    let router = create_router(AppState {
        registry: Arc::clone(&registry),
        max_write_size: 1024 * 1024,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_with_shutdown(
        listener,
        router,
        std::future::pending::<()>(),
    ));
    (format!("http://{}", addr), registry)
}

/// Data dir with a `numbers` category holding one chunk of this instance.
fn seeded_data_dir() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let category = temp_dir.path().join("numbers");
    std::fs::create_dir_all(&category).unwrap();
    std::fs::write(category.join("moscow-chunk1"), PREEXISTING).unwrap();
    temp_dir
}

async fn produce(client: &SimpleClient) -> i64 {
    let mut sum = 0;
    let mut buf = String::with_capacity(SEND_BATCH);

    for i in 0..=MAX_N {
        sum += i;
        buf.push_str(&i.to_string());
        buf.push('\n');

        if buf.len() >= SEND_BATCH {
            client.send("numbers", std::mem::take(&mut buf)).await.unwrap();
        }
    }
    if !buf.is_empty() {
        client.send("numbers", buf).await.unwrap();
    }

    sum
}

fn parse_record(record: &[u8]) -> Result<i64, RecordError> {
    std::str::from_utf8(record)
        .map_err(|e| RecordError::Fatal(e.to_string()))?
        .parse::<i64>()
        .map_err(|e| RecordError::Fatal(e.to_string()))
}

/// Consume until the producer is done, failing every tenth batch.
async fn consume_with_failures(client: &SimpleClient, finished: watch::Receiver<bool>) -> i64 {
    let mut sum = 0;
    let mut scratch = Vec::with_capacity(SCRATCH_SIZE);
    let mut loop_count = 0u64;

    loop {
        loop_count += 1;
        let producer_done = *finished.borrow();
        let fail = loop_count % 10 == 0;

        let result = client
            .process("numbers", &mut scratch, |record| {
                if fail {
                    return Err(RecordError::Transient("injected".to_string()));
                }
                sum += parse_record(record)?;
                Ok(())
            })
            .await;

        match result {
            Ok(_) => {}
            Err(e) if e.is_transient_record() => continue,
            Err(ClientError::NoNewData) => {
                if producer_done {
                    return sum;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Err(e) => panic!("process failed: {}", e),
        }
    }
}

#[tokio::test]
async fn test_concurrent_produce_and_consume() {
    let data_dir = seeded_data_dir();
    let addr = start_server(data_dir.path()).await;
    let client = SimpleClient::new(vec![addr]).unwrap();
    let (done_tx, done_rx) = watch::channel(false);

    let (want, got) = tokio::join!(
        async {
            let sum = produce(&client).await;
            done_tx.send(true).unwrap();
            sum
        },
        consume_with_failures(&client, done_rx),
    );

    assert_eq!(want + PREEXISTING_SUM, got);

    // Every completed chunk was acknowledged, including the seeded one.
    let chunks = client.list_chunks("numbers").await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(!chunks[0].complete);
    assert!(!data_dir.path().join("numbers").join("moscow-chunk1").exists());
}

#[tokio::test]
async fn test_sequential_produce_then_process_until() {
    let data_dir = seeded_data_dir();
    let addr = start_server(data_dir.path()).await;
    let client = SimpleClient::new(vec![addr]).unwrap();

    let want = produce(&client).await;
    let (_done_tx, done_rx) = watch::channel(true);

    let mut got = 0;
    let mut scratch = Vec::with_capacity(SCRATCH_SIZE);
    client
        .process_until("numbers", &mut scratch, &done_rx, |record| {
            got += parse_record(record)?;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(want + PREEXISTING_SUM, got);

    // New chunks continue after the seeded index.
    let chunks = client.list_chunks("numbers").await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].name.starts_with("moscow-chunk"));
    assert!(chunks[0].name != "moscow-chunk0" && chunks[0].name != "moscow-chunk1");
}

#[tokio::test]
async fn test_process_until_waits_for_producer() {
    let data_dir = TempDir::new().unwrap();
    let addr = start_server(data_dir.path()).await;
    let client = SimpleClient::new(vec![addr]).unwrap();
    let (done_tx, done_rx) = watch::channel(false);

    let mut got = Vec::new();
    let mut scratch = Vec::new();
    let (_, processed) = tokio::join!(
        async {
            // Consumer starts on an empty category and has to keep polling.
            tokio::time::sleep(Duration::from_millis(100)).await;
            client.send("events", "a\nb\n").await.unwrap();
            client.send("events", "c\n").await.unwrap();
            done_tx.send(true).unwrap();
        },
        client.process_until("events", &mut scratch, &done_rx, |record| {
            got.push(String::from_utf8_lossy(record).into_owned());
            Ok(())
        }),
    );

    processed.unwrap();
    assert_eq!(got, ["a", "b", "c"]);
}

#[tokio::test]
async fn test_open_chunk_with_unterminated_tail_is_caught_up() {
    let data_dir = TempDir::new().unwrap();
    let (addr, registry) = start_server_with_registry(data_dir.path()).await;
    let client = SimpleClient::new(vec![addr]).unwrap();

    // The second record is still being appended.
    let store = registry.store("numbers").await.unwrap();
    store.write(b"1\n2").await.unwrap();

    let mut got = Vec::new();
    let mut scratch = Vec::new();
    let processed = client
        .process("numbers", &mut scratch, |record| {
            got.push(parse_record(record)?);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(processed.0, 1);

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        client.process("numbers", &mut scratch, |_| Ok(())),
    )
    .await
    .expect("process must not spin on an unterminated tail");
    assert!(matches!(result, Err(ClientError::NoNewData)));

    // Finishing the record makes it readable.
    store.write(b"\n3\n").await.unwrap();
    client
        .process("numbers", &mut scratch, |record| {
            got.push(parse_record(record)?);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(got, [1, 2, 3]);
}
