//! Concurrent ingestion and retrieval.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use chandler_cas::{ChunkerParams, Manifest};

use super::helpers::{small_chunker, temp_store, test_data_seeded};

#[test]
fn test_concurrent_ingest_and_read() {
    let store = Arc::new(temp_store());
    let (tx, rx) = mpsc::channel();

    let writers: Vec<_> = (0..4u32)
        .map(|w| {
            let store = Arc::clone(&store);
            let tx = tx.clone();
            thread::spawn(move || {
                for i in 0..5u32 {
                    let seed = w * 100 + i;
                    let data = test_data_seeded(40_000 + seed as usize, seed);
                    let id = store.ingest_bytes(&data).unwrap();
                    tx.send((id, seed, data.len())).unwrap();
                }
            })
        })
        .collect();
    drop(tx);

    // Every superhash handed out is already fully readable.
    let reader_store = Arc::clone(&store);
    let reader = thread::spawn(move || {
        let mut seen = 0;
        for (id, seed, len) in rx {
            let got = reader_store.read_blob(&id).unwrap();
            assert_eq!(got, test_data_seeded(len, seed));
            seen += 1;
        }
        seen
    });

    for w in writers {
        w.join().unwrap();
    }
    assert_eq!(reader.join().unwrap(), 20);
    assert_eq!(store.stats().unwrap().blob_count, 20);
}

#[test]
fn test_readers_never_see_partial_ingestion() {
    let store = Arc::new(temp_store());
    let data = test_data_seeded(300_000, 7);

    // Same polynomial and sizes give the same chunks, so the superhash is
    // known before the ingestion commits.
    let params = ChunkerParams::new(store.polynomial(), small_chunker()).unwrap();
    let expected: Manifest = params.chunk(&data).into_iter().map(|c| c.id).collect();
    let id = expected.blob_id();

    let pollers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let data = data.clone();
            thread::spawn(move || {
                while !store.contains_blob(&id).unwrap() {
                    thread::yield_now();
                }
                assert_eq!(store.read_blob(&id).unwrap(), data);
            })
        })
        .collect();

    let writer = {
        let store = Arc::clone(&store);
        let data = data.clone();
        thread::spawn(move || store.ingest_bytes(&data).unwrap())
    };

    assert_eq!(writer.join().unwrap(), id);
    for p in pollers {
        p.join().unwrap();
    }
}
