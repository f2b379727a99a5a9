mod common;

use std::sync::Arc;
use tokio::time::{sleep, Duration};

use common::*;
use qtum_scanner::chain::gateway::RpcServerType;
use qtum_scanner::store::{MemoryStore, StateStore, UnscanRecord};

#[tokio::test]
async fn cold_start_initializes_cursor_one_below_tip() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(99, "hash99", "hash98", &[])).await;
  chain.add_block(block(100, "hash100", "hash99", &[])).await;

  let store = Arc::new(MemoryStore::new());
  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[]));
  let observer = Arc::new(RecordingObserver::new());
  scanner.register_observer(observer.clone()).await;

  scanner.resume_scanning();
  scanner.scan_block_task().await;

  let (height, hash) = store.get_cursor().await.unwrap();
  assert_eq!(height, 99);
  assert_eq!(hash, "hash99");
  assert!(observer.headers.lock().await.is_empty());
  assert!(observer.extracts.lock().await.is_empty());
}

#[tokio::test]
async fn linear_advance_extracts_watched_outputs() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(100, "hashA", "hash99", &[])).await;
  chain.add_block(block(101, "hash101", "hashA", &["T1", "T2"])).await;
  chain
    .add_tx(coin_tx("T1", 101, "hash101", &[("X1", "1.00000000")], &[("W", "1.00000000")]))
    .await;
  chain
    .add_tx(coin_tx("T2", 101, "hash101", &[("X2", "2.50000000")], &[("W", "2.50000000")]))
    .await;

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(100, "hashA").await.unwrap();

  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[("W", "acct1")]));
  let observer = Arc::new(RecordingObserver::new());
  scanner.register_observer(observer.clone()).await;

  scanner.resume_scanning();
  scanner.scan_block_task().await;

  let (height, hash) = store.get_cursor().await.unwrap();
  assert_eq!((height, hash.as_str()), (101, "hash101"));

  // block persisted for the fork path
  assert_eq!(store.get_block_by_height(101).await.unwrap().hash, "hash101");

  let headers = observer.headers.lock().await;
  assert_eq!(headers.len(), 1);
  assert_eq!(headers[0].height, 101);
  assert!(!headers[0].fork);

  let extracts = observer.extracts.lock().await;
  assert_eq!(extracts.len(), 2);
  for (source_key, data) in extracts.iter() {
    assert_eq!(source_key, "acct1");
    let trx = data.transaction.as_ref().unwrap();
    assert_eq!(trx.fees, "0.00000000");
    assert_eq!(trx.decimals, 8);
    assert!(trx.to == vec!["W:1.00000000".to_string()] || trx.to == vec!["W:2.50000000".to_string()]);
  }
}

#[tokio::test]
async fn fork_at_tip_rewinds_cursor_and_notifies_orphan() {
  let chain = Arc::new(MockChain::new());
  // remote block 201 does not link onto the local hashX
  chain.add_block(block(201, "hash201", "hashY", &["TF"])).await;

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(200, "hashX").await.unwrap();
  store.put_block(&block(199, "hash199", "hash198", &[])).await.unwrap();
  store.put_block(&block(200, "hashX", "hash199", &[])).await.unwrap();

  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[]));
  let observer = Arc::new(RecordingObserver::new());
  scanner.register_observer(observer.clone()).await;

  scanner.resume_scanning();
  scanner.scan_block_task().await;

  let (height, hash) = store.get_cursor().await.unwrap();
  assert_eq!((height, hash.as_str()), (199, "hash199"));

  let headers = observer.headers.lock().await;
  assert_eq!(headers.len(), 1);
  assert_eq!(headers[0].height, 200);
  assert!(headers[0].fork);

  // no extraction happened on the forked block
  assert!(observer.extracts.lock().await.is_empty());
}

#[tokio::test]
async fn fork_rewind_clamps_at_height_one() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(2, "hash2", "hashY", &[])).await;

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(1, "hashX").await.unwrap();
  store.put_block(&block(1, "hashX", "hash0", &[])).await.unwrap();

  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[]));
  scanner.resume_scanning();
  scanner.scan_block_task().await;

  let (height, _) = store.get_cursor().await.unwrap();
  assert_eq!(height, 1);
}

#[tokio::test]
async fn failed_extraction_leaves_unscan_record_and_rescan_recovers() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(100, "hashA", "hash99", &[])).await;
  chain.add_block(block(101, "hash101", "hashA", &["T3"])).await;

  // T3 spends an input whose address must be resolved through P1
  let mut t3 = coin_tx("T3", 101, "hash101", &[("", "")], &[("W", "0.70000000")]);
  t3.vins[0].txid = "P1".to_string();
  t3.vins[0].vout = 0;
  chain.add_tx(t3).await;
  // P1 is missing for now, the dereference fails

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(100, "hashA").await.unwrap();

  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[("W", "acct1")]));
  let observer = Arc::new(RecordingObserver::new());
  scanner.register_observer(observer.clone()).await;

  scanner.resume_scanning();
  scanner.scan_block_task().await;

  // cursor advanced in spite of the failure
  let (height, _) = store.get_cursor().await.unwrap();
  assert_eq!(height, 101);

  let records = store.list_unscan().await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].block_height, 101);
  assert_eq!(records[0].txid, "");

  // the prior transaction shows up, the next tick's rescan pass recovers
  chain
    .add_tx(coin_tx("P1", 90, "hash90", &[("F", "0.80000000")], &[("S", "0.70000000")]))
    .await;

  scanner.scan_block_task().await;

  assert!(store.list_unscan().await.unwrap().is_empty());
  let extracts = observer.extracts.lock().await;
  assert_eq!(extracts.len(), 1);
  assert_eq!(extracts[0].0, "acct1");

  // rescan with nothing left is a no-op
  drop(extracts);
  scanner.rescan_failed_record().await;
  assert!(store.list_unscan().await.unwrap().is_empty());
}

#[tokio::test]
async fn mempool_push_extracts_with_zero_height() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(9, "hash9", "hash8", &[])).await;
  chain.add_block(block(10, "hash10", "hash9", &[])).await;
  chain
    .add_tx(coin_tx("T4", 0, "", &[("X", "0.30000000")], &[("W", "0.30000000")]))
    .await;
  chain.queue_push("T4").await;

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(10, "hash10").await.unwrap();

  let mut settings = test_settings();
  settings.rpc_server_type = RpcServerType::Explorer;
  let scanner = new_scanner_with_settings(chain.clone(), store.clone(), watchlist(&[("W", "acct1")]), settings);
  let observer = Arc::new(RecordingObserver::new());
  scanner.register_observer(observer.clone()).await;

  scanner.run().await.unwrap();

  let mut delivered = false;
  for _ in 0..50 {
    if !observer.extracts.lock().await.is_empty() {
      delivered = true;
      break;
    }
    sleep(Duration::from_millis(50)).await;
  }
  scanner.stop().await;

  assert!(delivered, "mempool push was not extracted");
  let extracts = observer.extracts.lock().await;
  let (source_key, data) = &extracts[0];
  assert_eq!(source_key, "acct1");
  assert_eq!(data.tx_outputs[0].block_height, 0);
  assert_eq!(data.tx_outputs[0].block_hash, "");
  assert_eq!(data.transaction.as_ref().unwrap().block_height, 0);

  // transient mempool failures never reach the ledger
  assert!(store.list_unscan().await.unwrap().is_empty());
}

#[tokio::test]
async fn mempool_poll_scans_queued_transactions() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(10, "hash10", "hash9", &[])).await;
  chain
    .add_tx(coin_tx("M1", 0, "", &[("X", "0.10000000")], &[("W", "0.10000000")]))
    .await;
  chain.mempool.write().await.push("M1".to_string());

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(10, "hash10").await.unwrap();

  let mut settings = test_settings();
  settings.is_scan_mempool = true;
  let scanner = new_scanner_with_settings(chain.clone(), store.clone(), watchlist(&[("W", "acct1")]), settings);
  let observer = Arc::new(RecordingObserver::new());
  scanner.register_observer(observer.clone()).await;

  scanner.resume_scanning();
  scanner.scan_block_task().await;

  let extracts = observer.extracts.lock().await;
  assert_eq!(extracts.len(), 1);
  assert_eq!(extracts[0].1.tx_outputs[0].block_height, 0);
}

#[tokio::test]
async fn purge_removes_not_found_records_without_successful_retry() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(10, "hash10", "hash9", &[])).await;

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(10, "hash10").await.unwrap();
  // height 5 is not served by the backend at all, the retry cannot succeed
  store
    .insert_unscan(&UnscanRecord::new(
      5,
      "",
      "[-5]No information available about transaction Txyz",
    ))
    .await
    .unwrap();
  store
    .insert_unscan(&UnscanRecord::new(6, "", "connection reset"))
    .await
    .unwrap();

  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[]));
  scanner.resume_scanning();
  scanner.scan_block_task().await;

  let records = store.list_unscan().await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].block_height, 6);
}

#[tokio::test]
async fn set_rescan_block_height_moves_cursor_back() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(49, "hash49", "hash48", &[])).await;

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(120, "hash120").await.unwrap();

  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[]));

  assert!(scanner.set_rescan_block_height(0).await.is_err());

  scanner.set_rescan_block_height(50).await.unwrap();
  assert_eq!(scanner.get_scanned_block_height().await, 49);
  let (_, hash) = store.get_cursor().await.unwrap();
  assert_eq!(hash, "hash49");
}

#[tokio::test]
async fn tail_rescan_clamps_start_at_one() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(1, "hash1", "hash0", &[])).await;
  chain.add_block(block(2, "hash2", "hash1", &[])).await;
  chain.add_block(block(3, "hash3", "hash2", &[])).await;

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(3, "hash3").await.unwrap();

  let mut settings = test_settings();
  settings.rescan_last_block_count = 10;
  let scanner = new_scanner_with_settings(chain.clone(), store.clone(), watchlist(&[]), settings);
  let observer = Arc::new(RecordingObserver::new());
  scanner.register_observer(observer.clone()).await;

  scanner.resume_scanning();
  scanner.scan_block_task().await;

  // already caught up, so the only notifications come from the tail rescan
  let heights: Vec<u64> = observer.headers.lock().await.iter().map(|h| h.height).collect();
  assert_eq!(heights, vec![1, 2]);

  // the tail rescan does not move the cursor
  assert_eq!(scanner.get_scanned_block_height().await, 3);
}

#[tokio::test]
async fn paused_scanner_does_not_advance() {
  let chain = Arc::new(MockChain::new());
  chain.add_block(block(100, "hashA", "hash99", &[])).await;
  chain.add_block(block(101, "hash101", "hashA", &[])).await;

  let store = Arc::new(MemoryStore::new());
  store.put_cursor(100, "hashA").await.unwrap();

  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[]));
  // never resumed
  scanner.scan_block_task().await;

  assert_eq!(scanner.get_scanned_block_height().await, 100);
}

#[tokio::test]
async fn extract_transaction_data_merges_buckets() {
  let chain = Arc::new(MockChain::new());
  chain
    .add_tx(coin_tx("TX", 7, "hash7", &[("A", "1.00000000")], &[("B", "1.00000000")]))
    .await;

  let store = Arc::new(MemoryStore::new());
  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[]));

  let scan = watchlist(&[("A", "acct1"), ("B", "acct2")]);
  let merged = scanner.extract_transaction_data("TX", &scan).await.unwrap();

  assert_eq!(merged.len(), 2);
  assert_eq!(merged["acct1"][0].tx_inputs.len(), 1);
  assert_eq!(merged["acct2"][0].tx_outputs.len(), 1);

  // unknown txid is a synchronous error
  assert!(scanner.extract_transaction_data("NOPE", &scan).await.is_err());
}

#[tokio::test]
async fn get_transactions_by_address_projects_all_watched() {
  let chain = Arc::new(MockChain::new());
  chain
    .add_tx(coin_tx("TA", 7, "hash7", &[("Z", "2.00000000")], &[("A", "2.00000000")]))
    .await;
  chain
    .add_tx(coin_tx("TB", 8, "hash8", &[("Z", "3.00000000")], &[("Q", "3.00000000")]))
    .await;

  let store = Arc::new(MemoryStore::new());
  let scanner = new_scanner(chain.clone(), store.clone(), watchlist(&[]));

  let data = scanner
    .get_transactions_by_address(0, 10, &["A".to_string()])
    .await
    .unwrap();

  assert_eq!(data.len(), 1);
  assert_eq!(data[0].tx_outputs[0].address, "A");
  assert_eq!(data[0].transaction.as_ref().unwrap().txid, "TA");
}
