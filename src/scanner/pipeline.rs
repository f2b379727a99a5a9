/**
* filename : pipeline
* author : HAMA
* date: 2025. 5. 15.
* description: Bounded producer/dispatcher/saver fan-out over one batch of
* transaction ids.
**/

use log::info;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::extractor::types::{ExtractData, ExtractResult};
use crate::scanner::scanner::BlockScanner;
use crate::store::UnscanRecord;
use crate::types::{AppError, ExtractReceiver, ExtractSender};

impl BlockScanner {
    /// Extracts a batch of transactions with bounded concurrency and FIFO
    /// delivery to the single save task. An error return means some results
    /// failed or a notification failed; the caller advances the cursor
    /// anyway and retries through the unscanned ledger.
    pub async fn batch_extract(
        self: &Arc<Self>,
        block_height: u64,
        block_hash: &str,
        txids: &[String],
    ) -> Result<(), AppError> {
        if txids.is_empty() {
            return Err(AppError::Extract("batch extract block has no transactions".to_string()));
        }

        let should_done = txids.len();

        let (producer_tx, producer_rx) = mpsc::channel::<ExtractResult>(1);
        let (save_tx, save_rx) = mpsc::channel::<ExtractResult>(1);
        let (quit_tx, quit_rx) = oneshot::channel::<()>();

        // 저장 작업, 단일 태스크
        let saver = {
            let scanner = self.clone();
            tokio::spawn(async move { scanner.save_work(block_height, save_rx, quit_tx, should_done).await })
        };

        // 추출 작업, 토큰 상한까지 병렬
        {
            let scanner = self.clone();
            let block_hash = block_hash.to_string();
            let txids = txids.to_vec();
            tokio::spawn(async move { scanner.extract_work(block_height, block_hash, txids, producer_tx).await });
        }

        // 생산자-소비자 중계는 호출 태스크에서 수행
        extract_runtime(producer_rx, save_tx, quit_rx).await;

        let failed = saver.await?;

        if failed > 0 {
            Err(AppError::Extract(format!(
                "block scanner save work failed on {} of {} transactions",
                failed, should_done
            )))
        } else {
            Ok(())
        }
    }

    /// Spawns one worker per txid, each behind an extraction token. The
    /// token is released on every path when the permit drops.
    async fn extract_work(
        self: Arc<Self>,
        block_height: u64,
        block_hash: String,
        txids: Vec<String>,
        producer: ExtractSender,
    ) {
        for txid in txids {
            let permit = match self.extracting.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let scanner = self.clone();
            let producer = producer.clone();
            let block_hash = block_hash.clone();
            tokio::spawn(async move {
                let result = scanner
                    .extractor
                    .extract(block_height, &block_hash, &txid, &scanner.scan_address)
                    .await;
                let _ = producer.send(result).await;
                drop(permit);
            });
        }
    }

    /// Drains results in arrival order, converts failures into unscanned
    /// records, and raises the quit signal once the whole batch is counted.
    async fn save_work(
        self: Arc<Self>,
        block_height: u64,
        mut results: ExtractReceiver,
        quit_tx: oneshot::Sender<()>,
        should_done: usize,
    ) -> usize {
        let mut done = 0usize;
        let mut failed = 0usize;

        while let Some(result) = results.recv().await {
            if result.success {
                if let Err(e) = self.new_extract_data_notify(block_height, &result.extract_data).await {
                    failed += 1;
                    info!("[Scanner] new extract data notify unexpected error: {}", e);
                }

                if let Err(e) = self.new_extract_data_notify(block_height, &result.extract_contract_data).await {
                    failed += 1;
                    info!("[Scanner] new extract data notify unexpected error: {}", e);
                }
            } else {
                self.save_unscan_record(&UnscanRecord::new(block_height, "", "")).await;
                failed += 1;
            }

            done += 1;
            if done == should_done {
                break;
            }
        }

        let _ = quit_tx.send(());
        failed
    }

    /// Delivers one result's buckets to every observer. A failed delivery is
    /// downgraded to an unscanned record so the block is replayed later.
    async fn new_extract_data_notify(
        &self,
        block_height: u64,
        extract_data: &HashMap<String, ExtractData>,
    ) -> Result<(), AppError> {
        let observers = self.observers.read().await;
        let mut first_error = None;

        for observer in observers.iter() {
            for (source_key, data) in extract_data {
                if let Err(e) = observer.block_extract_data_notify(source_key, data).await {
                    log::error!("[Scanner] BlockExtractDataNotify unexpected error: {}", e);
                    self.save_unscan_record(&UnscanRecord::new(block_height, "", "ExtractData notify failed."))
                        .await;
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// The dispatcher between workers and the saver. Results append to an
/// in-memory tail; the head is offered to the save channel only while the
/// queue is non-empty, which keeps FIFO order without stalling workers on
/// the saver's notification latency.
async fn extract_runtime(mut producer: ExtractReceiver, saver: ExtractSender, mut quit: oneshot::Receiver<()>) {
    let mut values: VecDeque<ExtractResult> = VecDeque::new();
    let mut producing = true;

    loop {
        if values.is_empty() {
            if producing {
                tokio::select! {
                    received = producer.recv() => match received {
                        Some(result) => values.push_back(result),
                        None => producing = false,
                    },
                    _ = &mut quit => return,
                }
            } else {
                // nothing buffered and no workers left, wait out the saver
                let _ = (&mut quit).await;
                return;
            }
        } else if producing {
            tokio::select! {
                received = producer.recv() => match received {
                    Some(result) => values.push_back(result),
                    None => producing = false,
                },
                permit = saver.reserve() => match permit {
                    Ok(permit) => {
                        if let Some(result) = values.pop_front() {
                            permit.send(result);
                        }
                    }
                    Err(_) => return,
                },
                _ = &mut quit => return,
            }
        } else {
            tokio::select! {
                permit = saver.reserve() => match permit {
                    Ok(permit) => {
                        if let Some(result) = values.pop_front() {
                            permit.send(result);
                        }
                    }
                    Err(_) => return,
                },
                _ = &mut quit => return,
            }
        }
    }
}
