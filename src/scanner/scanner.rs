/**
* filename : scanner
* author : HAMA
* date: 2025. 5. 15.
* description: Tip-tracking block scan loop with fork rewind and the
* unscanned-record retry pass.
**/

use log::{error, info, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::chain::gateway::{ChainGateway, RpcServerType};
use crate::chain::model::{AddressBalance, Block, BlockHeader};
use crate::config::ScannerSettings;
use crate::extractor::types::{ExtractData, ExtractResult, ScanAddressFunc};
use crate::extractor::TransactionExtractor;
use crate::notification::observer::BlockScanObserver;
use crate::scanner::mempool::run_mempool_listener;
use crate::store::{StateStore, UnscanRecord};
use crate::types::AppError;

/// 동시 추출 작업 상한
pub const MAX_EXTRACTING_SIZE: usize = 15;

/// Upstream text for transactions the node has no record of. Ledger entries
/// with this reason are purged after one rescan attempt.
pub const NOT_FOUND_REASON_PREFIX: &str = "[-5]No information available about transaction";

pub struct BlockScanner {
    pub(crate) gateway: Arc<dyn ChainGateway>,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) extractor: TransactionExtractor,
    pub(crate) scan_address: ScanAddressFunc,
    pub(crate) observers: RwLock<Vec<Arc<dyn BlockScanObserver>>>,
    pub(crate) scanning: AtomicBool,
    pub(crate) extracting: Arc<Semaphore>,

    rpc_server_type: RpcServerType,
    pub is_scan_mempool: bool,
    pub rescan_last_block_count: u64,
    scan_interval: Duration,

    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BlockScanner {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        store: Arc<dyn StateStore>,
        settings: &ScannerSettings,
        scan_address: ScanAddressFunc,
    ) -> Self {
        Self {
            extractor: TransactionExtractor::new(gateway.clone(), &settings.symbol),
            gateway,
            store,
            scan_address,
            observers: RwLock::new(Vec::new()),
            scanning: AtomicBool::new(false),
            extracting: Arc::new(Semaphore::new(MAX_EXTRACTING_SIZE)),
            rpc_server_type: settings.rpc_server_type,
            is_scan_mempool: settings.is_scan_mempool,
            rescan_last_block_count: settings.rescan_last_block_count,
            scan_interval: Duration::from_secs(settings.interval_secs),
            stop_tx: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Lets the next `scan_block_task` advance. `run` flips this on.
    pub fn resume_scanning(&self) {
        self.scanning.store(true, Ordering::SeqCst);
    }

    /// Short-circuits the scan loop at its next iteration boundary.
    pub fn pause_scanning(&self) {
        self.scanning.store(false, Ordering::SeqCst);
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    pub async fn register_observer(&self, observer: Arc<dyn BlockScanObserver>) {
        self.observers.write().await.push(observer);
    }

    pub async fn clear_observers(&self) {
        self.observers.write().await.clear();
    }

    /// Starts the periodic scan task, and the mempool push listener when the
    /// explorer backend is configured.
    pub async fn run(self: &Arc<Self>) -> Result<(), AppError> {
        let mut stop_slot = self.stop_tx.lock().await;
        if stop_slot.is_some() {
            return Err(AppError::Scan("block scanner is already running".to_string()));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.resume_scanning();

        let mut tasks = self.tasks.lock().await;

        {
            let scanner = self.clone();
            let mut stop = stop_rx.clone();
            tasks.push(tokio::spawn(async move {
                let mut tick = interval(scanner.scan_interval);
                info!("[Scanner] starting with interval {:?}", scanner.scan_interval);
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            scanner.scan_block_task().await;
                        }
                        _ = stop.changed() => {
                            info!("[Scanner] scan task stopped");
                            break;
                        }
                    }
                }
            }));
        }

        if self.rpc_server_type == RpcServerType::Explorer {
            let scanner = self.clone();
            let stop = stop_rx.clone();
            tasks.push(tokio::spawn(async move {
                run_mempool_listener(scanner, stop).await;
            }));
        }

        *stop_slot = Some(stop_tx);
        Ok(())
    }

    /// Stops the scan task and the mempool listener, waiting for both to
    /// unwind. In-flight RPC calls are not interrupted.
    pub async fn stop(&self) {
        self.pause_scanning();

        if let Some(stop_tx) = self.stop_tx.lock().await.take() {
            let _ = stop_tx.send(true);
        }

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
    }

    /// One scan tick: advance from the cursor to the remote tip, handling
    /// forks, then run the tail rescan, the mempool scan and the
    /// failed-record rescan.
    pub async fn scan_block_task(self: &Arc<Self>) {
        let (mut current_height, mut current_hash) = match self.store.get_cursor().await {
            Ok(cursor) => cursor,
            Err(e) => {
                info!("[Scanner] block scanner can not get local block height; unexpected error: {}", e);
                return;
            }
        };

        // 첫 실행이면 원격 최신 높이 - 1 에서 시작
        if current_height == 0 {
            let tip = match self.gateway.get_block_height().await {
                Ok(tip) => tip,
                Err(e) => {
                    info!("[Scanner] block scanner can not get rpc-server block height; unexpected error: {}", e);
                    return;
                }
            };
            if tip == 0 {
                return;
            }

            let init_height = tip - 1;
            let init_hash = match self.gateway.get_block_hash(init_height).await {
                Ok(hash) => hash,
                Err(e) => {
                    info!("[Scanner] block scanner can not get new block hash; unexpected error: {}", e);
                    return;
                }
            };
            if let Err(e) = self.store.put_cursor(init_height, &init_hash).await {
                error!("[Scanner] save init cursor failed. unexpected error: {}", e);
                return;
            }

            info!("[Scanner] initialized scan cursor at height: {}", init_height);
            // scanning starts from the next tick
            return;
        }

        loop {
            if !self.scanning.load(Ordering::SeqCst) {
                // 스캐너가 일시 중지됨, 작업 종료
                return;
            }

            let max_height = match self.gateway.get_block_height().await {
                Ok(height) => height,
                Err(e) => {
                    info!("[Scanner] block scanner can not get rpc-server block height; unexpected error: {}", e);
                    break;
                }
            };

            if current_height >= max_height {
                info!("[Scanner] block scanner has scanned full chain data. Current height: {}", max_height);
                break;
            }

            let target = current_height + 1;
            info!("[Scanner] block scanner scanning height: {} ...", target);

            let hash = match self.gateway.get_block_hash(target).await {
                Ok(hash) => hash,
                Err(e) => {
                    info!("[Scanner] block scanner can not get new block hash; unexpected error: {}", e);
                    self.save_unscan_record(&UnscanRecord::new(target, "", &e.to_string())).await;
                    info!("[Scanner] block height: {} extract failed.", target);
                    continue;
                }
            };

            let block = match self.gateway.get_block(&hash).await {
                Ok(block) => block,
                Err(e) => {
                    info!("[Scanner] block scanner can not get new block data; unexpected error: {}", e);
                    self.save_unscan_record(&UnscanRecord::new(target, "", &e.to_string())).await;
                    info!("[Scanner] block height: {} extract failed.", target);
                    continue;
                }
            };

            if block.previous_block_hash != current_hash {
                // 포크 감지, 커서를 한 칸 되감는다
                info!("[Scanner] block has been fork on height: {}.", target);
                info!("[Scanner] block height: {} local hash = {}", current_height, current_hash);
                info!("[Scanner] block height: {} mainnet hash = {}", current_height, block.previous_block_hash);

                let fork_block = match self.store.get_block_by_height(current_height).await {
                    Ok(local) => Some(local),
                    Err(_) => match self.refetch_block(current_height).await {
                        Ok(remote) => Some(remote),
                        Err(e) => {
                            error!("[Scanner] block scanner can not get fork block; unexpected error: {}", e);
                            None
                        }
                    },
                };

                if let Err(e) = self.store.delete_unscan_by_height(current_height).await {
                    error!("[Scanner] delete unscan records failed. unexpected error: {}", e);
                }

                let new_height = current_height.saturating_sub(1).max(1);
                let prev_block = match self.store.get_block_by_height(new_height).await {
                    Ok(local) => local,
                    Err(_) => match self.refetch_block(new_height).await {
                        Ok(remote) => remote,
                        Err(e) => {
                            error!("[Scanner] block scanner can not get prev block; unexpected error: {}", e);
                            break;
                        }
                    },
                };

                current_height = new_height;
                current_hash = prev_block.hash.clone();
                info!("[Scanner] rescan block on height: {}, hash: {} .", current_height, current_hash);

                if let Err(e) = self.store.put_cursor(current_height, &current_hash).await {
                    error!("[Scanner] save rewound cursor failed. unexpected error: {}", e);
                    break;
                }

                if let Some(fork_block) = fork_block {
                    self.new_block_notify(&fork_block, true).await;
                }
                // 더 깊은 포크는 다음 틱의 재감지로 처리된다
                break;
            }

            // 정상 경로: 추출 결과와 무관하게 커서는 전진한다
            if let Err(e) = self.batch_extract(target, &hash, &block.tx).await {
                info!("[Scanner] block scanner can not extract recharge records; unexpected error: {}", e);
            }

            current_height = target;
            current_hash = hash;

            if let Err(e) = self.store.put_cursor_and_block(current_height, &current_hash, &block).await {
                error!("[Scanner] save new cursor failed. unexpected error: {}", e);
            }

            self.new_block_notify(&block, false).await;
        }

        // 기록 누락 방지를 위한 최근 N개 블록 재스캔
        if self.rescan_last_block_count > 0 {
            let start = if current_height > self.rescan_last_block_count {
                current_height - self.rescan_last_block_count
            } else {
                1
            };
            for height in start..current_height {
                let _ = self.scan_block(height).await;
            }
        }

        if self.is_scan_mempool {
            self.scan_tx_mempool().await;
        }

        self.rescan_failed_record().await;
    }

    /// Scans one block by height without moving the cursor.
    pub async fn scan_block(self: &Arc<Self>, height: u64) -> Result<(), AppError> {
        info!("[Scanner] block scanner scanning height: {} ...", height);

        let hash = match self.gateway.get_block_hash(height).await {
            Ok(hash) => hash,
            Err(e) => {
                info!("[Scanner] block scanner can not get new block hash; unexpected error: {}", e);
                return Err(e);
            }
        };

        let block = match self.gateway.get_block(&hash).await {
            Ok(block) => block,
            Err(e) => {
                info!("[Scanner] block scanner can not get new block data; unexpected error: {}", e);
                self.save_unscan_record(&UnscanRecord::new(height, "", &e.to_string())).await;
                info!("[Scanner] block height: {} extract failed.", height);
                return Err(e);
            }
        };

        if let Err(e) = self.batch_extract(height, &hash, &block.tx).await {
            info!("[Scanner] block scanner can not extract recharge records; unexpected error: {}", e);
        }

        self.new_block_notify(&block, false).await;
        Ok(())
    }

    pub async fn scan_tx_mempool(self: &Arc<Self>) {
        info!("[Scanner] block scanner scanning mempool ...");

        let txids = match self.gateway.get_mempool_tx_ids().await {
            Ok(txids) => txids,
            Err(e) => {
                info!("[Scanner] block scanner can not get mempool data; unexpected error: {}", e);
                return;
            }
        };

        if txids.is_empty() {
            return;
        }

        if let Err(e) = self.batch_extract(0, "", &txids).await {
            info!("[Scanner] block scanner can not extract recharge records; unexpected error: {}", e);
        }
    }

    /// Retry pass over the unscanned ledger. Groups records by height,
    /// re-extracts, deletes the group on success, and finally purges the
    /// "no information available" family.
    pub async fn rescan_failed_record(self: &Arc<Self>) {
        let list = match self.store.list_unscan().await {
            Ok(list) => list,
            Err(e) => {
                info!("[Scanner] block scanner can not get rescan data; unexpected error: {}", e);
                return;
            }
        };

        let mut block_map: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        for record in list {
            let txids = block_map.entry(record.block_height).or_default();
            if !record.txid.is_empty() {
                txids.push(record.txid);
            }
        }

        for (height, mut txids) in block_map {
            if height == 0 {
                // 미확정 트랜잭션은 재스캔하지 않는다
                continue;
            }

            info!("[Scanner] block scanner rescanning height: {} ...", height);

            let mut hash = String::new();
            if txids.is_empty() {
                let block_hash = match self.gateway.get_block_hash(height).await {
                    Ok(block_hash) => block_hash,
                    Err(e) => {
                        info!("[Scanner] block scanner can not get new block hash; unexpected error: {}", e);
                        continue;
                    }
                };
                let block = match self.gateway.get_block(&block_hash).await {
                    Ok(block) => block,
                    Err(e) => {
                        info!("[Scanner] block scanner can not get new block data; unexpected error: {}", e);
                        continue;
                    }
                };
                txids = block.tx;
                hash = block_hash;
            }

            if txids.is_empty() {
                continue;
            }

            if let Err(e) = self.batch_extract(height, &hash, &txids).await {
                info!("[Scanner] block scanner can not extract recharge records; unexpected error: {}", e);
                continue;
            }

            if let Err(e) = self.store.delete_unscan_by_height(height).await {
                error!("[Scanner] delete unscan records on height: {} failed. unexpected error: {}", height, e);
            }
        }

        if let Err(e) = self.store.delete_unscan_by_reason_prefix(NOT_FOUND_REASON_PREFIX).await {
            error!("[Scanner] purge unscan records failed. unexpected error: {}", e);
        }
    }

    /// Moves the cursor so the next tick rescans from `height`. Rejects 0.
    pub async fn set_rescan_block_height(&self, height: u64) -> Result<(), AppError> {
        if height == 0 {
            return Err(AppError::Scan("block height to rescan must be greater than 0".to_string()));
        }

        let height = height - 1;
        let hash = self.gateway.get_block_hash(height).await?;
        self.store.put_cursor(height, &hash).await
    }

    /// Durably scanned height. Readers may observe a slightly stale value.
    pub async fn get_scanned_block_height(&self) -> u64 {
        match self.store.get_cursor().await {
            Ok((height, _)) => height,
            Err(_) => 0,
        }
    }

    /// Ad-hoc extraction of one transaction, bypassing the pipeline. Coin
    /// and token buckets are merged per source key.
    pub async fn extract_transaction_data(
        &self,
        txid: &str,
        scan_address: &ScanAddressFunc,
    ) -> Result<HashMap<String, Vec<ExtractData>>, AppError> {
        let result = self.extractor.extract(0, "", txid, scan_address).await;
        if !result.success {
            return Err(AppError::Extract(format!("extract transaction {} failed", txid)));
        }

        let mut merged: HashMap<String, Vec<ExtractData>> = HashMap::new();
        for (key, data) in result.extract_data {
            merged.entry(key).or_default().push(data);
        }
        for (key, data) in result.extract_contract_data {
            merged.entry(key).or_default().push(data);
        }

        Ok(merged)
    }

    pub async fn get_balance_by_address(&self, addresses: &[String]) -> Result<Vec<AddressBalance>, AppError> {
        self.gateway.get_balance_by_address(addresses).await
    }

    /// Transaction history of the given addresses through the explorer,
    /// projected with every address treated as watched.
    pub async fn get_transactions_by_address(
        &self,
        offset: u32,
        limit: u32,
        addresses: &[String],
    ) -> Result<Vec<ExtractData>, AppError> {
        let trxs = self.gateway.get_transactions_by_address(offset, limit, addresses).await?;

        let key = "account";
        let watched: HashSet<String> = addresses.iter().cloned().collect();
        let scan_address: ScanAddressFunc = Arc::new(move |addr: &str| {
            if watched.contains(addr) {
                Some(key.to_string())
            } else {
                None
            }
        });

        let mut array = Vec::new();
        for mut trx in trxs {
            let mut result = ExtractResult::new(trx.block_height, &trx.txid);
            self.extractor.extract_coin(&mut trx, &mut result, &scan_address).await;
            if let Some(data) = result.extract_data.remove(key) {
                array.push(data);
            }
        }

        Ok(array)
    }

    pub(crate) async fn new_block_notify(&self, block: &Block, is_fork: bool) {
        let mut header: BlockHeader = block.header();
        header.fork = is_fork;

        let observers = self.observers.read().await;
        for observer in observers.iter() {
            if let Err(e) = observer.new_block_notify(&header).await {
                error!("[Scanner] NewBlockNotify unexpected error: {}", e);
            }
        }
    }

    /// Mempool failures (`block_height == 0`) are transient and never
    /// persisted.
    pub(crate) async fn save_unscan_record(&self, record: &UnscanRecord) {
        if record.block_height == 0 {
            warn!("[Scanner] unconfirmed transaction do not rescan");
            return;
        }

        if let Err(e) = self.store.insert_unscan(record).await {
            error!(
                "[Scanner] block height: {}, save unscan record failed. unexpected error: {}",
                record.block_height, e
            );
        }
    }

    async fn refetch_block(&self, height: u64) -> Result<Block, AppError> {
        let hash = self.gateway.get_block_hash(height).await?;
        self.gateway.get_block(&hash).await
    }
}
