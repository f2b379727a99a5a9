/**
* filename : mempool
* author : HAMA
* date: 2025. 5. 16.
* description:
**/

use log::info;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::watch;

use crate::scanner::scanner::BlockScanner;

/// Consumes pushed mempool txids and feeds them through the extraction
/// pipeline one at a time. The gateway owns the connection and reconnects
/// on its own; this loop only drains and extracts.
pub(crate) async fn run_mempool_listener(scanner: Arc<BlockScanner>, stop_rx: watch::Receiver<bool>) {
    let (txid_tx, mut txid_rx) = mpsc::channel::<String>(64);

    let subscription = {
        let gateway = scanner.gateway.clone();
        let stop = stop_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.subscribe_mempool(txid_tx, stop).await {
                info!("[MempoolListener] mempool subscription unavailable: {}", e);
            }
        })
    };

    let mut stop_rx = stop_rx;
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            received = txid_rx.recv() => match received {
                Some(txid) => {
                    info!("[MempoolListener] new mempool tx: {}", txid);
                    if let Err(e) = scanner.batch_extract(0, "", std::slice::from_ref(&txid)).await {
                        info!("[MempoolListener] block scanner can not extract recharge records; unexpected error: {}", e);
                    }
                }
                None => break,
            }
        }
    }

    let _ = subscription.await;
    info!("[MempoolListener] stopped");
}
