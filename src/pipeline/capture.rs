use actix::Addr;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::app::hub::{BroadcastHub, Publish};
use crate::app::models::ClassificationEvent;
use crate::classifier::Classifier;
use crate::pipeline::flow::{FlowKey, FlowSnapshot, FlowTable};
use crate::pipeline::packet;
use crate::pipeline::source::PacketSource;

pub fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Blocking capture loop: normalize, aggregate, flush touched flows on
/// every batch interval. The run flag is polled once per read, reads
/// carry a timeout so a quiet link cannot delay shutdown.
///
/// Drained snapshots cross into the async side through a bounded queue;
/// when it is full the snapshot is dropped on the spot so a slow
/// classify/broadcast stage can never stall packet ingestion.
pub fn capture_loop(
    mut source: Box<dyn PacketSource>,
    run_flag: watch::Receiver<bool>,
    tx: mpsc::Sender<FlowSnapshot>,
    batch_interval: Duration,
) {
    info!("capture loop started");

    let mut table = FlowTable::new();
    let mut touched: HashSet<FlowKey> = HashSet::new();
    let mut last_batch = now_secs();

    loop {
        if !*run_flag.borrow() {
            info!("capture loop: cooperative stop");
            break;
        }

        let frame = match source.recv() {
            Ok(frame) => frame,
            Err(e) => {
                error!("capture read failed, stopping loop: {:?}", e);
                break;
            }
        };

        let now = now_secs();

        if let Some(frame) = frame {
            if let Some(record) = packet::normalize(&frame) {
                let key = table.update(&record, now);
                touched.insert(key);
            }
        }

        if now - last_batch >= batch_interval.as_secs_f64() {
            flush_batch(&mut table, &mut touched, &tx, now);
            last_batch = now;
        }
    }

    info!("capture loop stopped");
}

/// Drain every flow touched since the previous batch. The touched set is
/// cleared regardless of per-flow outcome.
fn flush_batch(
    table: &mut FlowTable,
    touched: &mut HashSet<FlowKey>,
    tx: &mpsc::Sender<FlowSnapshot>,
    now: f64,
) {
    for key in touched.drain() {
        let snapshot = match table.drain(&key, now) {
            Some(s) => s,
            None => continue,
        };

        match tx.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(s)) => {
                warn!(
                    "pipeline queue full, dropping snapshot {} -> {}",
                    s.src_ip, s.dst_ip
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!("pipeline queue closed, discarding snapshot");
            }
        }
    }
}

/// Async half of the pipeline: reduce each snapshot to features, classify
/// it and publish the labeled event. Cancellation is observed both on the
/// run flag and on queue closure, so shutdown never waits on traffic.
pub async fn flush_worker(
    mut rx: mpsc::Receiver<FlowSnapshot>,
    mut run_flag: watch::Receiver<bool>,
    classifier: Arc<Classifier>,
    hub: Addr<BroadcastHub>,
) {
    info!("flush worker started");

    loop {
        tokio::select! {
            changed = run_flag.changed() => {
                if changed.is_err() || !*run_flag.borrow() {
                    break;
                }
            }
            snapshot = rx.recv() => {
                match snapshot {
                    Some(snapshot) => classify_and_publish(snapshot, &classifier, &hub),
                    None => break,
                }
            }
        }
    }

    info!("flush worker stopped");
}

fn classify_and_publish(
    snapshot: FlowSnapshot,
    classifier: &Classifier,
    hub: &Addr<BroadcastHub>,
) {
    let features = snapshot.features();

    match classifier.classify(&features) {
        Ok(label) => {
            debug!(
                "flow {} -> {} classified as {}",
                snapshot.src_ip, snapshot.dst_ip, label
            );
            hub.do_send(Publish(ClassificationEvent {
                fwd: snapshot.fwd_packets,
                bwd: snapshot.bwd_packets,
                label: label.to_owned(),
                src_ip: Some(snapshot.src_ip.to_string()),
                dst_ip: Some(snapshot.dst_ip.to_string()),
                timestamp: snapshot.flushed_at_ms,
            }));
        }
        Err(e) => {
            // transport taxonomy: log and drop, the pipeline keeps going
            error!("classification failed, event dropped: {:?}", e);
        }
    }
}
