use actix::prelude::*;
use log::{debug, error, info, warn};

use super::models::ClassificationEvent;

/// Payload pushed to one live subscriber, already serialized so the
/// event is encoded once per broadcast.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct LiveEvent(pub String);

#[derive(Message)]
#[rtype(result = "usize")]
pub struct Connect {
    pub addr: Recipient<LiveEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: usize,
}

#[derive(Message, Debug)]
#[rtype(result = "()")]
pub struct Publish(pub ClassificationEvent);

#[derive(Message)]
#[rtype(result = "usize")]
pub struct SessionCount;

/// Fan-out point for classification events. Owns the live subscriber
/// set; delivery is fire-and-forget and at most once per subscriber per
/// event. A failed send evicts the subscriber immediately, there is no
/// retry and no re-delivery.
#[derive(Default)]
pub struct BroadcastHub {
    sessions: Vec<(usize, Recipient<LiveEvent>)>,
    next_id: usize,
}

impl Actor for BroadcastHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("started broadcast hub");
    }
}

impl Handler<Connect> for BroadcastHub {
    type Result = usize;

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.push((id, msg.addr));
        info!("subscriber {} registered, {} live", id, self.sessions.len());
        id
    }
}

impl Handler<Disconnect> for BroadcastHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _ctx: &mut Self::Context) -> Self::Result {
        let before = self.sessions.len();
        self.sessions.retain(|(id, _)| *id != msg.id);
        if self.sessions.len() < before {
            info!("subscriber {} deregistered", msg.id);
        }
    }
}

impl Handler<Publish> for BroadcastHub {
    type Result = ();

    fn handle(&mut self, msg: Publish, _ctx: &mut Self::Context) -> Self::Result {
        let payload = match serde_json::to_string(&msg.0) {
            Ok(payload) => payload,
            Err(e) => {
                error!("failed to serialize classification event: {}", e);
                return;
            }
        };

        debug!("broadcasting to {} subscribers", self.sessions.len());

        // delivery in registration order; a failed send means the
        // subscriber's mailbox is gone, drop it from the live set
        self.sessions.retain(|(id, addr)| {
            match addr.try_send(LiveEvent(payload.clone())) {
                Ok(()) => true,
                Err(_) => {
                    warn!("dropping unreachable subscriber {}", id);
                    false
                }
            }
        });
    }
}

impl Handler<SessionCount> for BroadcastHub {
    type Result = usize;

    fn handle(&mut self, _msg: SessionCount, _ctx: &mut Self::Context) -> Self::Result {
        self.sessions.len()
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{RecordingSink, StopSink};
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn event(label: &str) -> ClassificationEvent {
        ClassificationEvent {
            fwd: 1,
            bwd: 2,
            label: label.to_owned(),
            src_ip: None,
            dst_ip: None,
            timestamp: 1000,
        }
    }

    #[actix_rt::test]
    async fn broadcasts_to_every_live_subscriber() {
        let hub = BroadcastHub::default().start();

        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let first_addr = RecordingSink::new(first.clone()).start();
        let second_addr = RecordingSink::new(second.clone()).start();

        hub.send(Connect {
            addr: first_addr.recipient(),
        })
        .await
        .unwrap();
        hub.send(Connect {
            addr: second_addr.recipient(),
        })
        .await
        .unwrap();

        hub.send(Publish(event("BENIGN"))).await.unwrap();
        actix_rt::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
        assert!(first.lock().unwrap()[0].contains("BENIGN"));
    }

    #[actix_rt::test]
    async fn connect_ids_are_unique_and_increasing() {
        let hub = BroadcastHub::default().start();
        let sink = RecordingSink::new(Arc::new(Mutex::new(Vec::new()))).start();

        let first = hub
            .send(Connect {
                addr: sink.clone().recipient(),
            })
            .await
            .unwrap();
        let second = hub
            .send(Connect {
                addr: sink.recipient(),
            })
            .await
            .unwrap();

        assert!(second > first);
    }

    #[actix_rt::test]
    async fn failed_delivery_evicts_only_the_dead_subscriber() {
        let hub = BroadcastHub::default().start();

        let live = Arc::new(Mutex::new(Vec::new()));
        let live_addr = RecordingSink::new(live.clone()).start();
        let dead_addr = RecordingSink::new(Arc::new(Mutex::new(Vec::new()))).start();

        // dead subscriber registered mid-list
        hub.send(Connect {
            addr: live_addr.clone().recipient(),
        })
        .await
        .unwrap();
        hub.send(Connect {
            addr: dead_addr.clone().recipient(),
        })
        .await
        .unwrap();
        hub.send(Connect {
            addr: live_addr.recipient(),
        })
        .await
        .unwrap();

        dead_addr.send(StopSink).await.unwrap();
        actix_rt::time::sleep(Duration::from_millis(50)).await;

        hub.send(Publish(event("first"))).await.unwrap();
        actix_rt::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(hub.send(SessionCount).await.unwrap(), 2);
        assert_eq!(live.lock().unwrap().len(), 2);

        // remaining subscribers still get later events
        hub.send(Publish(event("second"))).await.unwrap();
        actix_rt::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(live.lock().unwrap().len(), 4);
        assert_eq!(hub.send(SessionCount).await.unwrap(), 2);
    }

    #[actix_rt::test]
    async fn disconnect_of_unknown_id_is_a_noop() {
        let hub = BroadcastHub::default().start();
        let sink = RecordingSink::new(Arc::new(Mutex::new(Vec::new()))).start();

        hub.send(Connect {
            addr: sink.recipient(),
        })
        .await
        .unwrap();

        hub.send(Disconnect { id: 999 }).await.unwrap();

        assert_eq!(hub.send(SessionCount).await.unwrap(), 1);
    }
}
