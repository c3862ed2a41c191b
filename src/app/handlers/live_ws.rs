use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::info;
use std::time::{Duration, Instant};

use crate::app::hub::{BroadcastHub, Connect, Disconnect, LiveEvent};
use crate::app::state::State;

/// How often hearbeat ping are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long before lack of client response causes a timeout
const WS_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// One live-stream subscriber session. Registers itself with the
/// broadcast hub on start and deregisters on stop, so a disconnect is
/// observed promptly on the serving side.
#[derive(Debug)]
struct LiveSession {
    /// Client must send a ping/pong within WS_CLIENT_TIMEOUT,
    /// otherwise the connection is dropped
    hb: Instant,

    hub: Addr<BroadcastHub>,

    /// Subscriber id assigned by the hub on registration
    id: Option<usize>,
}

impl LiveSession {
    fn new(hub: Addr<BroadcastHub>) -> Self {
        Self {
            hb: Instant::now(),
            hub,
            id: None,
        }
    }

    /// helper method that sends ping to client every 5 seconds (HEARTBEAT_INTERVAL)
    ///
    /// also this method checks heartbeats from client
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            ctx.ping(b"PING");

            // check client heartbeats
            if Instant::now().duration_since(act.hb) > WS_CLIENT_TIMEOUT {
                info!("Websocket Client heartbeat failed, disconnecting!");
                ctx.stop();
            }
        });
    }
}

impl Actor for LiveSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Started websocket session");
        self.hb(ctx);

        self.hub
            .send(Connect {
                addr: ctx.address().recipient(),
            })
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(id) => act.id = Some(id),
                    // hub gone means nothing to stream from
                    Err(_) => ctx.stop(),
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        if let Some(id) = self.id {
            self.hub.do_send(Disconnect { id });
        }
        Running::Stop
    }
}

impl Handler<LiveEvent> for LiveSession {
    type Result = ();

    fn handle(&mut self, msg: LiveEvent, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.0);
    }
}

/// Client payload is keep-alive only: text and binary refresh the
/// heartbeat and are otherwise ignored, anything else closes the session.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for LiveSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg)
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => ctx.stop(),
        }
    }
}

/// Handler to initialize the live event stream websocket
pub async fn live_traffic(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<State>,
) -> Result<HttpResponse, Error> {
    ws::start(LiveSession::new(state.hub.clone()), &req, stream)
}
