use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use futures::{SinkExt, StreamExt};
use futures::stream::{SplitSink, SplitStream};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task;
use tokio::time::{self, Duration};
use tokio_stream::wrappers::WatchStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_tungstenite::tungstenite::Message;
use crate::bmerror::{BMError, BMResult};
use crate::config::DeviceConfig;
use crate::mirror::PropertyMirror;
use crate::protos::{Envelope, Request, Update};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Called after every inbound message that changed the mirror.
pub type ChangeCallback = Box<dyn Fn(&PropertyMirror) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Discovering,
    Subscribing,
    Live,
    Closed,
    Failed(String),
}

impl ChannelState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Failed(_))
    }
}

/// Inbound work for the consumer task, in arrival order.
#[derive(Debug)]
enum ChannelEvent {
    Message(Envelope),
    Closed,
    Failed(String),
}

/// Live mirror of the device's observable properties.
///
/// On connect the channel asks for the property list, subscribes to every
/// name and from then on applies each inbound message to its mirror. It
/// never reconnects: once the state is terminal the mirror is stale and the
/// caller has to open a new channel.
pub struct EventChannel {
    mirror: Arc<RwLock<PropertyMirror>>,
    state: watch::Receiver<ChannelState>,
    skipped: Arc<AtomicU64>,
    sendkill: broadcast::Sender<()>,
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel").field("state", &*self.state.borrow()).finish()
    }
}

impl EventChannel {
    pub async fn open(cfg: &DeviceConfig) -> BMResult<EventChannel> {
        EventChannel::open_with_callback(cfg, Box::new(|_| ())).await
    }

    pub async fn open_with_callback(cfg: &DeviceConfig, on_change: ChangeCallback) -> BMResult<EventChannel> {
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let addr = cfg.event_address();
        let (socket, _) = connect_async(addr.as_str()).await?;
        info!("Event socket open: {}", addr);
        let (sink, stream) = socket.split();

        let (sendkill, _) = broadcast::channel(1);
        let (send_req, recv_req) = mpsc::unbounded_channel();
        let (send_ev, recv_ev) = mpsc::channel(cfg.event_queue.max(1));
        let mirror = Arc::new(RwLock::new(PropertyMirror::new()));
        let skipped = Arc::new(AtomicU64::new(0));

        send_req.send(Request::ListProperties).map_err(|_x| BMError::AsyncChannelClosed)?;
        state_tx.send_replace(ChannelState::Discovering);

        task::spawn(run_writer(sink, recv_req, sendkill.subscribe()));
        task::spawn(run_reader(stream, send_ev, skipped.clone(), sendkill.subscribe()));
        let consumer = Consumer {
            mirror: mirror.clone(),
            state: state_tx,
            requests: send_req.clone(),
            subscribed: HashSet::new(),
            subscribe_delay: cfg.subscribe_delay,
            on_change,
        };
        task::spawn(consumer.run(recv_ev, sendkill.subscribe()));

        Ok(EventChannel { mirror, state: state_rx, skipped, sendkill })
    }

    pub fn state(&self) -> ChannelState {
        self.state.borrow().clone()
    }

    pub fn state_stream(&self) -> WatchStream<ChannelState> {
        WatchStream::new(self.state.clone())
    }

    /// Waits until the channel reaches `wanted` or a terminal state, and
    /// returns the state it stopped at.
    pub async fn wait_for(&self, wanted: ChannelState) -> ChannelState {
        let mut rx = self.state.clone();
        let result = rx.wait_for(|s| *s == wanted || s.is_terminal()).await;
        match result {
            Ok(s) => (*s).clone(),
            Err(_) => ChannelState::Closed,
        }
    }

    // guard never leaves this type: held across an await it would stall the consumer
    fn read(&self) -> RwLockReadGuard<'_, PropertyMirror> {
        self.mirror.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> PropertyMirror {
        self.read().clone()
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.read().get(name).cloned()
    }

    pub fn available_properties(&self) -> Vec<String> {
        self.read().available_properties().to_vec()
    }

    /// Inbound frames dropped because they were not a valid envelope.
    pub fn skipped_frames(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn close(&self) {
        self.sendkill.send(()).ok();
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_writer(mut sink: SplitSink<Socket, Message>, mut recv_req: mpsc::UnboundedReceiver<Request>,
        mut recvkill: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            _ = recvkill.recv() => {
                sink.close().await.ok();
                break;
            },
            Some(req) = recv_req.recv() => {
                let text = match req.to_text() {
                    Ok(t) => t,
                    Err(e) => { warn!("Dropping request {:?}: {}", req, e); continue; }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!("Event socket write failed: {}", e);
                    break;
                }
            },
            else => break
        }
    }
}

async fn run_reader(mut stream: SplitStream<Socket>, send_ev: mpsc::Sender<ChannelEvent>,
        skipped: Arc<AtomicU64>, mut recvkill: broadcast::Receiver<()>) {
    loop {
        let ev = tokio::select! {
            _ = recvkill.recv() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match Envelope::parse(&text) {
                    Ok(env) => ChannelEvent::Message(env),
                    Err(e) => {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        warn!("Skipping malformed event message: {} ({})", text, e);
                        continue;
                    }
                },
                Some(Ok(Message::Close(_))) | None => ChannelEvent::Closed,
                Some(Ok(_)) => continue, // ping/pong/binary
                Some(Err(e)) => ChannelEvent::Failed(e.to_string()),
            }
        };
        let last = !matches!(ev, ChannelEvent::Message(_));
        if send_ev.send(ev).await.is_err() || last {
            break;
        }
    }
}

struct Consumer {
    mirror: Arc<RwLock<PropertyMirror>>,
    state: watch::Sender<ChannelState>,
    requests: mpsc::UnboundedSender<Request>,
    subscribed: HashSet<String>,
    subscribe_delay: Duration,
    on_change: ChangeCallback,
}

impl Consumer {
    async fn run(mut self, mut recv_ev: mpsc::Receiver<ChannelEvent>, mut recvkill: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = recvkill.recv() => {
                    self.state.send_replace(ChannelState::Closed);
                    break;
                },
                ev = recv_ev.recv() => match ev {
                    Some(ChannelEvent::Message(env)) => self.handle(env).await,
                    Some(ChannelEvent::Failed(reason)) => {
                        warn!("Event socket failed: {}", reason);
                        self.state.send_replace(ChannelState::Failed(reason));
                        break;
                    },
                    Some(ChannelEvent::Closed) | None => {
                        info!("Event socket closed");
                        self.state.send_replace(ChannelState::Closed);
                        break;
                    }
                }
            }
        }
    }

    async fn handle(&mut self, env: Envelope) {
        debug!("Event message received: {:?}", env);
        let updates = env.updates();
        if updates.is_empty() {
            return;
        }
        let mut to_subscribe = None;
        {
            let mut mirror = self.mirror.write().unwrap_or_else(|e| e.into_inner());
            for up in updates {
                if let Update::Discovered(names) = &up {
                    let fresh: Vec<String> = names.iter()
                        .filter(|n| self.subscribed.insert(n.to_string()))
                        .cloned()
                        .collect();
                    to_subscribe.get_or_insert_with(Vec::new).extend(fresh);
                }
                mirror.apply(up);
            }
        }
        {
            let mirror = self.mirror.read().unwrap_or_else(|e| e.into_inner());
            (self.on_change)(&mirror);
        }
        if let Some(names) = to_subscribe {
            self.subscribe(names).await;
        }
    }

    /// One request per name; names already subscribed were filtered out.
    async fn subscribe(&mut self, names: Vec<String>) {
        if names.is_empty() {
            self.state.send_replace(ChannelState::Live);
            return;
        }
        self.state.send_replace(ChannelState::Subscribing);
        // device ignores subscriptions sent right after listProperties
        time::sleep(self.subscribe_delay).await;
        for name in names {
            if self.requests.send(Request::Subscribe(vec![name])).is_err() {
                return;
            }
        }
        self.state.send_replace(ChannelState::Live);
    }
}
