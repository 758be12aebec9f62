use crate::error::ClientError;
use crate::protocol::{Inbound, Outbound};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Where the connection supervisor currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the delay before reconnect attempt `attempt`.
    Backoff { attempt: u32 },
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    /// Deadline for each service call.
    pub call_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub ping_interval: Duration,
    /// Buffered messages per subscription; new messages are dropped while
    /// a subscriber's buffer is full.
    pub subscription_buffer: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(5),
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(15),
            ping_interval: Duration::from_secs(10),
            subscription_buffer: 16,
        }
    }
}

enum Command {
    Subscribe {
        topic: String,
        ros_type: String,
        sender: mpsc::Sender<Value>,
        reply: oneshot::Sender<u64>,
    },
    Unsubscribe {
        topic: String,
        sub_id: u64,
    },
    Publish {
        topic: String,
        ros_type: String,
        msg: Value,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    CallService {
        service: String,
        args: Option<Value>,
        reply: oneshot::Sender<Result<Value, ClientError>>,
    },
    Close,
}

/// Handle to the shared rosbridge connection. Clones are cheap and all
/// refer to the same supervisor task and socket.
#[derive(Clone)]
pub struct RosClient {
    url: String,
    options: ClientOptions,
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl RosClient {
    /// Spawn the connection supervisor for `url` and return immediately.
    /// The supervisor keeps reconnecting until [`RosClient::close`] is
    /// called; use [`RosClient::wait_connected`] to block on readiness.
    pub fn connect(url: impl Into<String>, options: ClientOptions) -> Self {
        let url = url.into();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let supervisor = Supervisor {
            url: url.clone(),
            options: options.clone(),
            cmd_rx,
            state_tx,
            subscriptions: HashMap::new(),
            advertised: HashMap::new(),
            pending_calls: HashMap::new(),
            next_sub_id: 0,
        };
        tokio::spawn(supervisor.run());

        Self {
            url,
            options,
            cmd_tx,
            state_rx,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch channel mirroring the connection state, for tasks that want
    /// to react to reconnects.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Wait until the supervisor reports `Connected`.
    pub async fn wait_connected(&self, deadline: Duration) -> Result<(), ClientError> {
        let mut state_rx = self.state_rx.clone();
        let wait = async move {
            loop {
                if *state_rx.borrow() == ConnectionState::Connected {
                    return Ok(());
                }
                if state_rx.changed().await.is_err() {
                    return Err(ClientError::Closed);
                }
            }
        };
        timeout(deadline, wait)
            .await
            .map_err(|_| ClientError::Timeout(deadline))?
    }

    /// Subscribe to `topic`, deserializing each message as `T`. The wire
    /// subscription is shared: any number of local subscriptions to the
    /// same topic produce exactly one rosbridge subscription, and it is
    /// re-established automatically after a reconnect.
    pub async fn subscribe<T: DeserializeOwned>(
        &self,
        topic: &str,
        ros_type: &str,
    ) -> Result<Subscription<T>, ClientError> {
        let (sender, rx) = mpsc::channel(self.options.subscription_buffer);
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe {
                topic: topic.to_string(),
                ros_type: ros_type.to_string(),
                sender,
                reply,
            })
            .map_err(|_| ClientError::Closed)?;
        let sub_id = reply_rx.await.map_err(|_| ClientError::Closed)?;

        Ok(Subscription {
            topic: topic.to_string(),
            sub_id,
            rx,
            cmd_tx: self.cmd_tx.clone(),
            _marker: PhantomData,
        })
    }

    /// Publish one message. The topic is advertised on first use and
    /// re-advertised after reconnects. Fails with `NotConnected` while the
    /// socket is down; nothing is queued.
    pub async fn publish<T: Serialize>(
        &self,
        topic: &str,
        ros_type: &str,
        msg: &T,
    ) -> Result<(), ClientError> {
        let msg = serde_json::to_value(msg).map_err(|e| ClientError::Encode(e.to_string()))?;
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Publish {
                topic: topic.to_string(),
                ros_type: ros_type.to_string(),
                msg,
                reply,
            })
            .map_err(|_| ClientError::Closed)?;
        reply_rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Call a ROS service and return its response values. Calls are
    /// correlated by id, bounded by `call_timeout`, and fail fast when the
    /// connection drops mid-call.
    pub async fn call_service(
        &self,
        service: &str,
        args: Option<Value>,
    ) -> Result<Value, ClientError> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CallService {
                service: service.to_string(),
                args,
                reply,
            })
            .map_err(|_| ClientError::Closed)?;

        let deadline = self.options.call_timeout;
        match timeout(deadline, reply_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => Err(ClientError::Timeout(deadline)),
        }
    }

    /// [`RosClient::call_service`] with the response deserialized into `R`.
    pub async fn call_typed<R: DeserializeOwned>(
        &self,
        service: &str,
        args: Option<Value>,
    ) -> Result<R, ClientError> {
        let values = self.call_service(service, args).await?;
        serde_json::from_value(values).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Shut the connection down. Outstanding calls fail with `Closed`.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close);
    }
}

/// A live topic subscription. Dropping it unsubscribes (the wire
/// subscription goes away with the last local subscriber).
pub struct Subscription<T> {
    topic: String,
    sub_id: u64,
    rx: mpsc::Receiver<Value>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Subscription<T> {
    /// Next message, or `None` once the client shuts down. Messages that
    /// do not deserialize as `T` are logged and skipped so one malformed
    /// publisher cannot kill the feed.
    pub async fn recv(&mut self) -> Option<T> {
        while let Some(value) = self.rx.recv().await {
            match serde_json::from_value(value) {
                Ok(msg) => return Some(msg),
                Err(e) => {
                    warn!("Dropping undecodable message on {}: {}", self.topic, e);
                }
            }
        }
        None
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Unsubscribe {
            topic: self.topic.clone(),
            sub_id: self.sub_id,
        });
    }
}

struct SubEntry {
    ros_type: String,
    subscribers: Vec<(u64, mpsc::Sender<Value>)>,
}

enum SessionEnd {
    /// Socket dropped; supervisor should back off and reconnect.
    Lost,
    /// Close requested; supervisor should exit.
    Closed,
}

struct Supervisor {
    url: String,
    options: ClientOptions,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    subscriptions: HashMap<String, SubEntry>,
    /// topic -> ros type, re-advertised after every reconnect
    advertised: HashMap<String, String>,
    /// call id -> (service, reply)
    pending_calls: HashMap<String, (String, oneshot::Sender<Result<Value, ClientError>>)>,
    next_sub_id: u64,
}

impl Supervisor {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            self.set_state(ConnectionState::Connecting);
            debug!("Connecting to rosbridge at {}", self.url);

            match timeout(self.options.connect_timeout, connect_async(self.url.as_str())).await {
                Ok(Ok((ws, _response))) => {
                    info!("Connected to rosbridge at {}", self.url);
                    attempt = 0;
                    self.set_state(ConnectionState::Connected);
                    match self.serve(ws).await {
                        SessionEnd::Closed => break,
                        SessionEnd::Lost => warn!("Connection to rosbridge lost"),
                    }
                }
                Ok(Err(e)) => {
                    warn!("Failed to connect to {}: {}", self.url, e);
                }
                Err(_) => {
                    warn!("Connecting to {} timed out", self.url);
                }
            }

            self.fail_pending(ClientError::ConnectionLost);
            attempt += 1;
            self.set_state(ConnectionState::Backoff { attempt });
            let delay = backoff_delay(attempt, self.options.backoff_base, self.options.backoff_cap);
            debug!("Reconnect attempt {} in {:?}", attempt, delay);
            if let SessionEnd::Closed = self.idle(delay).await {
                break;
            }
        }

        self.fail_pending(ClientError::Closed);
        self.set_state(ConnectionState::Disconnected);
        info!("rosbridge client shut down");
    }

    /// One connected session. Returns when the socket drops or a close is
    /// requested.
    async fn serve(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        // Restore wire state: one subscribe per live topic, one advertise
        // per published topic
        for (topic, entry) in &self.subscriptions {
            let frame = Outbound::Subscribe {
                id: sub_wire_id(topic),
                topic: topic.clone(),
                ros_type: entry.ros_type.clone(),
            };
            if sink.send(Message::Text(frame.to_json())).await.is_err() {
                return SessionEnd::Lost;
            }
        }
        for (topic, ros_type) in &self.advertised {
            let frame = Outbound::Advertise {
                id: adv_wire_id(topic),
                topic: topic.clone(),
                ros_type: ros_type.clone(),
            };
            if sink.send(Message::Text(frame.to_json())).await.is_err() {
                return SessionEnd::Lost;
            }
        }

        let mut ping = interval(self.options.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The interval fires immediately; skip that first tick
        ping.tick().await;

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { return SessionEnd::Closed };
                    match self.handle_online_command(cmd, &mut sink).await {
                        Ok(false) => {}
                        Ok(true) => return SessionEnd::Closed,
                        Err(()) => return SessionEnd::Lost,
                    }
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.route_inbound(&text),
                        Some(Ok(Message::Ping(payload))) => {
                            if sink.send(Message::Pong(payload)).await.is_err() {
                                return SessionEnd::Lost;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Websocket error: {}", e);
                            return SessionEnd::Lost;
                        }
                    }
                }
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        return SessionEnd::Lost;
                    }
                }
            }
        }
    }

    /// Wait out a backoff delay while still serving registration and
    /// shutdown commands.
    async fn idle(&mut self, delay: Duration) -> SessionEnd {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return SessionEnd::Lost,
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { return SessionEnd::Closed };
                    if self.handle_offline_command(cmd) {
                        return SessionEnd::Closed;
                    }
                }
            }
        }
    }

    /// Returns Ok(true) when a close was requested, Err(()) when the
    /// socket went away mid-write.
    async fn handle_online_command(
        &mut self,
        cmd: Command,
        sink: &mut WsSink,
    ) -> Result<bool, ()> {
        match cmd {
            Command::Subscribe {
                topic,
                ros_type,
                sender,
                reply,
            } => {
                let (sub_id, first) = self.register_subscriber(&topic, &ros_type, sender);
                let _ = reply.send(sub_id);
                if first {
                    let frame = Outbound::Subscribe {
                        id: sub_wire_id(&topic),
                        topic,
                        ros_type,
                    };
                    sink.send(Message::Text(frame.to_json()))
                        .await
                        .map_err(|_| ())?;
                }
                Ok(false)
            }
            Command::Unsubscribe { topic, sub_id } => {
                if self.deregister_subscriber(&topic, sub_id) {
                    let frame = Outbound::Unsubscribe {
                        id: sub_wire_id(&topic),
                        topic,
                    };
                    sink.send(Message::Text(frame.to_json()))
                        .await
                        .map_err(|_| ())?;
                }
                Ok(false)
            }
            Command::Publish {
                topic,
                ros_type,
                msg,
                reply,
            } => {
                if !self.advertised.contains_key(&topic) {
                    let frame = Outbound::Advertise {
                        id: adv_wire_id(&topic),
                        topic: topic.clone(),
                        ros_type: ros_type.clone(),
                    };
                    if sink.send(Message::Text(frame.to_json())).await.is_err() {
                        let _ = reply.send(Err(ClientError::ConnectionLost));
                        return Err(());
                    }
                    self.advertised.insert(topic.clone(), ros_type);
                }
                let frame = Outbound::Publish { topic, msg };
                match sink.send(Message::Text(frame.to_json())).await {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                        Ok(false)
                    }
                    Err(_) => {
                        let _ = reply.send(Err(ClientError::ConnectionLost));
                        Err(())
                    }
                }
            }
            Command::CallService {
                service,
                args,
                reply,
            } => {
                let id = uuid::Uuid::new_v4().to_string();
                let frame = Outbound::CallService {
                    id: id.clone(),
                    service: service.clone(),
                    args,
                };
                match sink.send(Message::Text(frame.to_json())).await {
                    Ok(()) => {
                        self.pending_calls.insert(id, (service, reply));
                        Ok(false)
                    }
                    Err(_) => {
                        let _ = reply.send(Err(ClientError::ConnectionLost));
                        Err(())
                    }
                }
            }
            Command::Close => {
                let _ = sink.send(Message::Close(None)).await;
                Ok(true)
            }
        }
    }

    /// Returns true when a close was requested.
    fn handle_offline_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Subscribe {
                topic,
                ros_type,
                sender,
                reply,
            } => {
                // Registered now, subscribed on the wire at next connect
                let (sub_id, _) = self.register_subscriber(&topic, &ros_type, sender);
                let _ = reply.send(sub_id);
                false
            }
            Command::Unsubscribe { topic, sub_id } => {
                self.deregister_subscriber(&topic, sub_id);
                false
            }
            Command::Publish { reply, .. } => {
                let _ = reply.send(Err(ClientError::NotConnected));
                false
            }
            Command::CallService { reply, .. } => {
                let _ = reply.send(Err(ClientError::NotConnected));
                false
            }
            Command::Close => true,
        }
    }

    fn register_subscriber(
        &mut self,
        topic: &str,
        ros_type: &str,
        sender: mpsc::Sender<Value>,
    ) -> (u64, bool) {
        self.next_sub_id += 1;
        let sub_id = self.next_sub_id;
        let entry = self
            .subscriptions
            .entry(topic.to_string())
            .or_insert_with(|| SubEntry {
                ros_type: ros_type.to_string(),
                subscribers: Vec::new(),
            });
        entry.subscribers.push((sub_id, sender));
        (sub_id, entry.subscribers.len() == 1)
    }

    /// Returns true when the last local subscriber went away.
    fn deregister_subscriber(&mut self, topic: &str, sub_id: u64) -> bool {
        if let Some(entry) = self.subscriptions.get_mut(topic) {
            entry.subscribers.retain(|(id, _)| *id != sub_id);
            if entry.subscribers.is_empty() {
                self.subscriptions.remove(topic);
                return true;
            }
        }
        false
    }

    fn route_inbound(&mut self, text: &str) {
        let Some(frame) = Inbound::parse(text) else {
            return;
        };
        match frame {
            Inbound::Publish { topic, msg } => {
                let Some(entry) = self.subscriptions.get(&topic) else {
                    debug!("Message on {} with no local subscribers", topic);
                    return;
                };
                for (_, sender) in &entry.subscribers {
                    if let Err(mpsc::error::TrySendError::Full(_)) = sender.try_send(msg.clone()) {
                        debug!("Subscriber on {} lagging, dropping message", topic);
                    }
                }
            }
            Inbound::ServiceResponse {
                service,
                id,
                values,
                result,
            } => {
                let pending = id.as_ref().and_then(|id| self.pending_calls.remove(id));
                let Some((_, reply)) = pending else {
                    warn!("Unmatched service response from {}", service);
                    return;
                };
                let outcome = if result {
                    Ok(values.unwrap_or(Value::Null))
                } else {
                    // Failed Trigger-style services put the reason in
                    // `values.message`; others return a bare string
                    let message = values
                        .as_ref()
                        .and_then(|v| v.get("message").and_then(|m| m.as_str()))
                        .map(String::from)
                        .or_else(|| values.as_ref().map(|v| v.to_string()))
                        .unwrap_or_else(|| "service returned failure".to_string());
                    Err(ClientError::ServiceFailure { service, message })
                };
                let _ = reply.send(outcome);
            }
            Inbound::Status { level, msg, id } => match level.as_str() {
                "error" => warn!("rosbridge error status (id {:?}): {}", id, msg),
                "warning" => warn!("rosbridge status: {}", msg),
                _ => debug!("rosbridge status: {}", msg),
            },
        }
    }

    fn fail_pending(&mut self, error: ClientError) {
        for (_, (_service, reply)) in self.pending_calls.drain() {
            let _ = reply.send(Err(error.clone()));
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }
}

fn sub_wire_id(topic: &str) -> String {
    format!("subscribe:{}", topic)
}

fn adv_wire_id(topic: &str) -> String {
    format!("advertise:{}", topic)
}

/// Exponential backoff, capped: base, 2x, 4x ... up to `cap`.
fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(6);
    base.saturating_mul(1u32 << shift).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    fn test_options() -> ClientOptions {
        ClientOptions {
            connect_timeout: Duration::from_secs(1),
            call_timeout: Duration::from_millis(500),
            backoff_base: Duration::from_millis(50),
            backoff_cap: Duration::from_millis(200),
            ping_interval: Duration::from_secs(30),
            subscription_buffer: 16,
        }
    }

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    async fn next_frame(ws: &mut WebSocketStream<TcpStream>) -> Value {
        loop {
            match ws.next().await.expect("socket open").unwrap() {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                Message::Ping(payload) => {
                    ws.send(Message::Pong(payload)).await.unwrap();
                }
                _ => {}
            }
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(500);
        let cap = Duration::from_secs(15);
        assert_eq!(backoff_delay(1, base, cap), Duration::from_millis(500));
        assert_eq!(backoff_delay(2, base, cap), Duration::from_secs(1));
        assert_eq!(backoff_delay(3, base, cap), Duration::from_secs(2));
        assert_eq!(backoff_delay(6, base, cap), Duration::from_secs(15));
        assert_eq!(backoff_delay(60, base, cap), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn subscribe_receives_published_messages() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            let frame = next_frame(&mut ws).await;
            assert_eq!(frame["op"], "subscribe");
            assert_eq!(frame["topic"], "/scan");
            assert_eq!(frame["type"], "sensor_msgs/LaserScan");

            let publish = json!({
                "op": "publish",
                "topic": "/scan",
                "msg": {"ranges": [1.0, 2.0]}
            });
            ws.send(Message::Text(publish.to_string())).await.unwrap();
            // Hold the socket open until the client is done
            let _ = ws.next().await;
        });

        let client = RosClient::connect(&url, test_options());
        client
            .wait_connected(Duration::from_secs(2))
            .await
            .unwrap();
        let mut sub = client
            .subscribe::<Value>("/scan", "sensor_msgs/LaserScan")
            .await
            .unwrap();

        let msg = sub.recv().await.unwrap();
        assert_eq!(msg["ranges"][1], 2.0);

        client.close();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn service_calls_correlate_and_surface_failures() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            for _ in 0..2 {
                let frame = next_frame(&mut ws).await;
                assert_eq!(frame["op"], "call_service");
                let id = frame["id"].as_str().unwrap();
                let response = match frame["service"].as_str().unwrap() {
                    "/start_slam" => json!({
                        "op": "service_response",
                        "service": "/start_slam",
                        "id": id,
                        "values": {"success": true, "message": "mapping"},
                        "result": true
                    }),
                    service => json!({
                        "op": "service_response",
                        "service": service,
                        "id": id,
                        "values": {"message": "no map to save"},
                        "result": false
                    }),
                };
                ws.send(Message::Text(response.to_string())).await.unwrap();
            }
            let _ = ws.next().await;
        });

        let client = RosClient::connect(&url, test_options());
        client
            .wait_connected(Duration::from_secs(2))
            .await
            .unwrap();

        let values = client.call_service("/start_slam", None).await.unwrap();
        assert_eq!(values["success"], true);

        let err = client.call_service("/save_map", None).await.unwrap_err();
        match err {
            ClientError::ServiceFailure { service, message } => {
                assert_eq!(service, "/save_map");
                assert_eq!(message, "no map to save");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        client.close();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn service_call_times_out_without_response() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            let _ = next_frame(&mut ws).await;
            // Never respond
            let _ = ws.next().await;
        });

        let client = RosClient::connect(&url, test_options());
        client
            .wait_connected(Duration::from_secs(2))
            .await
            .unwrap();

        let err = client.call_service("/plan_path", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));

        client.close();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn publish_while_disconnected_is_rejected() {
        // Nothing is listening on this port
        let (listener, url) = bind().await;
        drop(listener);

        let client = RosClient::connect(&url, test_options());
        // Give the first connect attempt time to fail
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = client
            .publish("/cmd_vel", "geometry_msgs/Twist", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        client.close();
    }

    #[tokio::test]
    async fn reconnect_restores_subscriptions() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            // First session: take the subscription, then drop the socket
            let mut ws = accept_ws(&listener).await;
            let frame = next_frame(&mut ws).await;
            assert_eq!(frame["op"], "subscribe");
            drop(ws);

            // Second session: the client must resubscribe on its own
            let mut ws = accept_ws(&listener).await;
            let frame = next_frame(&mut ws).await;
            assert_eq!(frame["op"], "subscribe");
            assert_eq!(frame["topic"], "/joint_states");

            let publish = json!({
                "op": "publish",
                "topic": "/joint_states",
                "msg": {"name": ["joint_1"], "position": [0.5]}
            });
            ws.send(Message::Text(publish.to_string())).await.unwrap();
            let _ = ws.next().await;
        });

        let client = RosClient::connect(&url, test_options());
        let mut sub = client
            .subscribe::<Value>("/joint_states", "sensor_msgs/JointState")
            .await
            .unwrap();

        // The only publish happens in the second session, so receiving it
        // proves the resubscribe worked
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg["position"][0], 0.5);

        client.close();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn first_publish_advertises_topic() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            let advertise = next_frame(&mut ws).await;
            assert_eq!(advertise["op"], "advertise");
            assert_eq!(advertise["topic"], "/cmd_vel");
            assert_eq!(advertise["type"], "geometry_msgs/Twist");

            let publish = next_frame(&mut ws).await;
            assert_eq!(publish["op"], "publish");
            assert_eq!(publish["msg"]["linear"]["x"], 0.5);

            // Second publish must not re-advertise
            let publish = next_frame(&mut ws).await;
            assert_eq!(publish["op"], "publish");
            let _ = ws.next().await;
        });

        let client = RosClient::connect(&url, test_options());
        client
            .wait_connected(Duration::from_secs(2))
            .await
            .unwrap();

        let twist = json!({"linear": {"x": 0.5, "y": 0.0, "z": 0.0}});
        client
            .publish("/cmd_vel", "geometry_msgs/Twist", &twist)
            .await
            .unwrap();
        client
            .publish("/cmd_vel", "geometry_msgs/Twist", &twist)
            .await
            .unwrap();

        client.close();
        server.await.unwrap();
    }
}
