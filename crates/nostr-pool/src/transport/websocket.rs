// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! WebSocket transport

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_wsocket::{ConnectionMode, Message, WebSocket};
use futures::future;
use futures::stream::SplitSink;
use futures::{Sink, SinkExt, StreamExt};
use nostr_proto::RelayUrl;

use super::error::TransportError;
use super::{BoxSink, BoxStream, BoxedFuture, Transport, WireMessage};

/// Default websocket transport
#[derive(Debug, Clone, Default)]
pub struct DefaultWebsocketTransport {
    mode: ConnectionMode,
}

impl DefaultWebsocketTransport {
    /// New direct websocket transport
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connection mode
    #[inline]
    pub fn connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Transport for DefaultWebsocketTransport {
    fn connect<'a>(
        &'a self,
        url: &'a RelayUrl,
        timeout: Duration,
    ) -> BoxedFuture<'a, Result<(BoxSink, BoxStream), TransportError>> {
        Box::pin(async move {
            // Connect
            let socket: WebSocket = WebSocket::connect(url.as_url(), &self.mode, timeout)
                .await
                .map_err(TransportError::backend)?;

            // Split sink and stream
            let (tx, rx) = socket.split();

            let sink: BoxSink = Box::new(TransportSink(tx)) as BoxSink;
            let stream: BoxStream = Box::new(rx.filter_map(|res| {
                future::ready(match res {
                    Ok(msg) => from_websocket(msg).map(Ok),
                    Err(e) => Some(Err(TransportError::backend(e))),
                })
            })) as BoxStream;

            Ok((sink, stream))
        })
    }
}

/// Ping and pong frames are handled by the websocket backend
fn from_websocket(msg: Message) -> Option<WireMessage> {
    match msg {
        Message::Text(text) => Some(WireMessage::Text(text.to_string())),
        Message::Binary(bytes) => Some(WireMessage::Binary(bytes.to_vec())),
        Message::Close(frame) => Some(WireMessage::Close(
            frame.map(|frame| format!("{} {}", frame.code, frame.reason)),
        )),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn into_websocket(msg: WireMessage) -> Message {
    match msg {
        WireMessage::Text(text) => Message::Text(text),
        WireMessage::Binary(bytes) => Message::Binary(bytes),
        WireMessage::Close(..) => Message::Close(None),
    }
}

struct TransportSink(SplitSink<WebSocket, Message>);

impl Sink<WireMessage> for TransportSink {
    type Error = TransportError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.0)
            .poll_ready_unpin(cx)
            .map_err(TransportError::backend)
    }

    fn start_send(mut self: Pin<&mut Self>, item: WireMessage) -> Result<(), Self::Error> {
        Pin::new(&mut self.0)
            .start_send_unpin(into_websocket(item))
            .map_err(TransportError::backend)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.0)
            .poll_flush_unpin(cx)
            .map_err(TransportError::backend)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.0)
            .poll_close_unpin(cx)
            .map_err(TransportError::backend)
    }
}
