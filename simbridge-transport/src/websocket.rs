//! rosbridge over WebSocket, one BSON document per binary message.

use bson::Document;
use futures_util::{SinkExt, StreamExt};
use simbridge_sdk::{Endpoint, TransportError};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::framing::encode_frame;
use crate::link::{Link, LinkTasks};

pub(crate) fn url(endpoint: &Endpoint) -> String {
    format!("ws://{}:{}", endpoint.host, endpoint.port)
}

/// Connect and spawn the writer and reader tasks.
pub(crate) async fn open(endpoint: &Endpoint, link: Link) -> Result<LinkTasks, TransportError> {
    let url = url(endpoint);
    let (ws, _) = connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::ConnectionUnavailable(format!("{url}: {e}")))?;
    let (mut sink, mut stream) = ws.split();
    debug!(url = %url, "WebSocket link open");

    let Link {
        mut outgoing,
        replies,
        dispatcher,
    } = link;

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outgoing.recv().await {
            let bytes = match encode_frame(&frame) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "Dropping unencodable frame");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Binary(bytes.into())).await {
                warn!(error = %e, "Failed to send frame");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Binary(bytes)) => match Document::from_reader(&bytes[..]) {
                    Ok(frame) => dispatcher.dispatch(frame, &replies),
                    Err(e) => warn!(error = %e, "Ignoring invalid BSON frame"),
                },
                Ok(Message::Text(_)) => debug!("Ignoring text frame in BSON mode"),
                Ok(Message::Close(_)) => {
                    info!("Bridge closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    Ok(LinkTasks {
        writer: writer_task,
        reader: reader_task,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bson::doc;
    use simbridge_sdk::Transport;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{RosbridgeTransport, TransportConfig};

    #[test]
    fn url_from_endpoint() {
        assert_eq!(url(&Endpoint::new("ws", "localhost", 9090)), "ws://localhost:9090");
    }

    #[tokio::test]
    async fn binary_frames_both_ways() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = Endpoint::new("ws", "127.0.0.1", port);

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let subscribe = match ws.next().await.unwrap().unwrap() {
                Message::Binary(bytes) => Document::from_reader(&bytes[..]).unwrap(),
                other => panic!("unexpected {other:?}"),
            };
            assert_eq!(subscribe.get_str("op").unwrap(), "subscribe");

            let publish = doc! { "op": "publish", "topic": "/clock", "msg": { "clock": { "secs": 3, "nsecs": 0 } } };
            let bytes = encode_frame(&publish).unwrap();
            ws.send(Message::Binary(bytes.into())).await.unwrap();
            ws
        });

        let transport = RosbridgeTransport::new(TransportConfig::default());
        transport.connect(&endpoint).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        transport
            .subscribe(
                "/clock",
                "rosgraph_msgs/Clock",
                3,
                Arc::new(move |msg| {
                    let _ = tx.send(msg);
                }),
            )
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg, doc! { "clock": { "secs": 3, "nsecs": 0 } });
        assert!(transport.is_healthy().await);
        drop(server.await.unwrap());
    }
}
