use std::future::Future;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

use super::Connector;
use crate::error::{Result, ViewerError};

/// WebSocket transport. Text and binary frames are both read as UTF-8 JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

fn frame_text(message: Message) -> Option<Result<String>> {
    match message {
        Message::Text(text) => Some(Ok(text.as_str().to_owned())),
        Message::Binary(bytes) => Some(
            String::from_utf8(bytes.to_vec())
                .map_err(|e| ViewerError::Parse(format!("binary frame is not UTF-8: {e}"))),
        ),
        Message::Close(frame) => {
            debug!(?frame, "server sent close frame");
            None
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}

impl Connector for WsConnector {
    type Frames = Pin<Box<dyn Stream<Item = Result<String>>>>;

    fn connect(&mut self, url: &Url) -> impl Future<Output = Result<Self::Frames>> {
        let url = url.to_string();
        async move {
            let (socket, response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| ViewerError::Transport(e.to_string()))?;
            debug!(status = %response.status(), "websocket handshake complete");

            let frames = socket.filter_map(|message| async move {
                match message {
                    Ok(message) => frame_text(message),
                    Err(e) => Some(Err(ViewerError::Transport(e.to_string()))),
                }
            });
            Ok(Box::pin(frames) as Self::Frames)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_map_to_text_or_nothing() {
        assert_eq!(
            frame_text(Message::text("{\"a\":1}")),
            Some(Ok("{\"a\":1}".to_string()))
        );
        assert_eq!(
            frame_text(Message::binary(b"{}".to_vec())),
            Some(Ok("{}".to_string()))
        );
        assert!(matches!(
            frame_text(Message::binary(vec![0xff, 0xfe])),
            Some(Err(ViewerError::Parse(_)))
        ));
        assert_eq!(frame_text(Message::Ping(Vec::new().into())), None);
        assert_eq!(frame_text(Message::Close(None)), None);
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        // Freshly released port: nothing is listening on it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
        let result = WsConnector.connect(&url).await;
        assert!(matches!(result, Err(ViewerError::Transport(_))));
    }
}
