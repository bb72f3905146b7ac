//! One WebSocket client: its own universe, pushed at a fixed rate.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info};

use life3d::patterns;
use life3d::prelude::{Size3, Universe3D, UniverseState};

use crate::config::{ConfigError, LifedConfig};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),

    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] life3d::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A universe plus the number of steps taken so far.
#[derive(Debug)]
pub struct Simulation {
    universe: Universe3D,
    generation: u64,
}

impl Simulation {
    pub fn seeded(config: &LifedConfig) -> Result<Self, SessionError> {
        let size = config.size as usize;
        let mut universe = Universe3D::new(Size3::cube(size), config.rule()?)?;
        let pattern = patterns::by_name(&config.pattern)
            .ok_or_else(|| life3d::Error::UnknownPattern(config.pattern.clone()))?;
        let offset = config.seed_offset();
        pattern.load_into(&mut universe, offset, offset, offset);
        Ok(Self {
            universe,
            generation: 0,
        })
    }

    pub fn state(&self) -> UniverseState {
        UniverseState::capture(&self.universe, self.generation)
    }

    pub fn step(&mut self) {
        self.universe.step();
        self.generation += 1;
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// Upgrades `stream`, then pushes the state and steps once per frame until
/// the client leaves.
pub async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<LifedConfig>,
) -> Result<(), SessionError> {
    let path = config.path.clone();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            debug!(%peer, path = request.uri().path(), "rejecting upgrade");
            Err(reject(StatusCode::NOT_FOUND, "not found"))
        }
    };
    let socket = tokio_tungstenite::accept_hdr_async(stream, check_path)
        .await
        .map_err(SessionError::Handshake)?;
    info!(%peer, "client connected");

    let mut simulation = Simulation::seeded(&config)?;
    let (mut outgoing, mut incoming) = socket.split();
    let mut frames = tokio::time::interval(config.frame_period());
    frames.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = frames.tick() => {
                let text = serde_json::to_string(&simulation.state())?;
                outgoing
                    .send(Message::text(text))
                    .await
                    .map_err(SessionError::Send)?;
                simulation.step();
            }
            message = incoming.next() => match message {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Err(e)) => {
                    debug!(%peer, error = %e, "read failed");
                    break;
                }
                // Clients never send application messages.
                Some(Ok(_)) => {}
            },
        }
    }

    info!(%peer, generation = simulation.generation, "client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Error as WsError;

    use super::*;

    async fn start(config: LifedConfig) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = Arc::new(config);
        tokio::spawn(async move {
            loop {
                let (stream, peer) = listener.accept().await.unwrap();
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    let _ = serve(stream, peer, config).await;
                });
            }
        });
        addr
    }

    fn small() -> LifedConfig {
        LifedConfig {
            size: 10,
            fps: 50,
            ..LifedConfig::default()
        }
    }

    #[test]
    fn seeded_universe_has_pattern_near_centre() {
        let sim = Simulation::seeded(&small()).unwrap();
        let state = sim.state();
        assert_eq!(state.generation, 0);
        assert_eq!(state.population, 10);
        assert!(state.cells.iter().all(|c| c.z == 3 || c.z == 4));
    }

    #[tokio::test]
    async fn pushes_state_then_steps() {
        let addr = start(small()).await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();

        let mut generations = Vec::new();
        while generations.len() < 3 {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => {
                    let state: UniverseState = serde_json::from_str(text.as_str()).unwrap();
                    assert_eq!((state.width, state.height, state.depth), (10, 10, 10));
                    assert_eq!(state.population as usize, state.cells.len());
                    generations.push(state.generation);
                }
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert_eq!(generations, vec![0, 1, 2]);
        ws.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let addr = start(small()).await;
        let err = tokio_tungstenite::connect_async(format!("ws://{addr}/other"))
            .await
            .unwrap_err();
        match err {
            WsError::Http(response) => assert_eq!(response.status(), StatusCode::NOT_FOUND),
            other => panic!("expected 404, got {other:?}"),
        }
    }
}
