//! Chain-sync feed.
//!
//! Blocks and rollbacks arrive over TCP as length-prefixed bincode frames
//! (little-endian `u32` length, then the encoded event). Events are applied
//! strictly in arrival order; each one is acknowledged with a single status
//! byte after its database transaction commits, so the producer's send
//! window is the index's durability window.

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::db::DbError;
use crate::ledger::{Block, BINCODE_CONFIG};
use crate::reducers::ReducerPipeline;

/// Refuse frames larger than this; a well-formed block never approaches it.
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

pub const ACK: u8 = 0x01;
pub const NACK: u8 = 0x00;

#[derive(bincode::Encode, bincode::Decode, Debug, Clone, PartialEq, Eq)]
pub enum ChainSyncEvent {
    RollForward(Block),
    RollBackward { slot: u64 },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(u32),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Frame an event for the wire.
pub fn encode_frame(event: &ChainSyncEvent) -> Vec<u8> {
    let body =
        bincode::encode_to_vec(event, BINCODE_CONFIG).expect("event encoding is infallible");
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    frame
}

/// Decode a frame body (the bytes after the length prefix).
pub fn decode_event(body: &[u8]) -> Result<ChainSyncEvent, bincode::error::DecodeError> {
    bincode::decode_from_slice(body, BINCODE_CONFIG).map(|(event, _)| event)
}

/// Accept one producer at a time and apply its events until it disconnects.
pub async fn run(listen: &str, pipeline: Arc<ReducerPipeline>) -> Result<(), FeedError> {
    let listener = TcpListener::bind(listen).await?;
    info!(%listen, "chain-sync feed listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "producer connected");
        match serve_connection(stream, &pipeline).await {
            Ok(()) => info!(%peer, "producer disconnected"),
            Err(e) => error!(%peer, error = %e, "feed connection failed"),
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    pipeline: &ReducerPipeline,
) -> Result<(), FeedError> {
    loop {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            // Closing between frames is a normal disconnect.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_buf);
        if len > MAX_FRAME_LEN {
            let _ = stream.write_all(&[NACK]).await;
            return Err(FeedError::FrameTooLarge(len));
        }

        let mut body = vec![0u8; len as usize];
        stream.read_exact(&mut body).await?;

        let result = match decode_event(&body) {
            Ok(event) => apply(pipeline, event).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => stream.write_all(&[ACK]).await?,
            Err(e) => {
                // Leave the index at the last committed event.
                let _ = stream.write_all(&[NACK]).await;
                return Err(e);
            }
        }
    }
}

async fn apply(pipeline: &ReducerPipeline, event: ChainSyncEvent) -> Result<(), FeedError> {
    match event {
        ChainSyncEvent::RollForward(block) => {
            pipeline.roll_forward(&block).await?;
        }
        ChainSyncEvent::RollBackward { slot } => {
            warn!(slot, "rollback requested");
            pipeline.roll_backward(slot).await?;
        }
    }
    Ok(())
}
