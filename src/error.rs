//! Error types for terrain transfer, packet coding, configuration and viewer sessions.

use thiserror::Error;

use crate::zone_state::terrain::{Area, LayerType};

/// Failures while copying raw bytes into or out of a layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerrainError {
    /// The input stream ended before the requested area was filled.
    #[error("stream truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    /// The area's byte size overflows; no stream can fill it.
    #[error("area {0:?} is too large to transfer")]
    AreaTooLarge(Area),
    /// A layer type byte that does not name any layer.
    #[error("unknown layer type {0}")]
    UnknownLayer(u8),
    /// The sender's cell size disagrees with the local layer definition.
    #[error("cell size mismatch on {layer:?}: expected {expected}, got {actual}")]
    CellSizeMismatch {
        layer: LayerType,
        expected: usize,
        actual: usize,
    },
}

/// Failures while decoding a layer update or area edit packet.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("packet header truncated: need {needed} bytes, have {available}")]
    TruncatedHeader { needed: usize, available: usize },
    #[error("packet payload truncated: header announces {announced} bytes, have {available}")]
    TruncatedPayload { announced: usize, available: usize },
    #[error("unknown layer type {0}")]
    UnknownLayer(u8),
    #[error("invalid packet area ({x1},{y1})-({x2},{y2})")]
    InvalidArea { x1: i32, y1: i32, x2: i32, y2: i32 },
    #[error("payload decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    #[error("payload holds {actual} bytes but the area needs {expected}")]
    PayloadSize { expected: usize, actual: usize },
    #[error("layer {0:?} is derived and cannot be edited")]
    ReadOnlyLayer(LayerType),
    #[error(transparent)]
    Terrain(#[from] TerrainError),
}

/// Failures while loading zone configuration or plant rules.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Failures reported by a viewer's network session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("viewer session {0} is closed")]
    Closed(u64),
}
