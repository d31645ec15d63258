//! # Packet Module
//!
//! Wire formats for terrain replication. Every integer is little endian.
//!
//! ## Layer update (server → viewer)
//!
//! ```text
//! [layer_type:1][reserved:1][cell_size:1][x1:4][y1:4][x2:4][y2:4][compressed:1][payload_len:4][payload]
//! ```
//!
//! The payload holds the area's cells as raw row-major bytes, or the same bytes as a
//! size-prepended LZ4 block when that is strictly smaller. The `compressed` byte says
//! which one was sent.
//!
//! ## Area edit (viewer → server)
//!
//! The same header without the `compressed` byte; the payload is always raw.

use log::trace;

use crate::{
    error::{PacketError, TerrainError},
    zone_state::terrain::{Area, LayerType, Terrain},
};

const AREA_HEADER_LEN: usize = 3 + 16;

/// Byte cursor over an inbound packet.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], header_len: usize) -> Result<Self, PacketError> {
        if bytes.len() < header_len {
            return Err(PacketError::TruncatedHeader {
                needed: header_len,
                available: bytes.len(),
            });
        }
        Ok(Reader { bytes, offset: 0 })
    }

    fn u8(&mut self) -> u8 {
        let value = self.bytes[self.offset];
        self.offset += 1;
        value
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.word())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.word())
    }

    fn word(&mut self) -> [u8; 4] {
        let mut word = [0; 4];
        word.copy_from_slice(&self.bytes[self.offset..self.offset + 4]);
        self.offset += 4;
        word
    }

    /// Layer, cell size and area, shared by both packet kinds.
    fn area_header(&mut self) -> Result<(LayerType, u8, Area), PacketError> {
        let layer_byte = self.u8();
        let layer = LayerType::from_byte(layer_byte).map_err(|_| PacketError::UnknownLayer(layer_byte))?;
        let _reserved = self.u8();
        let cell_size = self.u8();
        let area = Area::new(self.i32(), self.i32(), self.i32(), self.i32());
        if !area.is_valid() || area.checked_byte_len(cell_size as usize).is_none() {
            return Err(PacketError::InvalidArea {
                x1: area.x1,
                y1: area.y1,
                x2: area.x2,
                y2: area.y2,
            });
        }
        Ok((layer, cell_size, area))
    }

    fn payload(&mut self) -> Result<&'a [u8], PacketError> {
        let announced = self.u32() as usize;
        let available = self.bytes.len() - self.offset;
        if available < announced {
            return Err(PacketError::TruncatedPayload { announced, available });
        }
        Ok(&self.bytes[self.offset..self.offset + announced])
    }
}

fn write_area_header(out: &mut Vec<u8>, layer: LayerType, cell_size: u8, area: Area) {
    out.push(layer as u8);
    out.push(0);
    out.push(cell_size);
    for coordinate in [area.x1, area.y1, area.x2, area.y2] {
        out.extend_from_slice(&coordinate.to_le_bytes());
    }
}

/// Checks `cell_size` against the local definition of `layer`.
fn check_cell_size(terrain: &Terrain, layer: LayerType, cell_size: u8) -> Result<(), TerrainError> {
    let expected = terrain.layer(layer).cell_size();
    if expected != cell_size as usize {
        return Err(TerrainError::CellSizeMismatch {
            layer,
            expected,
            actual: cell_size as usize,
        });
    }
    Ok(())
}

/// Full contents of one layer region, as sent to a viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerUpdatePacket {
    pub layer: LayerType,
    pub cell_size: u8,
    pub area: Area,
    pub compressed: bool,
    pub payload: Vec<u8>,
}

impl LayerUpdatePacket {
    pub const HEADER_LEN: usize = AREA_HEADER_LEN + 1 + 4;

    /// Captures `area` (clamped to the zone) of `layer`.
    pub fn from_layer(terrain: &Terrain, layer: LayerType, area: Area) -> Self {
        let source = terrain.layer(layer);
        let (area, bytes) = source.copy_area_to_bytes(area);
        Self::from_raw(layer, source.cell_size() as u8, area, bytes)
    }

    /// Wraps raw cell bytes, compressing only when it pays off.
    pub fn from_raw(layer: LayerType, cell_size: u8, area: Area, raw: Vec<u8>) -> Self {
        let compressed = lz4_flex::compress_prepend_size(&raw);
        if compressed.len() < raw.len() {
            trace!("{:?} {:?}: compressed {} -> {} bytes", layer, area, raw.len(), compressed.len());
            LayerUpdatePacket {
                layer,
                cell_size,
                area,
                compressed: true,
                payload: compressed,
            }
        } else {
            LayerUpdatePacket {
                layer,
                cell_size,
                area,
                compressed: false,
                payload: raw,
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_LEN + self.payload.len());
        write_area_header(&mut out, self.layer, self.cell_size, self.area);
        out.push(self.compressed as u8);
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut reader = Reader::new(bytes, Self::HEADER_LEN)?;
        let (layer, cell_size, area) = reader.area_header()?;
        let compressed = reader.u8() != 0;
        let payload = reader.payload()?.to_vec();
        Ok(LayerUpdatePacket {
            layer,
            cell_size,
            area,
            compressed,
            payload,
        })
    }

    /// The raw row-major cell bytes, decompressed if needed.
    ///
    /// # Errors
    /// - [`PacketError::Decompress`] for a corrupt LZ4 block
    /// - [`PacketError::PayloadSize`] if the bytes do not fill the area exactly
    pub fn cells(&self) -> Result<Vec<u8>, PacketError> {
        let raw = if self.compressed {
            lz4_flex::decompress_size_prepended(&self.payload)?
        } else {
            self.payload.clone()
        };
        let expected = self
            .area
            .checked_byte_len(self.cell_size as usize)
            .ok_or(PacketError::InvalidArea {
                x1: self.area.x1,
                y1: self.area.y1,
                x2: self.area.x2,
                y2: self.area.y2,
            })?;
        if raw.len() != expected {
            return Err(PacketError::PayloadSize {
                expected,
                actual: raw.len(),
            });
        }
        Ok(raw)
    }

    /// Writes the region into a viewer-side copy of the terrain.
    pub fn apply(&self, terrain: &mut Terrain) -> Result<Area, PacketError> {
        check_cell_size(terrain, self.layer, self.cell_size)?;
        let cells = self.cells()?;
        let layer = terrain
            .layer_mut(self.layer)
            .ok_or(PacketError::ReadOnlyLayer(self.layer))?;
        Ok(layer.copy_from_stream_to_area(self.area, &cells)?)
    }
}

/// A viewer's edit of one layer region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AreaEditPacket {
    pub layer: LayerType,
    pub cell_size: u8,
    pub area: Area,
    pub payload: Vec<u8>,
}

impl AreaEditPacket {
    pub const HEADER_LEN: usize = AREA_HEADER_LEN + 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_LEN + self.payload.len());
        write_area_header(&mut out, self.layer, self.cell_size, self.area);
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut reader = Reader::new(bytes, Self::HEADER_LEN)?;
        let (layer, cell_size, area) = reader.area_header()?;
        let payload = reader.payload()?.to_vec();
        Ok(AreaEditPacket {
            layer,
            cell_size,
            area,
            payload,
        })
    }

    /// Copies the payload into the authoritative layer.
    ///
    /// The area is clamped to the zone like any other stream copy. Slope is derived and
    /// rejects edits.
    pub fn apply(&self, terrain: &mut Terrain) -> Result<Area, PacketError> {
        check_cell_size(terrain, self.layer, self.cell_size)?;
        let layer = terrain
            .layer_mut(self.layer)
            .ok_or(PacketError::ReadOnlyLayer(self.layer))?;
        Ok(layer.copy_from_stream_to_area(self.area, &self.payload)?)
    }
}
