use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

pub(crate) const SRID_WGS84: u32 = 4326;

// Point with the EWKB SRID flag set
const EWKB_POINT_WITH_SRID: u32 = 0x2000_0001;

/// A WGS 84 point encoded as PostGIS EWKB: little-endian marker, type word
/// with the SRID flag, SRID 4326, then x/y as f64 little-endian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EwkbPoint {
    x: f64,
    y: f64,
}

impl EwkbPoint {
    /// `x` is the longitude, `y` the latitude.
    pub(crate) fn new(x: f64, y: f64) -> EwkbPoint {
        EwkbPoint { x, y }
    }

    pub(crate) fn write_ewkb<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u8(0x01)?;
        writer.write_u32::<LittleEndian>(EWKB_POINT_WITH_SRID)?;
        writer.write_u32::<LittleEndian>(SRID_WGS84)?;
        writer.write_f64::<LittleEndian>(self.x)?;
        writer.write_f64::<LittleEndian>(self.y)?;
        Ok(())
    }
}
