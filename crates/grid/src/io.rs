//! Grid container files.
//!
//! Layout: the magic `VXLG`, a little-endian `u32` format version, then a zlib
//! stream holding the grid count followed by each grid: a length-prefixed
//! JSON header, the background value, inactive tiles and leaves (origin,
//! value mask words, 512 values).

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::coord::Coord;
use crate::grid::{AnyGrid, Grid, GridClass};
use crate::leaf::{LeafNode, ValueMask, LEAF_DIM, LEAF_SIZE};
use crate::transform::Transform;
use crate::value::{GridValue, GridValueType};

const MAGIC: &[u8; 4] = b"VXLG";
pub const FORMAT_VERSION: u32 = 1;
const MAX_HEADER_LEN: u32 = 1 << 20;

#[derive(Debug)]
pub enum GridIoError {
    Io(io::Error),
    Format(String),
    Header(serde_json::Error),
}

impl fmt::Display for GridIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridIoError::Io(err) => write!(f, "grid file i/o failed: {err}"),
            GridIoError::Format(msg) => write!(f, "malformed grid file: {msg}"),
            GridIoError::Header(err) => write!(f, "invalid grid header: {err}"),
        }
    }
}

impl std::error::Error for GridIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GridIoError::Io(err) => Some(err),
            GridIoError::Header(err) => Some(err),
            GridIoError::Format(_) => None,
        }
    }
}

impl From<io::Error> for GridIoError {
    fn from(err: io::Error) -> Self {
        GridIoError::Io(err)
    }
}

impl From<serde_json::Error> for GridIoError {
    fn from(err: serde_json::Error) -> Self {
        GridIoError::Header(err)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GridHeader {
    name: String,
    value_type: GridValueType,
    #[serde(default)]
    grid_class: GridClass,
    transform: Transform,
}

pub fn write_grid(path: impl AsRef<Path>, grid: &AnyGrid) -> Result<(), GridIoError> {
    write_grids(path, std::slice::from_ref(grid))
}

pub fn write_grids(path: impl AsRef<Path>, grids: &[AnyGrid]) -> Result<(), GridIoError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_grids_to(&mut writer, grids)?;
    writer.flush()?;
    info!("wrote {} grid(s) to {:?}", grids.len(), path);
    Ok(())
}

pub fn read_grids(path: impl AsRef<Path>) -> Result<Vec<AnyGrid>, GridIoError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let grids = read_grids_from(BufReader::new(file))?;
    info!("read {} grid(s) from {:?}", grids.len(), path);
    Ok(grids)
}

pub fn write_grids_to<W: Write>(mut writer: W, grids: &[AnyGrid]) -> Result<(), GridIoError> {
    writer.write_all(MAGIC)?;
    writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    encoder.write_u32::<LittleEndian>(len_u32(grids.len())?)?;
    for grid in grids {
        match grid {
            AnyGrid::Float(grid) => write_grid_body(&mut encoder, grid)?,
            AnyGrid::Bool(grid) => write_grid_body(&mut encoder, grid)?,
            AnyGrid::Vec3(grid) => write_grid_body(&mut encoder, grid)?,
        }
    }
    encoder.finish()?;
    Ok(())
}

pub fn read_grids_from<R: Read>(mut reader: R) -> Result<Vec<AnyGrid>, GridIoError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(GridIoError::Format("missing VXLG magic".to_string()));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(GridIoError::Format(format!(
            "unsupported format version {version} (expected {FORMAT_VERSION})"
        )));
    }

    let mut decoder = ZlibDecoder::new(reader);
    let count = decoder.read_u32::<LittleEndian>()?;
    let mut grids = Vec::new();
    for _ in 0..count {
        let header = read_header(&mut decoder)?;
        let grid = match header.value_type {
            GridValueType::Float => AnyGrid::Float(read_grid_body(&mut decoder, header)?),
            GridValueType::Bool => AnyGrid::Bool(read_grid_body(&mut decoder, header)?),
            GridValueType::Vec3 => AnyGrid::Vec3(read_grid_body(&mut decoder, header)?),
        };
        grids.push(grid);
    }
    Ok(grids)
}

fn len_u32(len: usize) -> Result<u32, GridIoError> {
    u32::try_from(len).map_err(|_| GridIoError::Format(format!("count {len} exceeds u32")))
}

fn write_coord<W: Write>(writer: &mut W, c: Coord) -> io::Result<()> {
    writer.write_i32::<LittleEndian>(c.x)?;
    writer.write_i32::<LittleEndian>(c.y)?;
    writer.write_i32::<LittleEndian>(c.z)
}

fn read_coord<R: Read>(reader: &mut R) -> Result<Coord, GridIoError> {
    let x = reader.read_i32::<LittleEndian>()?;
    let y = reader.read_i32::<LittleEndian>()?;
    let z = reader.read_i32::<LittleEndian>()?;
    let c = Coord::new(x, y, z);
    let m = LEAF_DIM as i32 - 1;
    if (x | y | z) & m != 0 {
        return Err(GridIoError::Format(format!(
            "node origin {:?} is not leaf aligned",
            c.to_array()
        )));
    }
    Ok(c)
}

fn write_grid_body<T: GridValue, W: Write>(writer: &mut W, grid: &Grid<T>) -> Result<(), GridIoError> {
    let header = GridHeader {
        name: grid.name().to_string(),
        value_type: T::VALUE_TYPE,
        grid_class: grid.grid_class(),
        transform: *grid.transform(),
    };
    let json = serde_json::to_vec(&header)?;
    writer.write_u32::<LittleEndian>(len_u32(json.len())?)?;
    writer.write_all(&json)?;
    grid.background().write_le(writer)?;

    let tiles: Vec<(Coord, T)> = grid.tree().tiles().collect();
    writer.write_u32::<LittleEndian>(len_u32(tiles.len())?)?;
    for (origin, value) in tiles {
        write_coord(writer, origin)?;
        value.write_le(writer)?;
    }

    writer.write_u32::<LittleEndian>(len_u32(grid.leaf_count())?)?;
    for leaf in grid.leaves() {
        write_coord(writer, leaf.origin())?;
        for word in leaf.value_mask().words() {
            writer.write_u64::<LittleEndian>(*word)?;
        }
        for value in leaf.buffer().iter() {
            value.write_le(writer)?;
        }
    }
    Ok(())
}

fn read_header<R: Read>(reader: &mut R) -> Result<GridHeader, GridIoError> {
    let len = reader.read_u32::<LittleEndian>()?;
    if len > MAX_HEADER_LEN {
        return Err(GridIoError::Format(format!("header length {len} too large")));
    }
    let mut json = vec![0u8; len as usize];
    reader.read_exact(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

fn read_grid_body<T: GridValue, R: Read>(reader: &mut R, header: GridHeader) -> Result<Grid<T>, GridIoError> {
    let background = T::read_le(reader)?;
    let mut grid = Grid::new(background)
        .with_name(header.name)
        .with_transform(header.transform)
        .with_grid_class(header.grid_class);

    let tile_count = reader.read_u32::<LittleEndian>()?;
    for _ in 0..tile_count {
        let origin = read_coord(reader)?;
        let value = T::read_le(reader)?;
        grid.set_tile(origin, value);
    }

    let leaf_count = reader.read_u32::<LittleEndian>()?;
    let mut values = [background; LEAF_SIZE];
    for _ in 0..leaf_count {
        let origin = read_coord(reader)?;
        let mut words = [0u64; LEAF_SIZE / 64];
        for word in words.iter_mut() {
            *word = reader.read_u64::<LittleEndian>()?;
        }
        for value in values.iter_mut() {
            *value = T::read_le(reader)?;
        }
        grid.insert_leaf(LeafNode::from_buffer(origin, &values, ValueMask::from_words(words)));
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use glam::{DVec3, Vec3};

    use super::*;
    use crate::grid::{BoolGrid, FloatGrid, Vec3Grid};
    use crate::tools::level_set_sphere;

    #[test]
    fn grids_survive_a_file_round_trip() {
        let sphere = level_set_sphere(1.0, DVec3::new(0.2, -0.1, 0.0), 0.1, 3.0);
        let mut mask = BoolGrid::new(false).with_name("mask");
        mask.set_value_on(Coord::new(-3, 4, 5), true);
        let mut velocity = Vec3Grid::new(Vec3::ZERO)
            .with_transform(Transform::linear(0.5))
            .with_grid_class(GridClass::Staggered);
        velocity.set_value_on(Coord::new(1, 1, 1), Vec3::new(1.0, 2.0, 3.0));

        let grids = vec![
            AnyGrid::Float(sphere),
            AnyGrid::Bool(mask),
            AnyGrid::Vec3(velocity),
        ];
        let mut bytes = Vec::new();
        write_grids_to(&mut bytes, &grids).expect("write");
        let loaded = read_grids_from(bytes.as_slice()).expect("read");
        assert_eq!(loaded, grids);
    }

    #[test]
    fn rejects_foreign_files() {
        let err = read_grids_from(&b"NOPE\x01\x00\x00\x00"[..]).unwrap_err();
        assert!(matches!(err, GridIoError::Format(_)));
    }

    #[test]
    fn writes_and_reads_files_on_disk() {
        let mut grid = FloatGrid::new(2.0).with_name("single");
        grid.set_value_on(Coord::new(0, 0, 0), -1.0);
        let path = std::env::temp_dir().join(format!("voxleaf_io_{}.vxl", std::process::id()));
        write_grid(&path, &AnyGrid::Float(grid.clone())).expect("write");
        let loaded = read_grids(&path).expect("read");
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].as_float(), Some(&grid));
    }
}
