use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Runtime tag for the voxel value types a grid can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridValueType {
    Float,
    Bool,
    Vec3,
}

impl GridValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridValueType::Float => "float",
            GridValueType::Bool => "bool",
            GridValueType::Vec3 => "vec3s",
        }
    }
}

impl fmt::Display for GridValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for f32 {}
    impl Sealed for bool {}
    impl Sealed for glam::Vec3 {}
}

/// A voxel value type. Implemented for `f32`, `bool` and `Vec3` only.
pub trait GridValue:
    sealed::Sealed + Copy + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const VALUE_TYPE: GridValueType;

    fn zero() -> Self;

    fn write_le<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    fn read_le<R: Read>(reader: &mut R) -> io::Result<Self>;
}

impl GridValue for f32 {
    const VALUE_TYPE: GridValueType = GridValueType::Float;

    fn zero() -> Self {
        0.0
    }

    fn write_le<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_f32::<LittleEndian>(*self)
    }

    fn read_le<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_f32::<LittleEndian>()
    }
}

impl GridValue for bool {
    const VALUE_TYPE: GridValueType = GridValueType::Bool;

    fn zero() -> Self {
        false
    }

    fn write_le<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(u8::from(*self))
    }

    fn read_le<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(reader.read_u8()? != 0)
    }
}

impl GridValue for Vec3 {
    const VALUE_TYPE: GridValueType = GridValueType::Vec3;

    fn zero() -> Self {
        Vec3::ZERO
    }

    fn write_le<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_f32::<LittleEndian>(self.x)?;
        writer.write_f32::<LittleEndian>(self.y)?;
        writer.write_f32::<LittleEndian>(self.z)
    }

    fn read_le<R: Read>(reader: &mut R) -> io::Result<Self> {
        let x = reader.read_f32::<LittleEndian>()?;
        let y = reader.read_f32::<LittleEndian>()?;
        let z = reader.read_f32::<LittleEndian>()?;
        Ok(Vec3::new(x, y, z))
    }
}
