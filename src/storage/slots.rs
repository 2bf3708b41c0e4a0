use std::io::Write;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::LevelingError;
use crate::serialization::SerializationFormat;
use super::mesh::{Mesh, UNDEFINED};

///
/// Persisted form of a mesh: dimensions plus heights in scan order (`xi`
/// outer), undefined points as `None` so every format can carry them.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshRecord
{
    pub x_points: usize,
    pub y_points: usize,
    pub z: Vec<Option<f32>>,
}

impl<const NX: usize, const NY: usize> From<&Mesh<NX, NY>> for MeshRecord
{
    fn from(mesh: &Mesh<NX, NY>) -> Self {
        Self {
            x_points: NX,
            y_points: NY,
            z: mesh.iter().map(|(_, _, z)| if z.is_nan() { None } else { Some(z) }).collect(),
        }
    }
}

impl<const NX: usize, const NY: usize> TryFrom<MeshRecord> for Mesh<NX, NY>
{
    type Error = LevelingError;

    fn try_from(record: MeshRecord) -> Result<Self, Self::Error> {
        if record.x_points != NX || record.y_points != NY || record.z.len() != NX * NY
        {
            return Err(LevelingError::DimensionMismatch);
        }
        let mut mesh = Mesh::new();
        for ((_, _, z), stored) in mesh.iter_mut().zip(record.z)
        {
            *z = stored.unwrap_or(UNDEFINED);
        }
        Ok(mesh)
    }
}

impl<const NX: usize, const NY: usize> Mesh<NX, NY>
{
    ///
    /// Encode the mesh with the specified serialization format.
    ///
    pub fn write_buffer(&self, format: SerializationFormat) -> Result<Vec<u8>, LevelingError>
    {
        format.encode(&MeshRecord::from(self))
    }

    pub fn read_buffer(buffer: &[u8], format: SerializationFormat) -> Result<Self, LevelingError>
    {
        Self::try_from(format.decode::<MeshRecord>(buffer)?)
    }

    /// Write mesh to path
    pub fn write<P: AsRef<Path>>(&self, path: P, format: SerializationFormat) -> Result<(), LevelingError>
    {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(|_| LevelingError::FileIOError)?);
        let buffer = self.write_buffer(format)?;
        file.write_all(&buffer).map_err(|_| LevelingError::WriteBufferFailed)?;
        file.flush().map_err(|_| LevelingError::WriteBufferFailed)?;
        Ok(())
    }

    pub fn read<Reader: std::io::Read>(mut reader: Reader, format: SerializationFormat) -> Result<Self, LevelingError>
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|_| LevelingError::ReadBufferFailed)?;
        Self::read_buffer(&bytes, format)
    }

    /// Read a mesh file, choosing the format from its extension.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self, LevelingError>
    {
        let path = path.as_ref();
        let format = SerializationFormat::from_path(path).ok_or(LevelingError::FileIOError)?;
        Self::read(std::fs::File::open(path).map_err(|_| LevelingError::FileIOError)?, format)
    }
}

///
/// Fixed number of numbered mesh slots standing in for the printer's
/// non-volatile storage. Slots hold encoded bytes, as the medium would.
///
#[derive(Clone, Debug)]
pub struct MeshSlots
{
    capacity: u16,
    format: SerializationFormat,
    slots: FxHashMap<u16, Vec<u8>>,
}

impl MeshSlots
{
    pub fn new(capacity: u16) -> Self
    {
        Self::with_format(capacity, SerializationFormat::default())
    }

    pub fn with_format(capacity: u16, format: SerializationFormat) -> Self
    {
        Self { capacity, format, slots: FxHashMap::default() }
    }

    pub fn capacity(&self) -> u16
    {
        self.capacity
    }

    fn check_slot(&self, slot: u16) -> Result<(), LevelingError>
    {
        if slot < self.capacity { Ok(()) } else { Err(LevelingError::InvalidSlot) }
    }

    pub fn store<const NX: usize, const NY: usize>(&mut self, slot: u16, mesh: &Mesh<NX, NY>) -> Result<(), LevelingError>
    {
        self.check_slot(slot)?;
        let bytes = mesh.write_buffer(self.format)?;
        self.slots.insert(slot, bytes);
        Ok(())
    }

    pub fn load<const NX: usize, const NY: usize>(&self, slot: u16) -> Result<Mesh<NX, NY>, LevelingError>
    {
        self.check_slot(slot)?;
        let bytes = self.slots.get(&slot).ok_or(LevelingError::EmptySlot)?;
        Mesh::read_buffer(bytes, self.format)
    }

    pub fn is_occupied(&self, slot: u16) -> bool
    {
        self.slots.contains_key(&slot)
    }

    /// Occupied slot numbers in ascending order.
    pub fn occupied(&self) -> Vec<u16>
    {
        let mut slots: Vec<u16> = self.slots.keys().copied().collect();
        slots.sort_unstable();
        slots
    }

    pub fn clear(&mut self, slot: u16) -> Result<(), LevelingError>
    {
        self.check_slot(slot)?;
        self.slots.remove(&slot);
        Ok(())
    }
}
