use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LevelingError
{
    InvalidGeometry,
    InvalidConfig,
    InvalidIndex,
    DegenerateFit,
    NoBedProbe,
    ProbeFailed,
    MeshNotValid,
    InvalidSlot,
    EmptySlot,
    DimensionMismatch,
    KdTreeError,
    LZ4DecompressionFailed,
    ReadBufferFailed,
    WriteBufferFailed,
    SerializationFailed,
    DeserializationFailed,
    FileIOError,
    ConfigParseFailed,
}
impl std::error::Error for LevelingError {}

impl Display for LevelingError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", *self)
    }
}
