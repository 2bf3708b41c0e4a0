pub mod mesh;
pub mod slots;
