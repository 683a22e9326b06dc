//! Crate `chem-providers`: frontera con los formatos estructurales.
//!
//! Expone el contrato `StructureEngine` (parsear un bloque MDL molfile,
//! re-serializarlo en forma canónica y convertirlo en una escena 3-D lista
//! para un renderer), la implementación nativa `MolfileEngine` y el lector
//! de archivos SDF que separa cada registro en bloque + propiedades.
//!
//! ```rust
//! use chem_providers::{MolfileEngine, StructureEngine};
//! let engine = MolfileEngine::new();
//! assert!(engine.parse("not a molfile").is_err());
//! ```
mod elements;
mod engine;
mod errors;
mod molfile;
mod scene;
pub mod sdf;

pub use elements::atomic_number;
pub use engine::{MolfileEngine, StructureEngine};
pub use errors::EngineError;
pub use molfile::{Atom, Bond, BondOrder, Structure};
pub use scene::{SceneAtoms, SceneBondOrder, SceneBonds, SceneDescription, SceneMetadata};
pub use sdf::SdfRecord;
