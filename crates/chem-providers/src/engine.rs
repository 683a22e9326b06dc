// Archivo: engine.rs
// Propósito: contrato del motor estructural y su implementación nativa.
use crate::errors::EngineError;
use crate::molfile::{parse_block, write_block, Structure};
use crate::scene::SceneDescription;

/// Capacidad estructural que consume el resto del sistema: cualquier librería
/// química puede implementarla. El resto de crates sólo depende de este trait.
pub trait StructureEngine: Send + Sync {
  /// Parsea un único bloque molfile.
  fn parse(&self, block: &str) -> Result<Structure, EngineError>;
  /// Re-serializa la estructura en forma canónica.
  fn serialize(&self, structure: &Structure) -> Result<String, EngineError>;
  /// Convierte la estructura en una escena para el renderer.
  fn to_scene(&self, structure: &Structure) -> SceneDescription;
}

/// Motor nativo para MDL molfile V2000.
#[derive(Debug, Default, Clone, Copy)]
pub struct MolfileEngine;

impl MolfileEngine {
  pub fn new() -> Self {
    Self
  }
}

impl StructureEngine for MolfileEngine {
  fn parse(&self, block: &str) -> Result<Structure, EngineError> {
    parse_block(block)
  }

  fn serialize(&self, structure: &Structure) -> Result<String, EngineError> {
    write_block(structure)
  }

  fn to_scene(&self, structure: &Structure) -> SceneDescription {
    SceneDescription::from(structure)
  }
}
