// Archivo: scene.rs
// Propósito: descripción de escena 3-D lista para un renderer (posiciones,
// números atómicos y enlaces planos).
use crate::molfile::{BondOrder, Structure};
use serde::{Deserialize, Serialize};

/// Orden de enlace tal como lo consume el renderer: entero para enlaces
/// simples/dobles/triples, `1.5` para aromáticos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SceneBondOrder {
  Integer(u8),
  Fractional(f64),
}

impl From<BondOrder> for SceneBondOrder {
  fn from(order: BondOrder) -> Self {
    match order {
      BondOrder::Aromatic => Self::Fractional(order.as_f64()),
      other => Self::Integer(other.as_f64() as u8),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAtoms {
  pub positions: Vec<[f64; 3]>,
  pub atomic_numbers: Vec<u8>,
  pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneBonds {
  pub indices: Vec<[usize; 2]>,
  pub orders: Vec<SceneBondOrder>,
  pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
  pub atoms: SceneAtoms,
  pub bonds: SceneBonds,
  pub metadata: SceneMetadata,
}

impl From<&Structure> for SceneDescription {
  fn from(structure: &Structure) -> Self {
    let positions: Vec<[f64; 3]> = structure.atoms.iter().map(|a| a.position).collect();
    let atomic_numbers = structure.atoms.iter().map(|a| a.atomic_number).collect();
    let indices: Vec<[usize; 2]> = structure.bonds.iter().map(|b| [b.begin, b.end]).collect();
    let orders = structure.bonds.iter().map(|b| SceneBondOrder::from(b.order)).collect();
    Self { atoms: SceneAtoms { count: positions.len(), positions, atomic_numbers },
           bonds: SceneBonds { count: indices.len(), indices, orders },
           metadata: SceneMetadata { name: "molecule".to_string() } }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn aromatic_keeps_fraction_and_double_is_integer() {
    let orders = vec![SceneBondOrder::from(BondOrder::Aromatic), SceneBondOrder::from(BondOrder::Double)];
    assert_eq!(serde_json::to_value(&orders).unwrap(), json!([1.5, 2]));
    assert_eq!(SceneBondOrder::from(BondOrder::Query(8)), SceneBondOrder::Integer(0));
  }
}
