// splitter.rs
// Reparte un registro estructural normalizado entre la fila "hot" (escalares
// filtrables) y la fila "cold" (bloque estructural y payloads opacos).
use crate::model::{GeometryCold, GeometryHot, GeometryRecord};
use crate::normalizer::{NormalizedGeometry, TagValue, Tier};

pub fn split_geometry(normalized: NormalizedGeometry) -> GeometryRecord {
  let NormalizedGeometry { dataset_id, cid, molblock, tags } = normalized;
  let mut hot = GeometryHot { dataset_id: dataset_id.clone(), cid, ..Default::default() };
  let mut cold = GeometryCold { dataset_id, cid, molblock, ..Default::default() };
  for (spec, value) in tags {
    match (spec.tier, spec.column, value) {
      (Tier::Hot, "conformer_id", TagValue::Text(v)) => hot.conformer_id = v,
      (Tier::Hot, "mmff94_energy", TagValue::Float(v)) => hot.mmff94_energy = v,
      (Tier::Hot, "conformer_rmsd", TagValue::Float(v)) => hot.conformer_rmsd = v,
      (Tier::Hot, "effective_rotor_count", TagValue::Int(v)) => hot.effective_rotor_count = v,
      (Tier::Hot, "shape_volume", TagValue::Float(v)) => hot.shape_volume = v,
      (Tier::Hot, "shape_selfoverlap", TagValue::Float(v)) => hot.shape_selfoverlap = v,
      (Tier::Hot, "heavy_atom_count", TagValue::Int(v)) => hot.heavy_atom_count = v,
      (Tier::Hot, "component_count", TagValue::Int(v)) => hot.component_count = v,
      (Tier::Cold, "shape_fingerprint", TagValue::Bytes(v)) => cold.shape_fingerprint = v,
      (Tier::Cold, "pharmacophore_features", TagValue::Bytes(v)) => cold.pharmacophore_features = v,
      (Tier::Cold, "mmff94_partial_charges", TagValue::Bytes(v)) => cold.mmff94_partial_charges = v,
      (Tier::Cold, "coordinate_type", TagValue::Bytes(v)) => cold.coordinate_type = v,
      (tier, column, value) => log::warn!("propiedad sin destino: {:?}/{} = {:?}", tier, column, value),
    }
  }
  GeometryRecord::from_split(hot, cold)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::normalizer::GEOMETRY_TAGS;

  #[test]
  fn hot_and_cold_share_key() {
    let tags = GEOMETRY_TAGS.iter()
                            .map(|s| {
                              let v = match s.column {
                                "mmff94_energy" => TagValue::Float(Some(12.5)),
                                "heavy_atom_count" => TagValue::Int(Some(13)),
                                "shape_fingerprint" => TagValue::Bytes(Some(vec![1, 2, 3])),
                                _ => match s.kind {
                                  crate::normalizer::TagKind::Float => TagValue::Float(None),
                                  crate::normalizer::TagKind::Int => TagValue::Int(None),
                                  crate::normalizer::TagKind::Text => TagValue::Text(None),
                                  crate::normalizer::TagKind::Bytes => TagValue::Bytes(None),
                                },
                              };
                              (*s, v)
                            })
                            .collect();
    let g = split_geometry(NormalizedGeometry { dataset_id: "ds".into(), cid: 5, molblock: "x\nM  END\n".into(), tags });
    assert_eq!((g.dataset_id(), g.cid()), ("ds", 5));
    assert_eq!((g.cold().dataset_id.as_str(), g.cold().cid), ("ds", 5));
    assert_eq!(g.hot().mmff94_energy, Some(12.5));
    assert_eq!(g.hot().heavy_atom_count, Some(13));
    assert_eq!(g.hot().shape_volume, None);
    assert_eq!(g.cold().shape_fingerprint, Some(vec![1, 2, 3]));
    assert_eq!(g.cold().coordinate_type, None);
    assert_eq!(g.cold().molblock, "x\nM  END\n");
  }
}
