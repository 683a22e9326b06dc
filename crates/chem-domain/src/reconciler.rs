// reconciler.rs
// Conjunto de identificadores válidos de un dataset. Las geometrías sólo se
// admiten si su cid ya fue cargado desde el manifiesto.
use crate::model::MoleculeRecord;
use crate::DomainError;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct IdentifierReconciler {
  valid: HashSet<i64>,
  admitted: usize,
  rejected: usize,
}

impl IdentifierReconciler {
  pub fn new(valid: HashSet<i64>) -> Self {
    Self { valid, admitted: 0, rejected: 0 }
  }

  /// Etapa del manifiesto: no filtra nada, sólo establece el conjunto.
  pub fn from_records(records: &[MoleculeRecord]) -> Self {
    Self::new(records.iter().map(|r| r.cid).collect())
  }

  pub fn known_ids(&self) -> usize {
    self.valid.len()
  }

  pub fn contains(&self, cid: i64) -> bool {
    self.valid.contains(&cid)
  }

  /// Admite o rechaza un identificador, llevando la cuenta de ambos casos.
  pub fn admit(&mut self, cid: i64) -> Result<(), DomainError> {
    if self.valid.contains(&cid) {
      self.admitted += 1;
      Ok(())
    } else {
      self.rejected += 1;
      Err(DomainError::ReferentialViolation(format!("cid {}", cid)))
    }
  }

  pub fn admitted(&self) -> usize {
    self.admitted
  }

  pub fn rejected(&self) -> usize {
    self.rejected
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_identifier_is_counted_not_admitted() {
    let mut r = IdentifierReconciler::new([1, 2, 3].into_iter().collect());
    assert!(r.admit(2).is_ok());
    assert!(matches!(r.admit(12345), Err(DomainError::ReferentialViolation(_))));
    assert_eq!((r.admitted(), r.rejected()), (1, 1));
  }

  #[test]
  fn empty_manifest_rejects_everything() {
    let mut r = IdentifierReconciler::default();
    assert!(r.admit(12345).is_err());
    assert_eq!(r.rejected(), 1);
  }

  #[test]
  fn manifest_stage_collects_distinct_ids() {
    let records = vec![MoleculeRecord::new("ds", 1), MoleculeRecord::new("ds", 1), MoleculeRecord::new("ds", 9)];
    let r = IdentifierReconciler::from_records(&records);
    assert_eq!(r.known_ids(), 2);
    assert!(r.contains(9));
  }
}
