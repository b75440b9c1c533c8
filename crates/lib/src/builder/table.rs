use super::{ChangeError, Transaction};
use crate::doc::{NewValue, Path, RowId, Schema, Value};

/// Mutable access to a table inside a mutation session.
///
/// Adding a row writes a new map under a fresh row id; removing a row
/// deletes that entry. Rows never move, so concurrent additions from
/// different replicas merge without conflicts.
pub struct TableMut<'t> {
    tx: &'t mut Transaction,
    path: Path,
}

impl<'t> TableMut<'t> {
    pub(super) fn new(tx: &'t mut Transaction, path: Path) -> Self {
        Self { tx, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add `row` under a freshly generated id.
    pub fn add<T: Schema>(&mut self, row: &T) -> Result<RowId, ChangeError> {
        self.add_with_id(RowId::random(), row)
    }

    /// Add `row` under the given id, replacing any row already stored there.
    pub fn add_with_id<T: Schema>(&mut self, id: RowId, row: &T) -> Result<RowId, ChangeError> {
        let value = row.encode().map_err(|e| ChangeError::Encoding {
            reason: e.to_string(),
        })?;
        if !matches!(value, NewValue::Map(_)) {
            return Err(ChangeError::TypeMismatch {
                path: self.path.join(&id),
                expected: "map",
                found: value.type_name(),
            });
        }
        self.tx.set(self.path.join(&id), value)?;
        Ok(id)
    }

    /// Overwrite one field of an existing row.
    pub fn set_field(
        &mut self,
        id: &RowId,
        field: &str,
        value: impl Into<NewValue>,
    ) -> Result<(), ChangeError> {
        let row = self.row_path(id)?;
        self.tx.set(row.push(field), value)
    }

    /// Delete the row with the given id.
    pub fn remove_row(&mut self, id: &RowId) -> Result<(), ChangeError> {
        let row = self.row_path(id)?;
        self.tx.delete(row)
    }

    /// Number of rows visible in the session's working copy.
    pub fn count(&self) -> usize {
        match self.tx.get(&self.path) {
            Some(Value::Table(table)) => table.len(),
            _ => 0,
        }
    }

    fn row_path(&self, id: &RowId) -> Result<Path, ChangeError> {
        let path = self.path.join(id);
        match self.tx.get(&path) {
            Some(_) => Ok(path),
            None => Err(ChangeError::StaleReference { path }),
        }
    }
}
