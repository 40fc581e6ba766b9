//! In-memory [`Host`] used by tests and by the CLI when working on a workbook dump.
//!
//! There is no formula evaluator. Writing a formula stores its text only; values
//! change when a recompute hook (installed with [`MemoryHost::on_recompute`]) runs
//! at the barrier.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sheet_model::{CellAddress, CellValue};

use crate::host::{CellRead, Host, HostError, HostOperation};

/// One stored cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCell {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub formula: String,
}

/// A sheet: sparse cells plus visibility and protection state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySheet {
    pub cells: BTreeMap<CellAddress, MemoryCell>,
    pub hidden: bool,
    /// Protection description, when protected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection: Option<String>,
}

impl MemorySheet {
    pub fn value(&self, cell: CellAddress) -> CellValue {
        self.cells
            .get(&cell)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn formula(&self, cell: CellAddress) -> &str {
        self.cells.get(&cell).map(|c| c.formula.as_str()).unwrap_or("")
    }

    /// Set a computed value, keeping any formula (what a recompute does).
    pub fn set_computed(&mut self, cell: CellAddress, value: impl Into<CellValue>) {
        self.cells.entry(cell).or_default().value = value.into();
    }

    /// Set a constant, clearing any formula (what a user edit does).
    pub fn set_value(&mut self, cell: CellAddress, value: impl Into<CellValue>) {
        let value = value.into();
        if value.is_empty() {
            self.cells.remove(&cell);
            return;
        }
        self.cells.insert(
            cell,
            MemoryCell {
                value,
                formula: String::new(),
            },
        );
    }

    pub fn set_formula(&mut self, cell: CellAddress, formula: impl Into<String>) {
        self.cells.entry(cell).or_default().formula = formula.into();
    }
}

/// Named sheets, serializable as a workbook dump.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryWorkbook {
    #[serde(default)]
    pub sheets: BTreeMap<String, MemorySheet>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, name: impl Into<String>) -> &mut MemorySheet {
        self.sheets.entry(name.into()).or_default()
    }

    pub fn sheet(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets.get(name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut MemorySheet> {
        self.sheets.get_mut(name)
    }
}

type RecomputeHook = Box<dyn FnMut(&mut MemoryWorkbook)>;

/// [`Host`] over a [`MemoryWorkbook`].
pub struct MemoryHost {
    workbook: MemoryWorkbook,
    on_recompute: Option<RecomputeHook>,
    failures: RefCell<Vec<(HostOperation, String)>>,
    reads: Cell<usize>,
    writes: usize,
    recomputes: usize,
}

impl MemoryHost {
    pub fn new(workbook: MemoryWorkbook) -> Self {
        Self {
            workbook,
            on_recompute: None,
            failures: RefCell::new(Vec::new()),
            reads: Cell::new(0),
            writes: 0,
            recomputes: 0,
        }
    }

    /// Install the hook run at every recompute barrier.
    pub fn on_recompute(mut self, hook: impl FnMut(&mut MemoryWorkbook) + 'static) -> Self {
        self.on_recompute = Some(Box::new(hook));
        self
    }

    /// Make the next call of `operation` fail with `message`. One-shot.
    pub fn fail_next(&self, operation: HostOperation, message: impl Into<String>) {
        self.failures.borrow_mut().push((operation, message.into()));
    }

    pub fn workbook(&self) -> &MemoryWorkbook {
        &self.workbook
    }

    pub fn workbook_mut(&mut self) -> &mut MemoryWorkbook {
        &mut self.workbook
    }

    pub fn into_workbook(self) -> MemoryWorkbook {
        self.workbook
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// Cell writes plus sheet-level mutations.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn recomputes(&self) -> usize {
        self.recomputes
    }

    fn check(&self, operation: HostOperation) -> Result<(), HostError> {
        let mut failures = self.failures.borrow_mut();
        if let Some(pos) = failures.iter().position(|(op, _)| *op == operation) {
            let (_, message) = failures.remove(pos);
            return Err(HostError::new(operation, message));
        }
        Ok(())
    }

    fn sheet_or_err(
        &self,
        operation: HostOperation,
        name: &str,
    ) -> Result<&MemorySheet, HostError> {
        self.workbook
            .sheet(name)
            .ok_or_else(|| HostError::new(operation, format!("no sheet named '{name}'")))
    }

    fn sheet_mut_or_err(
        &mut self,
        operation: HostOperation,
        name: &str,
    ) -> Result<&mut MemorySheet, HostError> {
        self.workbook
            .sheet_mut(name)
            .ok_or_else(|| HostError::new(operation, format!("no sheet named '{name}'")))
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("sheets", &self.workbook.sheets.len())
            .field("reads", &self.reads.get())
            .field("writes", &self.writes)
            .field("recomputes", &self.recomputes)
            .finish()
    }
}

impl Host for MemoryHost {
    fn sheet_exists(&self, name: &str) -> bool {
        self.workbook.sheets.contains_key(name)
    }

    fn read_cell(&self, sheet: &str, cell: CellAddress) -> Result<CellRead, HostError> {
        self.check(HostOperation::Read)?;
        self.reads.set(self.reads.get() + 1);
        let sheet = self.sheet_or_err(HostOperation::Read, sheet)?;
        Ok(sheet
            .cells
            .get(&cell)
            .map(|c| CellRead {
                value: c.value.clone(),
                formula: c.formula.clone(),
            })
            .unwrap_or_default())
    }

    fn write_formula(
        &mut self,
        sheet: &str,
        cell: CellAddress,
        formula: &str,
    ) -> Result<(), HostError> {
        self.check(HostOperation::WriteFormula)?;
        self.sheet_mut_or_err(HostOperation::WriteFormula, sheet)?
            .set_formula(cell, formula);
        self.writes += 1;
        Ok(())
    }

    fn write_value(
        &mut self,
        sheet: &str,
        cell: CellAddress,
        value: CellValue,
    ) -> Result<(), HostError> {
        self.check(HostOperation::WriteValue)?;
        self.sheet_mut_or_err(HostOperation::WriteValue, sheet)?
            .set_value(cell, value);
        self.writes += 1;
        Ok(())
    }

    fn recompute_and_wait(&mut self) -> Result<(), HostError> {
        self.check(HostOperation::Recompute)?;
        if let Some(hook) = self.on_recompute.as_mut() {
            hook(&mut self.workbook);
        }
        self.recomputes += 1;
        Ok(())
    }

    fn create_sheet(&mut self, name: &str) -> Result<(), HostError> {
        self.check(HostOperation::CreateSheet)?;
        if self.workbook.sheets.contains_key(name) {
            return Err(HostError::new(
                HostOperation::CreateSheet,
                format!("sheet '{name}' already exists"),
            ));
        }
        self.workbook.add_sheet(name);
        self.writes += 1;
        Ok(())
    }

    fn delete_sheet(&mut self, name: &str) -> Result<(), HostError> {
        self.check(HostOperation::DeleteSheet)?;
        if self.workbook.sheets.remove(name).is_none() {
            return Err(HostError::new(
                HostOperation::DeleteSheet,
                format!("no sheet named '{name}'"),
            ));
        }
        self.writes += 1;
        Ok(())
    }

    fn hide_sheet(&mut self, name: &str) -> Result<(), HostError> {
        self.check(HostOperation::HideSheet)?;
        self.sheet_mut_or_err(HostOperation::HideSheet, name)?.hidden = true;
        self.writes += 1;
        Ok(())
    }

    fn show_sheet(&mut self, name: &str) -> Result<(), HostError> {
        self.check(HostOperation::ShowSheet)?;
        self.sheet_mut_or_err(HostOperation::ShowSheet, name)?.hidden = false;
        self.writes += 1;
        Ok(())
    }

    fn is_sheet_hidden(&self, name: &str) -> Result<bool, HostError> {
        Ok(self.sheet_or_err(HostOperation::Read, name)?.hidden)
    }

    fn protect_sheet(&mut self, name: &str, description: &str) -> Result<(), HostError> {
        self.check(HostOperation::ProtectSheet)?;
        self.sheet_mut_or_err(HostOperation::ProtectSheet, name)?.protection =
            Some(description.to_string());
        self.writes += 1;
        Ok(())
    }
}
