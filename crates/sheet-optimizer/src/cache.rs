//! Lifecycle of the lookup cache sheet that consolidation points the target sheet at.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use sheet_model::Column;

use crate::config::OptimizerConfig;
use crate::error::{missing_sheet, Result};
use crate::host::Host;
use crate::steps::cache_formula;

/// Description attached to the cache sheet's protection.
pub const CACHE_PROTECTION_DESCRIPTION: &str = "Generated lookup cache; do not edit";

/// Result of [`CacheSheetManager::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Rows in the configured data range.
    pub data_rows: u32,
    /// Blank cache cells in the lookup column.
    pub empty_cells: u32,
    /// Target rows with a non-blank lookup key.
    pub filled_source_rows: u32,
}

impl CacheValidation {
    fn invalid(error: String) -> Self {
        Self {
            valid: false,
            errors: vec![error],
            data_rows: 0,
            empty_cells: 0,
            filled_source_rows: 0,
        }
    }
}

/// Create, protect, validate and delete the cache sheet.
pub struct CacheSheetManager<'a, H: ?Sized> {
    host: &'a mut H,
    config: &'a OptimizerConfig,
}

impl<'a, H: Host + ?Sized> CacheSheetManager<'a, H> {
    pub fn new(host: &'a mut H, config: &'a OptimizerConfig) -> Self {
        Self { host, config }
    }

    pub fn exists(&self) -> bool {
        self.host.sheet_exists(&self.config.cache_sheet)
    }

    /// Create the sheet with its lookup formula. An existing sheet is reused as is.
    ///
    /// Returns `true` when the sheet was created.
    pub fn create(&mut self) -> Result<bool> {
        let name = self.config.cache_sheet.as_str();
        if self.host.sheet_exists(name) {
            info!("cache sheet {name} already exists; reusing it");
            return Ok(false);
        }
        self.host.create_sheet(name)?;
        let anchor = Column::A.at(self.config.data_rows.start);
        self.host
            .write_formula(name, anchor, &cache_formula(self.config))?;
        self.host.recompute_and_wait()?;
        info!("cache sheet {name} created with lookup at {anchor}");
        Ok(true)
    }

    /// Hide the sheet and protect it with a warning-only description.
    pub fn protect(&mut self) -> Result<()> {
        let name = self.config.cache_sheet.as_str();
        if !self.host.sheet_exists(name) {
            return Err(missing_sheet(name));
        }
        self.host.hide_sheet(name)?;
        self.host.protect_sheet(name, CACHE_PROTECTION_DESCRIPTION)?;
        info!("cache sheet {name} hidden and protected");
        Ok(())
    }

    /// Delete the sheet, unhiding it first. Returns `false` when there was nothing
    /// to delete.
    pub fn delete(&mut self) -> Result<bool> {
        let name = self.config.cache_sheet.as_str();
        if !self.host.sheet_exists(name) {
            info!("cache sheet {name} does not exist");
            return Ok(false);
        }
        if self.host.is_sheet_hidden(name)? {
            self.host.show_sheet(name)?;
        }
        self.host.delete_sheet(name)?;
        info!("cache sheet {name} deleted");
        Ok(true)
    }

    /// Check the lookup column actually received data.
    ///
    /// Invalid when either sheet is missing or every cache cell over the data rows
    /// is blank.
    pub fn validate(&self) -> Result<CacheValidation> {
        let cache = self.config.cache_sheet.as_str();
        let target = self.config.target_sheet.as_str();
        if !self.host.sheet_exists(cache) {
            return Ok(CacheValidation::invalid(format!(
                "cache sheet '{cache}' does not exist"
            )));
        }
        if !self.host.sheet_exists(target) {
            return Ok(CacheValidation::invalid(format!(
                "target sheet '{target}' does not exist"
            )));
        }

        let rows = self.config.data_rows;
        let cached = self.host.read_column(cache, Column::A, rows)?;
        let keys = self
            .host
            .read_column(target, self.config.consolidation.key_columns.0, rows)?;

        let empty_cells = cached.iter().filter(|v| v.is_blank()).count() as u32;
        let filled_source_rows = keys.iter().filter(|v| !v.is_blank()).count() as u32;

        let mut errors = Vec::new();
        if empty_cells == rows.len() {
            errors.push(
                "every cache cell in column A is blank; the lookup formula may be failing"
                    .to_string(),
            );
        }
        if !errors.is_empty() {
            warn!("cache sheet {cache} failed validation");
        }
        info!(
            "cache check: {} data rows, {empty_cells} blank, {filled_source_rows} keyed source rows",
            rows.len()
        );

        Ok(CacheValidation {
            valid: errors.is_empty(),
            errors,
            data_rows: rows.len(),
            empty_cells,
            filled_source_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryHost, MemoryWorkbook};

    #[test]
    fn missing_cache_sheet_is_invalid_not_an_error() {
        let config = OptimizerConfig::default();
        let mut host = MemoryHost::new(MemoryWorkbook::new());
        let manager = CacheSheetManager::new(&mut host, &config);
        let check = manager.validate().unwrap();
        assert!(!check.valid);
        assert_eq!(check.errors.len(), 1);
    }

    #[test]
    fn protect_requires_the_sheet() {
        let config = OptimizerConfig::default();
        let mut host = MemoryHost::new(MemoryWorkbook::new());
        let err = CacheSheetManager::new(&mut host, &config)
            .protect()
            .unwrap_err();
        assert!(matches!(err, crate::OptimizerError::MissingSheet { .. }));
    }
}
