//! Bulk spreadsheet import

pub mod epp;
pub mod sheet;

pub use epp::{
    map_headers, normalize_header, plan_import, ColumnMap, EquipmentRef, ImportPlan, ImportReport,
    NewEppRecord, RowError,
};
pub use sheet::{read_sheet, Sheet, SheetFormat, SheetRow};
