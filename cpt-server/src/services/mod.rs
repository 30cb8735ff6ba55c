//! Ingestion, reconciliation and narrative services

pub mod completion;
pub mod contract_loader;
pub mod hierarchy;
pub mod narrative;
pub mod presentation;
pub mod reconciliation;
pub mod report_loader;
pub mod spreadsheet;
pub mod workbook;
