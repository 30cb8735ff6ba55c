//! Shared fixtures for cpt-server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cpt_common::config::{ContractLayout, TomlConfig, WeeklyLayout};
use cpt_common::time::ReportPeriod;
use cpt_common::{Error, Result};
use cpt_server::services::completion::{CompletionService, FragmentStream, Prompt};
use cpt_server::services::contract_loader::{parse_contract, store_contract};
use cpt_server::services::report_loader::{parse_weekly, store_weekly, WeeklySummary};
use cpt_server::services::spreadsheet::Cell;
use cpt_server::AppState;
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};

pub fn t(s: &str) -> Cell {
    Cell::text(s)
}

pub fn n(v: f64) -> Cell {
    Cell::Number(v)
}

/// Contract sheet: one work item, two groups, three priced tasks
///
/// Stored ids: 1 item, 2 "Phần móng", 3 "Đào đất hố móng", 4 "Bê tông lót",
/// 5 "Phần thân", 6 "Cột".
pub fn contract_rows() -> Vec<Vec<Cell>> {
    vec![
        vec![t("PHỤ LỤC HỢP ĐỒNG")],
        vec![t("STT"), t("Mô tả công việc"), t("Đơn vị tính"), t("Khối lượng")],
        vec![t("I"), t("HẠNG MỤC 1: Nhà điều hành"), Cell::Empty, Cell::Empty],
        vec![t("A"), t("Phần móng"), Cell::Empty, Cell::Empty],
        vec![n(1.0), t("Đào đất hố móng"), t("m3"), n(120.0)],
        vec![n(2.0), t("Bê tông lót"), t("m3"), t("12,5")],
        vec![t("B"), t("Phần thân"), Cell::Empty, Cell::Empty],
        vec![n(3.0), t("Cột"), t("m3"), n(30.0)],
        vec![Cell::Empty, t("Tổng cộng"), Cell::Empty, n(162.5)],
    ]
}

/// Weekly sheet rows as `(name, this week, cumulative, notes)`
pub fn weekly_rows(lines: &[(&str, f64, f64, &str)]) -> Vec<Vec<Cell>> {
    let mut rows = vec![
        vec![t("BÁO CÁO TUẦN")],
        vec![
            t("STT"),
            t("Tên công việc"),
            t("Đơn vị"),
            t("Khối lượng thực hiện trong tuần"),
            t("Lũy kế đến nay"),
            t("Ghi chú"),
        ],
    ];
    for (index, (name, week, cumulative, notes)) in lines.iter().enumerate() {
        rows.push(vec![
            n((index + 1) as f64),
            t(name),
            t("m3"),
            n(*week),
            n(*cumulative),
            t(notes),
        ]);
    }
    rows
}

pub async fn seed_contract(pool: &SqlitePool) -> Vec<i64> {
    let parsed = parse_contract(&contract_rows(), &ContractLayout::default()).unwrap();
    store_contract(pool, &parsed.tree).await.unwrap()
}

pub async fn seed_weekly(
    pool: &SqlitePool,
    start: &str,
    end: &str,
    lines: &[(&str, f64, f64, &str)],
) -> WeeklySummary {
    let period = ReportPeriod::from_fields(Some(start), Some(end)).unwrap();
    let parsed = parse_weekly(&weekly_rows(lines), &WeeklyLayout::default()).unwrap();
    store_weekly(pool, &period, &parsed).await.unwrap()
}

/// Encode rows as an xlsx workbook
///
/// The named sheet follows a summary sheet so sheet selection is exercised.
/// `origin` is the zero-based (row, column) of the first cell written.
pub fn xlsx_bytes(sheet_name: &str, rows: &[Vec<Cell>], origin: (u32, u16)) -> Vec<u8> {
    let mut book = rust_xlsxwriter::Workbook::new();
    book.add_worksheet()
        .set_name("Tổng hợp")
        .unwrap()
        .write_string(0, 0, "Tổng hợp khối lượng")
        .unwrap();

    let sheet = book.add_worksheet();
    sheet.set_name(sheet_name).unwrap();
    let (top, left) = origin;
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = (top + r as u32, left + c as u16);
            match cell {
                Cell::Text(s) if s.is_empty() => {}
                Cell::Text(s) => {
                    sheet.write_string(r, c, s.as_str()).unwrap();
                }
                Cell::Number(v) => {
                    sheet.write_number(r, c, *v).unwrap();
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, *b).unwrap();
                }
                Cell::Empty => {}
            }
        }
    }
    book.save_to_buffer().unwrap()
}

/// Fixture contract as an upload-ready workbook
pub fn contract_xlsx() -> Vec<u8> {
    xlsx_bytes("Mẫu số 11C", &contract_rows(), (0, 0))
}

/// Weekly sheet as an upload-ready workbook
pub fn weekly_xlsx(lines: &[(&str, f64, f64, &str)]) -> Vec<u8> {
    xlsx_bytes("BC Tuần 24", &weekly_rows(lines), (0, 0))
}

/// Two consecutive weeks against the fixture contract
pub async fn seed_two_weeks(pool: &SqlitePool) {
    seed_contract(pool).await;
    seed_weekly(
        pool,
        "2024-06-03",
        "2024-06-09",
        &[("Đào đất hố móng", 60.0, 60.0, ""), ("Bê tông lót", 12.5, 12.5, "")],
    )
    .await;
    seed_weekly(
        pool,
        "2024-06-10",
        "2024-06-16",
        &[
            ("Đào đất hố móng", 50.0, 110.0, "đạt"),
            ("Bê tông lót", 0.0, 12.5, ""),
            ("Cột", 5.0, 5.0, "thiếu nhân công"),
        ],
    )
    .await;
}

/// Scripted completion service
pub struct FakeCompletion {
    pub fragments: Vec<std::result::Result<String, String>>,
    pub fail_upfront: bool,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl FakeCompletion {
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| Ok(f.to_string())).collect(),
            fail_upfront: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fragments: Vec::new(),
            fail_upfront: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn breaking_after(fragments: &[&str]) -> Self {
        let mut scripted: Vec<_> = fragments.iter().map(|f| Ok(f.to_string())).collect();
        scripted.push(Err("connection reset".to_string()));
        Self {
            fragments: scripted,
            fail_upfront: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if self.fail_upfront {
            return Err(Error::Upstream("service unreachable".to_string()));
        }
        let mut text = String::new();
        for fragment in &self.fragments {
            match fragment {
                Ok(f) => text.push_str(f),
                Err(e) => return Err(Error::Upstream(e.clone())),
            }
        }
        Ok(text)
    }

    async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if self.fail_upfront {
            return Err(Error::Upstream("service unreachable".to_string()));
        }
        let items: Vec<Result<String>> = self
            .fragments
            .iter()
            .map(|f| f.clone().map_err(Error::Upstream))
            .collect();
        Ok(stream::iter(items).boxed())
    }
}

pub async fn test_state(completion: Arc<FakeCompletion>) -> AppState {
    let pool = cpt_common::db::init_memory_database().await.unwrap();
    AppState::new(pool, &TomlConfig::default(), completion)
}
