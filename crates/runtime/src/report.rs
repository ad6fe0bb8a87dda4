/*
 * SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: Apache-2.0
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Tabular output for status reports: an ASCII table on screen or a CSV
//! file for operators to post-process.

use std::path::Path;

use prettytable::{Row, Table};

pub use model::TableRow;

use crate::errors::{RuntimeError, RuntimeResult};

fn make_table<R: TableRow>(headers: &[&str], rows: &[R]) -> Table {
    let mut table = Table::new();
    table.set_titles(Row::from(headers.to_vec()));
    for row in rows {
        table.add_row(Row::from(
            headers.iter().map(|h| row.cell(h)).collect::<Vec<_>>(),
        ));
    }
    table
}

pub fn render_ascii_table<R: TableRow>(headers: &[&str], rows: &[R]) -> String {
    make_table(headers, rows).to_string()
}

pub fn write_csv<R: TableRow>(path: &Path, headers: &[&str], rows: &[R]) -> RuntimeResult<()> {
    let io = |e: csv::Error| RuntimeError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    };
    let mut writer = csv::Writer::from_path(path).map_err(io)?;
    writer.write_record(headers).map_err(io)?;
    for row in rows {
        writer
            .write_record(headers.iter().map(|h| row.cell(h)))
            .map_err(io)?;
    }
    writer.flush().map_err(|source| RuntimeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Sorts by each comma separated key in turn, the last key being the
/// primary one. Returns false, leaving the rows untouched, when a key is
/// not one of the headers.
pub fn sort_rows<R: TableRow>(rows: &mut [R], keys: &str, headers: &[&str]) -> bool {
    let keys: Vec<&str> = keys.split(',').map(str::trim).filter(|k| !k.is_empty()).collect();
    if let Some(unknown) = keys.iter().find(|k| !headers.contains(k)) {
        tracing::warn!(key = %unknown, "cannot sort on unknown column");
        return false;
    }
    for key in keys {
        rows.sort_by_cached_key(|r| r.cell(key));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair(&'static str, &'static str);

    impl TableRow for Pair {
        fn cell(&self, column: &str) -> String {
            match column {
                "Name" => self.0.to_string(),
                "State" => self.1.to_string(),
                _ => String::new(),
            }
        }
    }

    #[test]
    fn test_sort_rows() {
        let mut rows = vec![Pair("b", "ONLINE"), Pair("a", "OFFLINE"), Pair("c", "OFFLINE")];
        assert!(sort_rows(&mut rows, "Name,State", &["Name", "State"]));
        let names: Vec<_> = rows.iter().map(|r| r.0).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
        assert!(!sort_rows(&mut rows, "Uptime", &["Name", "State"]));
    }

    #[test]
    fn test_render_and_csv() {
        let rows = vec![Pair("svc-1", "RUNNING")];
        let text = render_ascii_table(&["Name", "State"], &rows);
        assert!(text.contains("svc-1"));
        assert!(text.contains("State"));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&path, &["Name", "State"], &rows).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Name,State\nsvc-1,RUNNING\n");
    }
}
