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

//! Rendering of report rows: an ASCII table by default, JSON or YAML on
//! request, optionally also exported to a CSV file.

use std::path::Path;

use clap::ValueEnum;
use runtime::report::{TableRow, render_ascii_table, write_csv};
use serde::Serialize;

use crate::errors::CliResult;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    AsciiTable,
    Json,
    Yaml,
}

pub fn render_rows<R>(format: OutputFormat, headers: &[&str], rows: &[R]) -> CliResult<String>
where
    R: TableRow + Serialize,
{
    Ok(match format {
        OutputFormat::AsciiTable => render_ascii_table(headers, rows),
        OutputFormat::Json => serde_json::to_string_pretty(rows)?,
        OutputFormat::Yaml => serde_yaml::to_string(rows)?,
    })
}

/// Prints the rows and, when `csv` is given, writes them to that file too.
pub fn print_rows<R>(
    format: OutputFormat,
    headers: &[&str],
    rows: &[R],
    csv: Option<&Path>,
) -> CliResult<()>
where
    R: TableRow + Serialize,
{
    if let Some(path) = csv {
        write_csv(path, headers, rows)?;
        tracing::info!(target: "enminst::cli", path = %path.display(), rows = rows.len(), "report written");
    }
    println!("{}", render_rows(format, headers, rows)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: String,
        state: String,
    }

    impl TableRow for Row {
        fn cell(&self, column: &str) -> String {
            match column {
                "Name" => self.name.clone(),
                "State" => self.state.clone(),
                _ => String::new(),
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![Row {
            name: "db-1".to_string(),
            state: "RUNNING".to_string(),
        }]
    }

    #[test]
    fn test_render_formats() {
        let table = render_rows(OutputFormat::AsciiTable, &["Name", "State"], &rows()).unwrap();
        assert!(table.contains("Name"));
        assert!(table.contains("db-1"));

        let json = render_rows(OutputFormat::Json, &["Name"], &rows()).unwrap();
        assert!(json.contains("\"state\": \"RUNNING\""));

        let yaml = render_rows(OutputFormat::Yaml, &["Name"], &rows()).unwrap();
        assert!(yaml.contains("name: db-1"));
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.csv");
        print_rows(OutputFormat::AsciiTable, &["Name", "State"], &rows(), Some(path.as_path())).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().collect::<Vec<_>>(), vec!["Name,State", "db-1,RUNNING"]);
    }
}
