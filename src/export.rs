//! CSV and JSON encoding for check results and VGC lists.

use crate::model::Slice;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Text form of a cell: arrays joined with `", "`, objects as JSON, null as empty.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|i| cell_text(Some(i)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    let escaped = text.replace('"', "\"\"");
    if escaped.contains(['"', ',', '\n']) {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

/// Encode rows as CSV. Without explicit `columns`, every key seen is used in first-seen order.
pub fn rows_to_csv(rows: &[&serde_json::Map<String, Value>], columns: Option<&[String]>) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let cols: Vec<String> = match columns {
        Some(c) if !c.is_empty() => c.to_vec(),
        _ => {
            let mut acc: Vec<String> = Vec::new();
            for row in rows {
                for key in row.keys() {
                    if !acc.contains(key) {
                        acc.push(key.clone());
                    }
                }
            }
            acc
        }
    };
    let header = cols
        .iter()
        .map(|c| escape_cell(c))
        .collect::<Vec<_>>()
        .join(",");
    let body = rows
        .iter()
        .map(|row| {
            cols.iter()
                .map(|c| escape_cell(&cell_text(row.get(c))))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{header}\n{body}")
}

/// Slices as CSV, columns in the order of the first slice's fields.
pub fn slices_to_csv(slices: &[Slice]) -> String {
    let Some(first) = slices.first() else {
        return String::new();
    };
    let columns: Vec<String> = first.raw.keys().cloned().collect();
    let rows: Vec<_> = slices.iter().map(|s| &s.raw).collect();
    rows_to_csv(&rows, Some(columns.as_slice()))
}

/// VGC list (`staff member -> children`) as a two-column CSV.
pub fn vgc_list_to_csv(list: &Value) -> String {
    let mut lines = vec![format!("{},{}", escape_cell("Personeel"), escape_cell("Kinderen"))];
    if let Value::Object(map) = list {
        for (person, children) in map {
            lines.push(format!(
                "{},{}",
                escape_cell(person),
                escape_cell(&cell_text(Some(children)))
            ));
        }
    }
    lines.join("\n")
}

/// `(staff member, children)` pairs of a VGC list, for tables.
pub fn vgc_list_rows(list: &Value) -> Vec<(String, String)> {
    match list {
        Value::Object(map) => map
            .iter()
            .map(|(person, children)| (person.clone(), cell_text(Some(children))))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize JSON")
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_text(path, &to_pretty_json(value)?)
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slice(v: Value) -> Slice {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn csv_quotes_only_when_needed() {
        let slices = vec![
            slice(json!({ "From Time": "07:00", "BKR": "Yes", "Details": "ok" })),
            slice(json!({ "From Time": "07:15", "BKR": "No", "Details": "needs \"1\" more, now" })),
        ];
        assert_eq!(
            slices_to_csv(&slices),
            "From Time,BKR,Details\n07:00,Yes,ok\n07:15,No,\"needs \"\"1\"\" more, now\""
        );
    }

    #[test]
    fn csv_cells_render_arrays_objects_and_nulls() {
        let slices = vec![slice(json!({
            "Details": ["a", "b"],
            "Extra": { "k": 1 },
            "Missing": null,
            "#Staff": 2,
            "Multi": "line1\nline2"
        }))];
        assert_eq!(
            slices_to_csv(&slices),
            "Details,Extra,Missing,#Staff,Multi\n\"a, b\",\"{\"\"k\"\":1}\",,2,\"line1\nline2\""
        );
    }

    #[test]
    fn columns_come_from_first_row_only() {
        let slices = vec![
            slice(json!({ "A": 1 })),
            slice(json!({ "A": 2, "B": 3 })),
        ];
        assert_eq!(slices_to_csv(&slices), "A\n1\n2");
        assert_eq!(slices_to_csv(&[]), "");
    }

    #[test]
    fn rows_without_columns_collect_every_key() {
        let a = json!({ "A": 1 });
        let b = json!({ "B": 2, "A": 3 });
        let rows = vec![a.as_object().unwrap(), b.as_object().unwrap()];
        assert_eq!(rows_to_csv(&rows, None), "A,B\n1,\n3,2");
    }

    #[test]
    fn vgc_list_csv_and_rows() {
        let list = json!({ "Anna": ["Bram", "Cas"], "Dirk": "Eva" });
        assert_eq!(vgc_list_to_csv(&list), "Personeel,Kinderen\nAnna,\"Bram, Cas\"\nDirk,Eva");
        assert_eq!(
            vgc_list_rows(&list),
            vec![("Anna".into(), "Bram, Cas".into()), ("Dirk".into(), "Eva".into())]
        );
    }

    #[test]
    fn json_is_pretty_with_two_spaces() {
        let out = to_pretty_json(&json!({ "day": "2025-01-06" })).unwrap();
        assert_eq!(out, "{\n  \"day\": \"2025-01-06\"\n}");
    }

    #[test]
    fn write_json_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out/nested/result.json");
        write_json(&path, &json!([1, 2])).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "[\n  1,\n  2\n]");
    }
}
