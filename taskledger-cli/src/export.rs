/// CSV export of report results
///
/// One file per report, `<dir>/<name>.csv`, UTF-8, with a header row taken
/// from the column order of the first record. NULL becomes an empty field.
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use taskledger_shared::db::statement::Record;

/// Writes `records` to `<dir>/<name>.csv`
///
/// # Returns
///
/// The written path, or `None` when there was nothing to write.
pub fn write_report(dir: &Path, name: &str, records: &[Record]) -> Result<Option<PathBuf>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };

    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}.csv", name));

    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("Failed to open {}", path.display()))?;

    writer.write_record(first.columns())?;
    for record in records {
        writer.write_record(record.values().map(cell))?;
    }
    writer.flush()?;

    Ok(Some(path))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Record> {
        vec![
            Record::from_pairs([
                ("id", json!(1)),
                ("fullname", json!("Ann Lee")),
                ("description", json!(null)),
            ]),
            Record::from_pairs([
                ("id", json!(2)),
                ("fullname", json!("Kozak, Kozachenko")),
                ("description", json!("Print the report")),
            ]),
        ]
    }

    #[test]
    fn test_write_report_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report(dir.path(), "user_tasks", &sample())
            .unwrap()
            .expect("file written");

        assert_eq!(path, dir.path().join("user_tasks.csv"));
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(
            contents,
            "id,fullname,description\n1,Ann Lee,\n2,\"Kozak, Kozachenko\",Print the report\n"
        );
    }

    #[test]
    fn test_empty_result_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reports");

        assert!(write_report(&target, "empty", &[]).unwrap().is_none());
        assert!(!target.exists());
    }

    #[test]
    fn test_non_ascii_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![Record::from_pairs([("name", json!("Нове"))])];

        let path = write_report(dir.path(), "statuses", &records).unwrap().unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "name\nНове\n");
    }
}
