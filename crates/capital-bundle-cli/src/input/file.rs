use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Read a JSON or YAML file (chosen by extension) and deserialise into a typed struct.
pub fn read_structured<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let value = read_value(path)?;
    let typed: T = serde_json::from_value(value)
        .map_err(|e| format!("Failed to interpret '{}': {}", path, e))?;
    Ok(typed)
}

/// Read a JSON or YAML file as a generic serde_json::Value.
pub fn read_value(path: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let value: Value = if is_yaml(&canonical) {
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?
    };
    Ok(value)
}

/// Read every record of a headed CSV file.
pub fn read_csv<T: DeserializeOwned>(path: &str) -> Result<Vec<T>, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let mut rows = Vec::new();
    for (i, record) in rdr.deserialize().enumerate() {
        // +2: header line and 1-based numbering
        let row: T = record
            .map_err(|e| format!("{} line {}: {}", canonical.display(), i + 2, e))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write pretty JSON to `path`, replacing any existing file.
pub fn write_json(path: &str, value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Resolve and validate the path, preventing directory traversal.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, body: &str) -> String {
        let path = std::env::temp_dir().join(format!("cbx-{}-{}", std::process::id(), name));
        fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_yaml_and_json_read_alike() {
        let json = temp_file("t.json", r#"{"totalBudget": 100, "riskAversion": 1}"#);
        let yaml = temp_file("t.yaml", "totalBudget: 100\nriskAversion: 1\n");
        assert_eq!(read_value(&json).unwrap(), read_value(&yaml).unwrap());
    }

    #[test]
    fn test_missing_file_reported() {
        let err = read_value("definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_csv_rows_deserialise() {
        #[derive(serde::Deserialize)]
        struct Row {
            id: String,
            amount: f64,
        }
        let path = temp_file("rows.csv", "id, amount\nA, 1.5\nB, 2\n");
        let rows: Vec<Row> = read_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id, "B");
        assert_eq!(rows[0].amount, 1.5);
    }
}
