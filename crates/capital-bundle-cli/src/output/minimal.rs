use serde_json::Value;

/// Print just the headline answer.
///
/// Bundles print the deployed total and allocation count (or `infeasible`);
/// other results fall back to the first well-known key, then the first field.
pub fn print_minimal(value: &Value) {
    println!("{}", minimal_line(value));
}

fn minimal_line(value: &Value) -> String {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let map = match result_obj {
        Value::Object(map) => map,
        other => return format_minimal(other),
    };

    if let Some(Value::Bool(feasible)) = map.get("feasible") {
        if !feasible {
            return "infeasible".to_string();
        }
        let deployed = map.get("totalDeployed").map(format_minimal).unwrap_or_default();
        let count = map
            .get("allocations")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        return format!("{} ({} allocations)", deployed, count);
    }

    let priority_keys = ["riskScore", "targetBase", "penalty"];
    for key in &priority_keys {
        if let Some(val) = map.get(*key) {
            if !val.is_null() {
                return format_minimal(val);
            }
        }
    }

    match map.iter().next() {
        Some((key, val)) => format!("{}: {}", key, format_minimal(val)),
        None => "{}".to_string(),
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
