use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Summary fields shown above a bundle's allocation table, in order.
const BUNDLE_SUMMARY: [&str; 6] = [
    "feasible",
    "totalDeployed",
    "utilization",
    "objectiveValue",
    "weightedRiskScore",
    "solverObjective",
];

const ALLOCATION_COLUMNS: [(&str, &str); 5] = [
    ("dealId", "Deal"),
    ("sector", "Sector"),
    ("amount", "Amount"),
    ("fractionOfRequest", "Of request"),
    ("riskScore", "Risk score"),
];

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) if result.contains_key("allocations") => {
                print_bundle(result);
                print_envelope_notes(map);
            }
            Some(Value::Object(result)) => {
                print_field_table(result);
                print_envelope_notes(map);
            }
            _ => print_field_table(map),
        },
        other => println!("{}", other),
    }
}

fn print_bundle(result: &Map<String, Value>) {
    let mut summary = Builder::default();
    summary.push_record(["Field", "Value"]);
    for key in BUNDLE_SUMMARY {
        if let Some(val) = result.get(key) {
            summary.push_record([key, &format_value(val)]);
        }
    }
    println!("{}", Table::from(summary));

    if let Some(Value::Array(lines)) = result.get("allocations") {
        if lines.is_empty() {
            println!("\n(no allocations)");
        } else {
            println!("\nAllocations:");
            println!("{}", allocation_table(lines));
        }
    }

    if let Some(Value::Object(breakdown)) = result.get("sectorBreakdown") {
        let weights = result.get("sectorWeights").and_then(Value::as_object);
        let deviation = result.get("sectorDeviation").and_then(Value::as_object);
        let mut b = Builder::default();
        b.push_record(["Sector", "Deployed", "Weight", "Deviation"]);
        for (sector, deployed) in breakdown {
            let pick = |m: Option<&Map<String, Value>>| {
                m.and_then(|m| m.get(sector)).map(format_value).unwrap_or_default()
            };
            b.push_record([
                sector.clone(),
                format_value(deployed),
                pick(weights),
                pick(deviation),
            ]);
        }
        println!("\nSectors:\n{}", Table::from(b));
    }

    if let Some(Value::Array(excluded)) = result.get("excludedDeals") {
        if !excluded.is_empty() {
            let ids: Vec<String> = excluded.iter().map(format_value).collect();
            println!("\nExcluded: {}", ids.join(", "));
        }
    }
}

fn allocation_table(lines: &[Value]) -> Table {
    let mut b = Builder::default();
    b.push_record(ALLOCATION_COLUMNS.iter().map(|(_, title)| title.to_string()));
    for line in lines {
        if let Value::Object(map) = line {
            b.push_record(ALLOCATION_COLUMNS.iter().map(|(key, _)| {
                map.get(*key).map(format_value).unwrap_or_default()
            }));
        }
    }
    Table::from(b)
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_field_table(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
