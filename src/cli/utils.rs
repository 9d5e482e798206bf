use serde_json::{json, Map, Value};

use crate::cli::OutputFormat;
use crate::database::Record;
use crate::entity::EntityDef;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(extra)) = data {
                if let Some(object) = response.as_object_mut() {
                    object.extend(extra);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a list of records as JSON or one line per record
pub fn output_records(output_format: &OutputFormat, entity: &EntityDef, records: &[Record], total_count: i64) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "records": records,
                    "total_count": total_count
                }))?
            );
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No {} records found", entity.table);
            }
            for record in records {
                println!("{}", record_line(entity, record));
            }
            println!("({} of {} {})", records.len(), total_count, entity.table);
        }
    }
    Ok(())
}

/// Output one record in full
pub fn output_record(output_format: &OutputFormat, record: &Record) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(record)?),
        OutputFormat::Text => {
            println!("id: {}", record.id);
            for (key, value) in &record.fields {
                println!("{}: {}", key, display_value(value));
            }
        }
    }
    Ok(())
}

/// `id  name  [flag=on ...]`
pub fn record_line(entity: &EntityDef, record: &Record) -> String {
    let mut line = format!("{}  {}", record.id, display_value(&record.column(entity.search_column)));
    for toggle in entity.toggles {
        let state = if record.flag(toggle).unwrap_or(false) { "on" } else { "off" };
        line.push_str(&format!("  {}={}", toggle, state));
    }
    line
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Parse repeated `field=value` arguments against the entity's field types
pub fn parse_assignments(entity: &EntityDef, assignments: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut values = Map::new();
    for assignment in assignments {
        let (name, raw) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected field=value, got '{}'", assignment))?;
        let field = entity
            .field(name.trim())
            .ok_or_else(|| anyhow::anyhow!("{} has no field '{}'", entity.table, name.trim()))?;
        let value = field
            .parse_input(raw)
            .map_err(|e| anyhow::anyhow!("{}: {}", field.name, e))?;
        values.insert(field.name.to_string(), value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::registry::{COUNTRIES, STUDENTS};

    #[test]
    fn assignments_are_typed() {
        let values = parse_assignments(
            &COUNTRIES,
            &["name=Testland".to_string(), "active_on_university=false".to_string()],
        )
        .unwrap();
        assert_eq!(values["name"], json!("Testland"));
        assert_eq!(values["active_on_university"], json!(false));
    }

    #[test]
    fn bad_assignments_are_reported() {
        assert!(parse_assignments(&COUNTRIES, &["name".to_string()]).is_err());
        assert!(parse_assignments(&STUDENTS, &["shoe_size=42".to_string()]).is_err());
    }

    #[test]
    fn record_line_shows_toggles() {
        let record = Record::from_value(json!({
            "id": "c1",
            "name": "Testland",
            "active_on_nationalities": true,
            "active_on_university": false
        }))
        .unwrap();
        assert_eq!(
            record_line(&COUNTRIES, &record),
            "c1  Testland  active_on_nationalities=on  active_on_university=off"
        );
    }
}
