//! Conversion between the YAML values templates are authored in and the
//! JSON values Redfish sessions exchange.

pub(crate) fn yaml_to_json(value: &serde_yaml::Value) -> serde_json::Value {
    match value {
        serde_yaml::Value::Null => serde_json::Value::Null,
        serde_yaml::Value::Bool(b) => serde_json::Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::Null
            }
        }
        serde_yaml::Value::String(s) => serde_json::Value::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => {
            serde_json::Value::Array(seq.iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut object = serde_json::Map::new();
            for (k, v) in map {
                if let Some(key) = k.as_str() {
                    object.insert(key.to_string(), yaml_to_json(v));
                }
            }
            serde_json::Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

/// Converts a value to the string representation the device expects, per
/// spec's `Enabled/Disabled` vs. `true/false` boolean convention.
pub(crate) fn stringify(value: &serde_json::Value, bool_as_enabled_disabled: bool) -> String {
    match value {
        serde_json::Value::Bool(b) if bool_as_enabled_disabled => {
            if *b { "Enabled" } else { "Disabled" }.to_string()
        }
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
