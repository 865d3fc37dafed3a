//! PropertyMap — the key-value store on nodes and relationships.

use super::Value;

/// A map of attribute names to values.
pub type PropertyMap = hashbrown::HashMap<String, Value>;

/// Look up a numeric attribute, distinguishing "missing" from "not a number".
///
/// Returns `Ok(None)` when the key is absent or null, `Err(type_name)` when
/// the value exists but is not numeric.
pub fn numeric(props: &PropertyMap, key: &str) -> Result<Option<f64>, &'static str> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_float().map(Some).ok_or(v.type_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_lookup() {
        let mut props = PropertyMap::new();
        props.insert("x".into(), Value::Int(4));
        props.insert("name".into(), Value::from("Hauptstrasse"));
        assert_eq!(numeric(&props, "x"), Ok(Some(4.0)));
        assert_eq!(numeric(&props, "y"), Ok(None));
        assert_eq!(numeric(&props, "name"), Err("STRING"));
    }
}
