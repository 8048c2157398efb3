//! Deep merge of YAML configuration trees.

use serde_yaml::Value;

/// Merge `overlay` into `base`.
///
/// Mappings merge key by key, recursively. Any other value in the overlay,
/// sequences and explicit nulls included, replaces the base value wholesale.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_overlay_wins_on_collision() {
        let merged = deep_merge(yaml("a: 1\nb: 2"), yaml("b: 3"));
        assert_eq!(merged, yaml("a: 1\nb: 3"));
    }

    #[test]
    fn test_nested_mappings_merge() {
        let base = yaml("data:\n  dbName: app\n  backupRetention: 0");
        let overlay = yaml("data:\n  backupRetention: 7");
        let merged = deep_merge(base, overlay);
        assert_eq!(merged, yaml("data:\n  dbName: app\n  backupRetention: 7"));
    }

    #[test]
    fn test_sequences_are_replaced() {
        let base = yaml("reserved: [10.1.0.0/16, 10.2.0.0/16]");
        let overlay = yaml("reserved: [10.9.0.0/16]");
        let merged = deep_merge(base, overlay);
        assert_eq!(merged, yaml("reserved: [10.9.0.0/16]"));
    }

    #[test]
    fn test_explicit_null_overrides_base() {
        let base = yaml("pipeline:\n  source:\n    branch: main\n    owner: shop");
        let overlay = yaml("pipeline:\n  source:\n    branch: ~");
        let merged = deep_merge(base, overlay);
        assert_eq!(merged, yaml("pipeline:\n  source:\n    branch: null\n    owner: shop"));
    }
}
