use proptest::prelude::*;
use std::collections::BTreeMap;

/// Option keys as tools and callers spell them
pub fn option_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_.-]{0,23}"
}

pub fn option_map_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(option_key_strategy(), "[a-zA-Z0-9 ._/-]{0,32}", 0..8)
}

/// Enhancer chain names for generated recipes
pub fn enhancer_chain_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z][a-z0-9-]{2,15}", 0..8)
}

/// Target type with arbitrary letter case and surrounding whitespace
pub fn target_type_spelling_strategy(canonical: &'static str) -> impl Strategy<Value = String> {
    (
        prop::collection::vec(any::<bool>(), canonical.len()),
        "[ ]{0,2}",
        "[ ]{0,2}",
    )
        .prop_map(move |(upper, lead, trail)| {
            let cased: String = canonical
                .chars()
                .zip(upper)
                .map(|(c, up)| {
                    if up {
                        c.to_ascii_uppercase()
                    } else {
                        c.to_ascii_lowercase()
                    }
                })
                .collect();
            format!("{lead}{cased}{trail}")
        })
}

/// Recipe catalog YAML with one `GENERATED` type using the given chain
pub fn catalog_yaml(enhancers: &[String]) -> String {
    let mut yaml = String::from(
        "apiVersion: v1\nrecipes:\n  - type: GENERATED\n    generator:\n      name: gen\n      version: \"1\"\n",
    );
    if !enhancers.is_empty() {
        yaml.push_str("    enhancers:\n");
        for name in enhancers {
            yaml.push_str(&format!("      - name: \"{name}\"\n        version: \"1\"\n"));
        }
    }
    yaml
}
