//! Layer overlay semantics.
//!
//! A higher-precedence layer overlays the accumulated document key by key:
//! two tables overlay recursively, so setting one leaf never nulls its
//! siblings, while any other value (arrays included) replaces the lower
//! layer wholesale. A key the overlay does not mention leaves the base
//! untouched. That absence rule is what lets the `Option` leaves in the
//! config tree distinguish "explicitly false" from "unset, inherit".
//!
//! Rule arrays are exempt: they merge by rule name via
//! [`merge_rule_arrays`], threaded through the layers separately by
//! `ConfigLayerStack::effective_config`.

use toml::{Table, Value};

/// Overlay a higher-precedence layer onto the accumulated `base`, leaf by
/// leaf.
pub fn overlay_table(base: &mut Table, overlay: &Table) {
    for (key, incoming) in overlay {
        match (base.get_mut(key), incoming) {
            // Both sides are tables: descend so sibling leaves survive.
            (Some(Value::Table(existing)), Value::Table(higher)) => {
                overlay_table(existing, higher);
            }
            // Leaf, array, or table-vs-scalar mismatch: the higher layer
            // wins outright.
            (Some(existing), _) => {
                *existing = incoming.clone();
            }
            // New key: adopt it.
            (None, _) => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Merge rule arrays by name: a later rule whose `name` matches an earlier
/// rule replaces it in place (keeping the earlier load position); rules with
/// new or missing names are appended in arrival order.
pub fn merge_rule_arrays(layers: Vec<Vec<Value>>) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::new();

    for layer in layers {
        for rule in layer {
            let name = rule_name(&rule);
            let existing = name.as_deref().and_then(|name| {
                merged
                    .iter()
                    .position(|candidate| rule_name(candidate).as_deref() == Some(name))
            });
            match existing {
                Some(index) => merged[index] = rule,
                None => merged.push(rule),
            }
        }
    }

    merged
}

fn rule_name(rule: &Value) -> Option<String> {
    rule.get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
}
