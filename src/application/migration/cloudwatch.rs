// CloudWatch statistic fan-out - one query per statistic (v32, re-applied at v34)
use super::legacy_rules::next_ref_id;
use super::{MigrationPass, PanelPass};
use crate::domain::lenient;
use crate::domain::panel::{PanelModel, Query};
use serde_json::{Map, Value};
use tracing::debug;

const LEGACY_QUERY_KEYS: [&str; 4] = ["dimensions", "namespace", "region", "statistics"];

fn is_legacy_query(query: &Query) -> bool {
    LEGACY_QUERY_KEYS.iter().all(|key| query.has(key))
}

fn is_legacy_annotation(annotation: &Map<String, Value>) -> bool {
    LEGACY_QUERY_KEYS
        .iter()
        .chain(&["prefixMatching"])
        .all(|key| annotation.contains_key(*key))
}

/// Keeps the first statistic on `query` and returns one copy per remaining statistic.
/// Copies carry no ref id yet.
fn split_statistics(query: &mut Query) -> Vec<Query> {
    let statistics = match query.remove("statistics") {
        Some(Value::Array(statistics)) => statistics,
        _ => return Vec::new(),
    };
    let mut statistics = statistics.into_iter();
    let Some(first) = statistics.next() else {
        return Vec::new();
    };
    query.set("statistic", first);
    statistics
        .map(|statistic| {
            let mut copy = query.clone();
            copy.ref_id = String::new();
            copy.set("statistic", statistic);
            copy
        })
        .collect()
}

pub fn migrate_queries(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    let Some(targets) = panel.targets.as_mut() else {
        return;
    };
    let original_len = targets.len();
    for index in 0..original_len {
        if !is_legacy_query(&targets[index]) {
            continue;
        }
        for mut copy in split_statistics(&mut targets[index]) {
            copy.ref_id = next_ref_id(targets.iter().map(|target| target.ref_id.as_str()));
            targets.push(copy);
        }
    }
    if targets.len() > original_len {
        debug!(panel = panel.id, added = targets.len() - original_len, "split multi-statistic queries");
    }
}

fn split_annotation(annotation: &mut Map<String, Value>) -> Vec<Value> {
    let statistics = match annotation.get("statistics") {
        Some(Value::Array(statistics)) if !statistics.is_empty() => statistics.clone(),
        _ => return Vec::new(),
    };
    let name = annotation.get("name").map_or_else(|| "undefined".to_string(), lenient::to_js_string);

    let mut template = annotation.clone();
    template.remove("statistics");
    template.remove("name");
    let copies: Vec<Value> = statistics[1..]
        .iter()
        .map(|statistic| {
            let mut copy = template.clone();
            copy.insert("statistic".to_string(), statistic.clone());
            copy.insert("name".to_string(), Value::String(format!("{name} - {}", lenient::to_js_string(statistic))));
            Value::Object(copy)
        })
        .collect();

    let first = statistics[0].clone();
    if !copies.is_empty() {
        let renamed = format!("{name} - {}", lenient::to_js_string(&first));
        annotation.insert("name".to_string(), Value::String(renamed));
    }
    annotation.insert("statistic".to_string(), first);
    annotation.remove("statistics");
    copies
}

pub fn migrate_annotations(pass: &mut MigrationPass<'_>) {
    let list = &mut pass.dashboard.annotations.list;
    let mut added = Vec::new();
    for annotation in list.iter_mut().filter_map(Value::as_object_mut) {
        if is_legacy_annotation(annotation) {
            added.extend(split_annotation(annotation));
        }
    }
    list.extend(added);
}
