// THEORY:
// The `graph_file` module is the boundary between the external scene-graph
// extractor and the engine. The extractor writes a JSON array; this module
// turns it into a validated `TripleSet`.
//
// Key architectural principles:
// 1.  **All or Nothing**: A single entry missing its label or one of its box
//     coordinates rejects the whole file. A partial scene graph would show up
//     as a burst of false "dropped" events in the diff.
// 2.  **Lenient Labels**: Labels may arrive as strings or as numeric class ids;
//     both are kept as text so identity comparison stays uniform.
// 3.  **Deterministic Collisions**: Entries that share a (subject, predicate,
//     object) identity collapse to one triple, and the last entry in the array
//     supplies the boxes.

use crate::core_modules::triple::{BoundingBox, Triple, TripleKey, TripleSet};
use crate::error::{ExtractionError, MalformedTripleError};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// A subject or object entry as written by the extractor. Every field is
/// optional here so that a missing one can be reported by name.
#[derive(Debug, Default, Deserialize)]
struct RawEntity {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    xmin: Option<Value>,
    #[serde(default)]
    ymin: Option<Value>,
    #[serde(default)]
    xmax: Option<Value>,
    #[serde(default)]
    ymax: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPredicate {
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTriple {
    #[serde(default)]
    subject: Option<RawEntity>,
    #[serde(default)]
    predicate: Option<RawPredicate>,
    #[serde(default)]
    object: Option<RawEntity>,
}

/// Field names for one side of a relation, used in error reports.
struct EntityFields {
    entity: &'static str,
    id: &'static str,
    xmin: &'static str,
    ymin: &'static str,
    xmax: &'static str,
    ymax: &'static str,
}

const SUBJECT_FIELDS: EntityFields = EntityFields {
    entity: "subject",
    id: "subject.id",
    xmin: "subject.xmin",
    ymin: "subject.ymin",
    xmax: "subject.xmax",
    ymax: "subject.ymax",
};

const OBJECT_FIELDS: EntityFields = EntityFields {
    entity: "object",
    id: "object.id",
    xmin: "object.xmin",
    ymin: "object.ymin",
    xmax: "object.xmax",
    ymax: "object.ymax",
};

/// Parses the extractor's JSON output into a validated set of triples.
pub fn parse_graph(json: &str) -> Result<TripleSet, ExtractionError> {
    let document: Value = serde_json::from_str(json)?;
    let Value::Array(entries) = document else {
        return Err(ExtractionError::NotAnArray);
    };

    let mut triples = TripleSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let triple = parse_entry(index, entry)?;
        if let Some(previous) = triples.insert(triple) {
            debug!(
                index,
                relation = %previous.key,
                "duplicate relationship in extractor output, keeping the later boxes"
            );
        }
    }
    Ok(triples)
}

fn parse_entry(index: usize, entry: Value) -> Result<Triple, MalformedTripleError> {
    let malformed = |field: &'static str| MalformedTripleError { index, field };

    if !entry.is_object() {
        return Err(malformed("entry"));
    }
    let raw: RawTriple = serde_json::from_value(entry).map_err(|_| malformed("entry"))?;

    let subject = raw.subject.ok_or_else(|| malformed(SUBJECT_FIELDS.entity))?;
    let predicate = raw.predicate.ok_or_else(|| malformed("predicate"))?;
    let object = raw.object.ok_or_else(|| malformed(OBJECT_FIELDS.entity))?;

    let (subject_label, subject_box) = parse_entity(index, subject, &SUBJECT_FIELDS)?;
    let predicate_label = predicate
        .id
        .as_ref()
        .and_then(label)
        .ok_or_else(|| malformed("predicate.id"))?;
    let (object_label, object_box) = parse_entity(index, object, &OBJECT_FIELDS)?;

    Ok(Triple::new(
        TripleKey::new(subject_label, predicate_label, object_label),
        subject_box,
        object_box,
    ))
}

fn parse_entity(
    index: usize,
    raw: RawEntity,
    fields: &EntityFields,
) -> Result<(String, BoundingBox), MalformedTripleError> {
    let malformed = |field: &'static str| MalformedTripleError { index, field };
    let coordinate = |value: &Option<Value>, field: &'static str| {
        value
            .as_ref()
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed(field))
    };

    let id = raw
        .id
        .as_ref()
        .and_then(label)
        .ok_or_else(|| malformed(fields.id))?;
    let bounding_box = BoundingBox::new(
        coordinate(&raw.xmin, fields.xmin)?,
        coordinate(&raw.ymin, fields.ymin)?,
        coordinate(&raw.xmax, fields.xmax)?,
        coordinate(&raw.ymax, fields.ymax)?,
    );
    Ok((id, bounding_box))
}

/// Accepts non-empty string labels and numeric class ids.
fn label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(subject: &str, predicate: &str, object: &str, sx: f64) -> Value {
        serde_json::json!({
            "subject": { "id": subject, "xmin": sx, "ymin": 1.0, "xmax": sx + 10.0, "ymax": 11.0 },
            "predicate": { "id": predicate },
            "object": { "id": object, "xmin": 50.0, "ymin": 60.0, "xmax": 70.0, "ymax": 80.0 }
        })
    }

    fn parse_value(value: Value) -> Result<TripleSet, ExtractionError> {
        parse_graph(&value.to_string())
    }

    #[test]
    fn parses_well_formed_output() {
        let set = parse_value(Value::Array(vec![
            entry("person", "near", "chair", 0.0),
            entry("person", "near", "table", 5.0),
        ]))
        .unwrap();

        assert_eq!(set.len(), 2);
        let triple = set.get(&TripleKey::new("person", "near", "table")).unwrap();
        assert_eq!(triple.subject_box, BoundingBox::new(5.0, 1.0, 15.0, 11.0));
        assert_eq!(triple.object_box, BoundingBox::new(50.0, 60.0, 70.0, 80.0));
    }

    #[test]
    fn empty_array_is_an_empty_scene() {
        assert!(parse_graph("[]").unwrap().is_empty());
    }

    #[test]
    fn last_duplicate_supplies_boxes() {
        let set = parse_value(Value::Array(vec![
            entry("cat", "on", "sofa", 0.0),
            entry("cat", "on", "sofa", 30.0),
        ]))
        .unwrap();
        assert_eq!(set.len(), 1);
        let kept = set.get(&TripleKey::new("cat", "on", "sofa")).unwrap();
        assert_eq!(kept.subject_box.xmin, 30.0);
    }

    #[test]
    fn numeric_ids_become_labels() {
        let value = serde_json::json!([{
            "subject": { "id": 1, "xmin": 0, "ymin": 0, "xmax": 1, "ymax": 1 },
            "predicate": { "id": 7 },
            "object": { "id": 3, "xmin": 0, "ymin": 0, "xmax": 1, "ymax": 1 }
        }]);
        let set = parse_value(value).unwrap();
        assert!(set.contains(&TripleKey::new("1", "7", "3")));
    }

    #[test]
    fn one_missing_coordinate_rejects_everything() {
        let mut broken = entry("cat", "on", "sofa", 0.0);
        broken["object"].as_object_mut().unwrap().remove("ymax");

        let err = parse_value(Value::Array(vec![entry("person", "near", "chair", 0.0), broken]))
            .unwrap_err();
        match err {
            ExtractionError::Malformed(e) => {
                assert_eq!(e, MalformedTripleError { index: 1, field: "object.ymax" });
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_sections_are_named() {
        let mut no_predicate = entry("cat", "on", "sofa", 0.0);
        no_predicate.as_object_mut().unwrap().remove("predicate");
        let err = parse_value(Value::Array(vec![no_predicate])).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Malformed(MalformedTripleError { index: 0, field: "predicate" })
        ));

        let mut no_subject_id = entry("cat", "on", "sofa", 0.0);
        no_subject_id["subject"].as_object_mut().unwrap().remove("id");
        let err = parse_value(Value::Array(vec![no_subject_id])).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Malformed(MalformedTripleError { field: "subject.id", .. })
        ));
    }

    #[test]
    fn non_numeric_coordinate_is_malformed() {
        let mut broken = entry("cat", "on", "sofa", 0.0);
        broken["subject"]["xmin"] = Value::String("left".into());
        let err = parse_value(Value::Array(vec![broken])).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Malformed(MalformedTripleError { field: "subject.xmin", .. })
        ));
    }

    #[test]
    fn non_array_and_garbage_are_rejected() {
        assert!(matches!(parse_graph("{}"), Err(ExtractionError::NotAnArray)));
        assert!(matches!(parse_graph("[1, 2"), Err(ExtractionError::InvalidJson(_))));
        assert!(matches!(
            parse_graph("[42]"),
            Err(ExtractionError::Malformed(MalformedTripleError { index: 0, field: "entry" }))
        ));
    }
}
