// THEORY:
// The `overlay` module is the drawing plan shared by every renderer. It knows
// nothing about pixels or windows; it only turns the accepted scene into a list
// of boxes and labels with their positions, so the OpenCV window and the web
// viewer draw exactly the same picture.
//
// Layout rules:
// - the subject box is drawn in `SUBJECT_COLOR`, the object box in `OBJECT_COLOR`;
// - the subject and object labels sit at the top-left corner of their boxes;
// - the predicate label sits halfway between the two box centres.

use crate::core_modules::triple::{BoundingBox, TripleKey, TripleSet};

/// RGB colour of subject boxes (blue).
pub const SUBJECT_COLOR: [u8; 3] = [0, 0, 255];
/// RGB colour of object boxes (orange).
pub const OBJECT_COLOR: [u8; 3] = [255, 165, 0];
/// RGB colour of every text label (white).
pub const LABEL_COLOR: [u8; 3] = [255, 255, 255];
/// Stroke width for boxes, in pixels.
pub const BOX_THICKNESS: f64 = 2.5;

/// Everything a renderer needs to draw one relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayItem {
    pub key: TripleKey,
    pub subject_box: BoundingBox,
    pub object_box: BoundingBox,
    /// Where the subject label goes.
    pub subject_anchor: (f64, f64),
    /// Where the object label goes.
    pub object_anchor: (f64, f64),
    /// Midpoint between the subject and object box centres.
    pub predicate_anchor: (f64, f64),
}

/// Lays out every triple of `scene`, ordered by key so repeated renders of the
/// same scene stack labels identically.
pub fn layout(scene: &TripleSet) -> Vec<OverlayItem> {
    let mut items: Vec<OverlayItem> = scene
        .iter()
        .map(|triple| {
            let (sx, sy) = triple.subject_box.center();
            let (ox, oy) = triple.object_box.center();
            OverlayItem {
                key: triple.key.clone(),
                subject_box: triple.subject_box,
                object_box: triple.object_box,
                subject_anchor: (triple.subject_box.xmin, triple.subject_box.ymin),
                object_anchor: (triple.object_box.xmin, triple.object_box.ymin),
                predicate_anchor: (ox + (sx - ox) / 2.0, oy + (sy - oy) / 2.0),
            }
        })
        .collect();
    items.sort_by(|a, b| a.key.cmp(&b.key));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::triple::Triple;
    use pretty_assertions::assert_eq;

    #[test]
    fn anchors_follow_boxes() {
        let scene: TripleSet = vec![Triple::new(
            TripleKey::new("person", "near", "chair"),
            BoundingBox::new(0.0, 0.0, 20.0, 40.0),
            BoundingBox::new(100.0, 60.0, 140.0, 100.0),
        )]
        .into_iter()
        .collect();

        let items = layout(&scene);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.subject_anchor, (0.0, 0.0));
        assert_eq!(item.object_anchor, (100.0, 60.0));
        // Centres are (10, 20) and (120, 80).
        assert_eq!(item.predicate_anchor, (65.0, 50.0));
    }

    #[test]
    fn items_are_ordered_by_key() {
        let scene: TripleSet = ["zebra", "cat", "man"]
            .into_iter()
            .map(|s| {
                Triple::new(
                    TripleKey::new(s, "on", "grass"),
                    BoundingBox::default(),
                    BoundingBox::default(),
                )
            })
            .collect();

        let subjects: Vec<String> = layout(&scene).into_iter().map(|i| i.key.subject).collect();
        assert_eq!(subjects, vec!["cat", "man", "zebra"]);
    }

    #[test]
    fn empty_scene_has_no_items() {
        assert!(layout(&TripleSet::new()).is_empty());
    }
}
