//! Caption inference and ordering for inspection photos.

use crate::record::InspectionRecord;

/// Slots shown before all others, in this order.
pub const PRIORITY_SLOTS: &[&str] = &["rfks_nameplate_motor", "rfks_nameplate_gear"];

/// Order of the remaining known slots.
pub const CANONICAL_SLOTS: &[&str] = &[
    "motor_current_img",
    "gear_sound_img",
    "assembly_img",
    "controller_img",
    "servo_motor_img",
    "servo_drive_img",
    "cable_wire_img",
];

/// Condition evaluated against a lower-cased slot identifier or location.
#[derive(Clone, Copy, Debug)]
pub enum Predicate {
    /// Matches when any keyword occurs.
    Any(&'static [&'static str]),
    /// Matches when every keyword occurs.
    All(&'static [&'static str]),
}

impl Predicate {
    fn matches(&self, haystack: &str) -> bool {
        match self {
            Self::Any(keywords) => keywords.iter().any(|keyword| haystack.contains(keyword)),
            Self::All(keywords) => keywords.iter().all(|keyword| haystack.contains(keyword)),
        }
    }
}

/// Caption rules; the first matching rule wins.
pub const LABEL_RULES: &[(Predicate, &str)] = &[
    (Predicate::Any(&["current"]), "Motor current"),
    (Predicate::All(&["nameplate", "motor"]), "Name plate : Motor"),
    (Predicate::All(&["nameplate", "gear"]), "Name plate : Gear"),
    (Predicate::Any(&["gear"]), "Gear sound level"),
    (Predicate::Any(&["sound"]), "Gear sound level"),
    (
        Predicate::Any(&["install", "site", "assembly"]),
        "Gear + motor assembly",
    ),
    (Predicate::Any(&["controller"]), "Controller"),
    (Predicate::All(&["servo", "motor"]), "Servo motor"),
    (Predicate::All(&["servo", "drive"]), "Servo drive"),
    (Predicate::Any(&["cable", "wire"]), "Cable / wire"),
];

/// Infers a caption from a slot identifier or source location.
pub fn infer_label(identifier: &str) -> Option<&'static str> {
    let identifier = identifier.to_lowercase();
    LABEL_RULES
        .iter()
        .find(|(predicate, _)| predicate.matches(&identifier))
        .map(|(_, label)| *label)
}

/// Resolves the caption for the image at `index` (0-based): explicit label,
/// then slot keywords, then source keywords, then `image {n}`.
pub fn resolve_label(index: usize, explicit: &[String], slot: &str, source: &str) -> String {
    explicit
        .get(index)
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map(str::to_owned)
        .or_else(|| infer_label(slot).map(str::to_owned))
        .or_else(|| infer_label(source).map(str::to_owned))
        .unwrap_or_else(|| format!("image {}", index + 1))
}

/// An image location paired with its caption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabeledImage {
    slot: String,
    source: String,
    label: String,
}

impl LabeledImage {
    /// Creates a labeled image.
    pub fn new(slot: impl Into<String>, source: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            source: source.into(),
            label: label.into(),
        }
    }

    /// Slot identifier the image was submitted under.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Location the image bytes are fetched from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Caption drawn above the image.
    pub fn label(&self) -> &str {
        &self.label
    }
}

fn slot_rank(slot: &str) -> usize {
    PRIORITY_SLOTS
        .iter()
        .chain(CANONICAL_SLOTS)
        .position(|known| *known == slot)
        .unwrap_or(PRIORITY_SLOTS.len() + CANONICAL_SLOTS.len())
}

/// Orders the resolved images of `record` for the report and labels them.
///
/// Nameplate photos come first, then the canonical slots, then unknown slots
/// by name. Slots without a location are skipped.
pub fn ordered_images(record: &InspectionRecord, explicit: &[String]) -> Vec<LabeledImage> {
    let mut slots: Vec<(&str, &str)> = record.resolved_images().collect();
    // `resolved_images` yields slots by name, so the stable sort keeps unknown slots sorted.
    slots.sort_by_key(|(slot, _)| slot_rank(slot));

    slots
        .into_iter()
        .enumerate()
        .map(|(index, (slot, source))| {
            LabeledImage::new(slot, source, resolve_label(index, explicit, slot, source))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(slots: &[(&str, Option<&str>)]) -> InspectionRecord {
        let mut record = InspectionRecord::default();
        for (slot, location) in slots {
            record
                .images
                .insert(slot.to_string(), location.map(str::to_owned));
        }
        record
    }

    #[test]
    fn nameplate_keyword_resolves_without_explicit_labels() {
        assert_eq!(
            resolve_label(0, &[], "rfks_nameplate_motor", "https://cdn/x.jpg"),
            "Name plate : Motor"
        );
        assert_eq!(
            resolve_label(3, &[], "rfks_nameplate_gear", ""),
            "Name plate : Gear"
        );
    }

    #[test]
    fn explicit_label_overrides_inference() {
        let explicit = vec!["Custom".to_string()];
        assert_eq!(
            resolve_label(0, &explicit, "rfks_nameplate_motor", ""),
            "Custom"
        );
    }

    #[test]
    fn rule_order_decides_overlapping_keywords() {
        assert_eq!(infer_label("motor_current_img"), Some("Motor current"));
        assert_eq!(infer_label("gear_sound_img"), Some("Gear sound level"));
        assert_eq!(infer_label("servo_motor_img"), Some("Servo motor"));
        assert_eq!(infer_label("SERVO_DRIVE"), Some("Servo drive"));
        assert_eq!(infer_label("install_site"), Some("Gear + motor assembly"));
    }

    #[test]
    fn falls_back_to_source_then_position() {
        assert_eq!(
            resolve_label(1, &[], "extra", "uploads/cable_photo.jpg"),
            "Cable / wire"
        );
        assert_eq!(resolve_label(4, &[], "extra", "uploads/x.jpg"), "image 5");
    }

    #[test]
    fn nameplates_lead_and_empty_slots_are_skipped() {
        let record = record_with(&[
            ("assembly_img", Some("a.jpg")),
            ("cable_wire_img", Some("c.jpg")),
            ("motor_current_img", Some("m.jpg")),
            ("rfks_nameplate_gear", Some("g.jpg")),
            ("rfks_nameplate_motor", Some("n.jpg")),
            ("zz_extra", Some("z.jpg")),
            ("controller_img", None),
            ("gear_sound_img", Some("")),
            ("check_complete_img", Some("k.jpg")),
        ]);

        let slots: Vec<_> = ordered_images(&record, &[])
            .iter()
            .map(|image| image.slot().to_owned())
            .collect();
        assert_eq!(
            slots,
            vec![
                "rfks_nameplate_motor",
                "rfks_nameplate_gear",
                "motor_current_img",
                "assembly_img",
                "cable_wire_img",
                "check_complete_img",
                "zz_extra",
            ]
        );
    }

    #[test]
    fn explicit_labels_follow_final_order() {
        let record = record_with(&[
            ("motor_current_img", Some("m.jpg")),
            ("rfks_nameplate_motor", Some("n.jpg")),
        ]);
        let images = ordered_images(&record, &["First".to_string()]);
        assert_eq!(images[0].slot(), "rfks_nameplate_motor");
        assert_eq!(images[0].label(), "First");
        assert_eq!(images[1].label(), "Motor current");
    }
}
