use super::model::{MeasurementTable, TagMap};

// ---------------------------------------------------------------------------
// Column selection
// ---------------------------------------------------------------------------

/// Whether a raw column heading is an export artifact rather than a tag:
/// blank headings, and any heading containing `Unnamed` (pandas writes
/// `Unnamed: N` for blank ones).
pub fn is_artifact_heading(heading: &str) -> bool {
    let h = heading.trim();
    h.is_empty() || h.contains("Unnamed")
}

/// Normalize a raw heading into a tag: trim, then apply the optional rename.
pub fn tag_name(heading: &str, rename: Option<&dyn Fn(&str) -> String>) -> String {
    let trimmed = heading.trim();
    match rename {
        Some(f) => f(trimmed),
        None => trimmed.to_string(),
    }
}

/// Drop every column that has no metadata entry.
///
/// Tags missing from the metadata are assumed to be irrelevant. Returns the
/// dropped tags in their original column order.
pub fn retain_documented(table: &mut MeasurementTable, metadata: &TagMap) -> Vec<String> {
    table.retain_columns(|tag| metadata.contains_key(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::TagMetadata;

    #[test]
    fn artifact_headings() {
        assert!(is_artifact_heading(""));
        assert!(is_artifact_heading("   "));
        assert!(is_artifact_heading("Unnamed: 4"));
        assert!(is_artifact_heading("level.Unnamed: 4"));
        assert!(!is_artifact_heading("FT-101"));
    }

    #[test]
    fn tag_name_trims_before_renaming() {
        let lower = |t: &str| t.to_lowercase();
        assert_eq!(tag_name("  FT-101 ", None), "FT-101");
        assert_eq!(tag_name("  FT-101 ", Some(&lower)), "ft-101");
    }

    #[test]
    fn undocumented_columns_are_dropped() {
        let mut table = MeasurementTable::new("time", vec!["t0".into()]);
        for tag in ["A", "B", "C"] {
            table.insert_column(tag, vec![1.0]).unwrap();
        }
        let md = TagMetadata {
            reference_string: String::new(),
            reference: None,
            description: String::new(),
            units: String::new(),
        };
        let metadata: TagMap = [("A".to_string(), md.clone()), ("C".to_string(), md)]
            .into_iter()
            .collect();

        let dropped = retain_documented(&mut table, &metadata);
        assert_eq!(dropped, vec!["B".to_string()]);
        assert_eq!(table.tags(), ["A".to_string(), "C".to_string()]);
    }
}
