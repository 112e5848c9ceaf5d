use anyhow::anyhow;
use uuid::Uuid;

use crate::model::Subject;

/// Shown wherever an event references a subject that no longer exists.
pub const MISSING_SUBJECT_LABEL: &str = "(deleted subject)";

pub const DEFAULT_SUBJECT_COLOR: &str = "#3b82f6";

/// Suggest a code for a new subject: `M` plus a zero-padded sequence number,
/// one past the highest auto-allocated code already present. Hand-written
/// codes (`MAT301`, `CS101`) never participate, and deleting a subject
/// cannot cause the next allocation to collide with a survivor.
pub fn next_code(existing: &[Subject]) -> String {
    let highest = existing
        .iter()
        .filter_map(|subject| parse_auto_code(&subject.code))
        .max()
        .unwrap_or(0);
    format!("M{:02}", highest + 1)
}

fn parse_auto_code(code: &str) -> Option<u32> {
    let digits = code.strip_prefix('M')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Resolve the display name for an event's subject reference. `None` when
/// the event has no subject; the placeholder when the reference dangles.
pub fn resolve_name(subjects: &[Subject], subject_id: Option<Uuid>) -> Option<String> {
    let id = subject_id?;
    Some(
        subjects
            .iter()
            .find(|subject| subject.id == id)
            .map(|subject| subject.name.clone())
            .unwrap_or_else(|| MISSING_SUBJECT_LABEL.to_string()),
    )
}

/// Find a subject by code (case-insensitive) or by uuid / unique uuid prefix.
pub fn find_subject<'a>(subjects: &'a [Subject], needle: &str) -> anyhow::Result<&'a Subject> {
    let needle = needle.trim();

    if let Some(found) = subjects
        .iter()
        .find(|subject| subject.code.eq_ignore_ascii_case(needle))
    {
        return Ok(found);
    }

    let lower = needle.to_ascii_lowercase();
    let mut matches = subjects
        .iter()
        .filter(|subject| subject.id.to_string().starts_with(&lower));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no subject matches: {needle}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("subject reference is ambiguous: {needle}"));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{MISSING_SUBJECT_LABEL, find_subject, next_code, resolve_name};
    use crate::model::Subject;

    fn subject(code: &str) -> Subject {
        Subject {
            id: Uuid::new_v4(),
            name: format!("Subject {code}"),
            code: code.to_string(),
            location: None,
            color: "#3b82f6".to_string(),
        }
    }

    #[test]
    fn first_code_is_m01() {
        assert_eq!(next_code(&[]), "M01");
    }

    #[test]
    fn nine_allocated_codes_yield_m10() {
        let subjects: Vec<Subject> = (1..=9).map(|n| subject(&format!("M{n:02}"))).collect();
        assert_eq!(next_code(&subjects), "M10");
    }

    #[test]
    fn hand_written_codes_do_not_participate() {
        let subjects = vec![subject("MAT301"), subject("CS101"), subject("M03")];
        assert_eq!(next_code(&subjects), "M04");
    }

    #[test]
    fn delete_then_add_does_not_reuse_a_live_code() {
        let mut subjects = vec![subject("M01"), subject("M02"), subject("M03")];
        subjects.remove(0);
        assert_eq!(next_code(&subjects), "M04");
    }

    #[test]
    fn resolve_name_degrades_to_placeholder() {
        let known = subject("M01");
        let subjects = vec![known.clone()];

        assert_eq!(resolve_name(&subjects, None), None);
        assert_eq!(
            resolve_name(&subjects, Some(known.id)).as_deref(),
            Some(known.name.as_str())
        );
        assert_eq!(
            resolve_name(&subjects, Some(Uuid::new_v4())).as_deref(),
            Some(MISSING_SUBJECT_LABEL)
        );
    }

    #[test]
    fn find_subject_by_code_or_id_prefix() {
        let subjects = vec![subject("M01"), subject("MAT301")];

        assert_eq!(find_subject(&subjects, "mat301").expect("by code").code, "MAT301");

        let prefix = &subjects[0].id.to_string()[..8];
        assert_eq!(find_subject(&subjects, prefix).expect("by prefix").code, "M01");

        assert!(find_subject(&subjects, "nope").is_err());
    }
}
