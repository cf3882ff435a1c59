//! Artifact identifiers: slugs, date anchors, and canonical filenames.
//!
//! An identifier looks like `artifact/<tool>_<kind>_<YYYY>_<MM>_<DD>_<topic words>`. The
//! first run of three numeric tokens with lengths 4/2/2 is the date anchor.

use chrono::NaiveDate;

use crate::core::errors::{GvaError, Result};

/// Namespace every committed session id lives under.
pub const ARTIFACT_NAMESPACE: &str = "artifact/";

/// Lowercase, keep alphanumerics, map `-`/`_`/space to `-`, collapse and trim dashes.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            out.push(ch);
        } else if matches!(ch, '-' | '_' | ' ') && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn is_digits(token: &str, len: usize) -> bool {
    token.len() == len && token.bytes().all(|b| b.is_ascii_digit())
}

/// Index of the first `YYYY MM DD` token triple.
fn date_anchor(parts: &[&str]) -> Option<usize> {
    parts
        .windows(3)
        .position(|w| is_digits(w[0], 4) && is_digits(w[1], 2) && is_digits(w[2], 2))
}

fn tail(artifact_id: &str) -> Result<&str> {
    artifact_id
        .strip_prefix(ARTIFACT_NAMESPACE)
        .ok_or_else(|| GvaError::InvalidArtifactId {
            artifact_id: artifact_id.to_string(),
            reason: format!("must start with '{ARTIFACT_NAMESPACE}'"),
        })
}

/// `YYYY-MM-DD` from the date anchor, if the identifier carries one.
#[must_use]
pub fn date_from_artifact_id(artifact_id: &str) -> Option<String> {
    let tail = artifact_id.strip_prefix(ARTIFACT_NAMESPACE).unwrap_or(artifact_id);
    let parts: Vec<&str> = tail.split('_').collect();
    let i = date_anchor(&parts)?;
    Some(format!("{}-{}-{}", parts[i], parts[i + 1], parts[i + 2]))
}

/// Canonical filename for a session artifact.
///
/// With a date anchor: `YYYY-MM-DD-<slug of the tokens after it>.json` (the whole tail is
/// slugged when nothing follows the date). Without one: `<today>-<slug of tail>.json`.
pub fn infer_filename(artifact_id: &str, today: NaiveDate) -> Result<String> {
    let tail = tail(artifact_id)?;
    let parts: Vec<&str> = tail.split('_').collect();

    let Some(i) = date_anchor(&parts) else {
        return Ok(format!("{}-{}.json", today.format("%Y-%m-%d"), slugify(tail)));
    };

    let rest = &parts[i + 3..];
    let slug = if rest.is_empty() {
        slugify(tail)
    } else {
        slugify(&rest.join("-"))
    };
    Ok(format!(
        "{}-{}-{}-{slug}.json",
        parts[i],
        parts[i + 1],
        parts[i + 2]
    ))
}

/// `YYYY-MM-DD` prefix of a filename such as `2026-02-11-topic.json`.
#[must_use]
pub fn date_from_filename(file_name: &str) -> Option<String> {
    let prefix = file_name.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        .ok()
        .map(|_| prefix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn dated_id_round_trips_to_filename_and_date() {
        let id = "artifact/chatgpt_session_2026_02_11_second_brain_architecture";
        assert_eq!(
            infer_filename(id, today()).unwrap(),
            "2026-02-11-second-brain-architecture.json"
        );
        assert_eq!(date_from_artifact_id(id).as_deref(), Some("2026-02-11"));
    }

    #[test]
    fn undated_id_uses_today() {
        assert_eq!(
            infer_filename("artifact/codex_Quick Notes", today()).unwrap(),
            "2026-03-01-codex-quick-notes.json"
        );
        assert_eq!(date_from_artifact_id("artifact/codex_notes"), None);
    }

    #[test]
    fn date_at_end_slugs_whole_tail() {
        assert_eq!(
            infer_filename("artifact/codex_2026_02_11", today()).unwrap(),
            "2026-02-11-codex-2026-02-11.json"
        );
    }

    #[test]
    fn first_anchor_wins() {
        let id = "artifact/x_2025_12_31_then_2026_01_01";
        assert_eq!(infer_filename(id, today()).unwrap(), "2025-12-31-then-2026-01-01.json");
    }

    #[test]
    fn missing_namespace_is_rejected() {
        let err = infer_filename("session/2026_02_11_x", today()).unwrap_err();
        assert_eq!(err.code(), "GVA-2001");
    }

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("  Hello__World--Again! "), "hello-world-again");
        assert_eq!(slugify("___"), "");
        assert_eq!(slugify("Émile Zola"), "émile-zola");
    }

    #[test]
    fn filename_date_prefix_must_be_a_real_date() {
        assert_eq!(
            date_from_filename("2026-02-11-topic.json").as_deref(),
            Some("2026-02-11")
        );
        assert_eq!(date_from_filename("2026-13-11-topic.json"), None);
        assert_eq!(date_from_filename("notes.json"), None);
    }
}
