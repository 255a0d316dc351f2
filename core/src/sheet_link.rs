use crate::error::SyncError;

/// Host and path every accepted source link must contain.
pub const SHEETS_MARKER: &str = "docs.google.com/spreadsheets";

const EDIT_SEGMENT: &str = "/edit";
const EXPORT_SEGMENT: &str = "/export";
const CSV_EXPORT: &str = "/export?format=csv";

pub fn validate(link: &str) -> Result<(), SyncError> {
    if link.trim().is_empty() || !link.contains(SHEETS_MARKER) {
        return Err(SyncError::InvalidSource);
    }
    Ok(())
}

/// Rewrites a share link into its CSV export URL.
///
/// `.../d/<id>/edit?usp=sharing` becomes `.../d/<id>/export?format=csv`,
/// a bare document link gets the export suffix, and a link that already
/// points at an export is returned untouched.
pub fn normalize(link: &str) -> String {
    let link = link.trim();
    if let Some((base, _)) = link.split_once(EDIT_SEGMENT) {
        format!("{base}{CSV_EXPORT}")
    } else if !link.contains(EXPORT_SEGMENT) {
        let base = link.strip_suffix('/').unwrap_or(link);
        format!("{base}{CSV_EXPORT}")
    } else {
        link.to_string()
    }
}

pub fn export_url(link: &str) -> Result<String, SyncError> {
    validate(link)?;
    Ok(normalize(link))
}
