//! Field checks shared by the create/update payloads.

use utils_core::response::ErrorDetails;

pub(crate) fn check_length(
    details: &mut ErrorDetails,
    field: &str,
    label: &str,
    value: &str,
    max: usize,
) {
    let len = value.trim().chars().count();
    if len == 0 {
        details.insert(field.to_string(), format!("{label} is required"));
    } else if len > max {
        details.insert(
            field.to_string(),
            format!("{label} must be at most {max} characters"),
        );
    }
}

/// `#RRGGBB`, either case.
pub(crate) fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub(crate) fn check_color(details: &mut ErrorDetails, field: &str, value: Option<&str>) {
    if let Some(color) = value
        && !is_hex_color(color)
    {
        details.insert(
            field.to_string(),
            "Color must be a valid hex color (e.g. #3B82F6)".to_string(),
        );
    }
}

pub(crate) fn finish(details: ErrorDetails) -> Result<(), ErrorDetails> {
    if details.is_empty() { Ok(()) } else { Err(details) }
}
