//! Centralized validation and helper functions.

/// Maximum number of cells allowed in a single panel grid (DOS protection)
pub const MAX_CELLS: usize = 10_000;

/// Maximum number of markers allowed on a single panel
pub const MAX_MARKERS: usize = 500;

/// Maximum number of patient reaction rows in one file
pub const MAX_REACTIONS: usize = 100_000;

/// Maximum length of a marker name
pub const MAX_MARKER_NAME_LENGTH: usize = 32;

/// Validate a marker name: non-empty, bounded length, no whitespace or control
/// characters, and not one of the reaction symbols.
///
/// # Examples
///
/// ```
/// use antigram_solver::utils::validation::is_valid_marker_name;
///
/// assert!(is_valid_marker_name("Fya"));
/// assert!(is_valid_marker_name("Le(a)"));
/// assert!(!is_valid_marker_name(""));
/// assert!(!is_valid_marker_name("+"));
/// assert!(!is_valid_marker_name("K k"));
/// ```
#[must_use]
pub fn is_valid_marker_name(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_MARKER_NAME_LENGTH
        && !matches!(s, "+" | "0" | "-")
        && !s.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// Trim a marker name and validate it.
/// Returns None if the result is not a valid marker name.
#[must_use]
pub fn normalize_marker_name(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if is_valid_marker_name(trimmed) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Check if adding another cell would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new cell.
/// Returns an error message if adding would exceed the limit, None if safe to add.
///
/// # Example
/// ```ignore
/// if check_cell_limit(cells.len()).is_some() {
///     return Err(...);
/// }
/// cells.push(new_cell); // Safe to add
/// ```
#[must_use]
pub fn check_cell_limit(count: usize) -> Option<String> {
    check_limit(count, MAX_CELLS, "cells")
}

/// Same as [`check_cell_limit`], for patient reaction rows
#[must_use]
pub fn check_reaction_limit(count: usize) -> Option<String> {
    check_limit(count, MAX_REACTIONS, "reactions")
}

/// Check a complete marker list against [`MAX_MARKERS`]
#[must_use]
pub fn check_marker_limit(count: usize) -> Option<String> {
    if count > MAX_MARKERS {
        Some(format!(
            "Too many markers: {count} exceeds maximum of {MAX_MARKERS}"
        ))
    } else {
        None
    }
}

fn check_limit(count: usize, max: usize, what: &str) -> Option<String> {
    if count >= max {
        Some(format!(
            "Too many {what}: adding another would exceed maximum of {max}"
        ))
    } else {
        None
    }
}
