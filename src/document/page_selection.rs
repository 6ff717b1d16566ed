//! Page selection parsing
//!
//! Grammar: `all` | part (`,` part)*, where a part is a page number or an
//! inclusive `start-end` range. Whitespace is ignored. Pages are 1-based.

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Page selection cannot be empty")]
    Empty,

    #[error("Invalid range format in {0}")]
    InvalidRange(String),

    #[error("Invalid page number: {0}")]
    InvalidPage(String),
}

/// Parse `selection` against a document of `total_pages` pages.
///
/// Returns the selected pages sorted and de-duplicated.
pub fn parse_page_selection(selection: &str, total_pages: u32) -> Result<Vec<u32>, SelectionError> {
    let compact: String = selection.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(SelectionError::Empty);
    }
    if compact.eq_ignore_ascii_case("all") {
        return Ok((1..=total_pages).collect());
    }

    let in_range = |page: u32| (1..=total_pages).contains(&page);
    let mut pages = BTreeSet::new();

    for part in compact.split(',') {
        if let Some((start, end)) = part.split_once('-') {
            let invalid = || SelectionError::InvalidRange(part.to_string());
            let start: u32 = start.parse().map_err(|_| invalid())?;
            let end: u32 = end.parse().map_err(|_| invalid())?;
            if start > end || !in_range(start) || !in_range(end) {
                return Err(invalid());
            }
            pages.extend(start..=end);
        } else {
            let page: u32 = part
                .parse()
                .map_err(|_| SelectionError::InvalidPage(part.to_string()))?;
            if !in_range(page) {
                return Err(SelectionError::InvalidPage(part.to_string()));
            }
            pages.insert(page);
        }
    }

    Ok(pages.into_iter().collect())
}
