//! Context assembly for the read-side pages.
//!
//! For every resolved (year, section, entry) triple this module computes
//! what the templates need: breadcrumbs, previous/next sibling links, the
//! yearly navigation window, preview thumbnail selections, and section
//! paging. All of it is plain data in `Serialize`-derived structs; the
//! renderer feeds them to Tera unchanged.
//!
//! # Sibling direction
//!
//! `prev` is the sibling at the lower index and `next` the sibling at the
//! higher index, at every level. For the years list — which is sorted
//! descending — this means `prev` points at the chronologically *newer*
//! year. That is what the original site shipped, and navigation labels on
//! the production templates assume it; kept as-is.

use crate::embed;
use crate::types::{Entry, ExternalLinksSection, ImageInfo, Section, SiteState, Year, YearKey};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Width of the yearly navigation window.
pub const YEARLY_NAVIGATION_YEARS: usize = 7;

/// Main-page sampling takes at most this many entries per section.
pub const MAX_MAIN_SECTION_ENTRIES: usize = 2;

/// Entries shown per section page before paging kicks in.
pub const MAX_SECTION_DISPLAY_ENTRIES: usize = 30;

/// Preview thumbnails per year block (main page) and per section block
/// (year page).
pub const PREVIEW_ENTRIES: usize = 5;

/// One breadcrumb: linked parent or unlinked final label.
#[derive(Debug, Clone, Serialize)]
pub struct Crumb {
    pub label: String,
    pub href: Option<String>,
}

/// A labelled link, used for sibling navigation and the `«`/`»` arrows.
#[derive(Debug, Clone, Serialize)]
pub struct NavLink {
    pub label: String,
    pub href: String,
}

/// One slot of the yearly navigation window.
#[derive(Debug, Clone, Serialize)]
pub struct YearSlot {
    pub label: String,
    pub href: String,
    pub current: bool,
}

/// The compact year strip shown near the header of every page.
#[derive(Debug, Clone, Serialize, Default)]
pub struct YearlyNavigation {
    /// `«` — the year just outside the newer end of the window.
    pub before: Option<NavLink>,
    pub years: Vec<YearSlot>,
    /// `»` — the year just outside the older end of the window.
    pub after: Option<NavLink>,
}

/// Thumbnail card data for one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryPreview {
    pub path: String,
    pub title: String,
    pub author: String,
    pub thumbnail: ImageInfo,
    pub sources: Vec<ImageInfo>,
}

impl EntryPreview {
    fn of(entry: &Entry) -> EntryPreview {
        EntryPreview {
            path: entry.path.clone(),
            title: entry.title.clone(),
            author: entry.author.clone(),
            thumbnail: entry.thumbnails.default.clone(),
            sources: entry.thumbnails.sources.clone(),
        }
    }
}

/// Section paging state: the current window plus prev/next page links.
#[derive(Debug, Clone, Serialize)]
pub struct Paging {
    pub offset: usize,
    pub prev: Option<String>,
    pub next: Option<String>,
}

// =========================================================================
// Page contexts
// =========================================================================

#[derive(Debug, Serialize)]
pub struct MainContext {
    pub title: String,
    pub breadcrumbs: Vec<Crumb>,
    pub yearly: YearlyNavigation,
    pub years: Vec<MainYearBlock>,
}

#[derive(Debug, Serialize)]
pub struct MainYearBlock {
    pub name: String,
    pub path: String,
    pub previews: Vec<EntryPreview>,
}

#[derive(Debug, Serialize)]
pub struct YearContext {
    pub title: String,
    pub breadcrumbs: Vec<Crumb>,
    pub yearly: YearlyNavigation,
    pub prev: Option<NavLink>,
    pub next: Option<NavLink>,
    pub sections: Vec<YearSectionBlock>,
}

#[derive(Debug, Serialize)]
pub struct YearSectionBlock {
    pub name: String,
    pub path: String,
    pub description: String,
    pub is_ranked: bool,
    pub previews: Vec<EntryPreview>,
}

#[derive(Debug, Serialize)]
pub struct SectionContext {
    pub title: String,
    pub breadcrumbs: Vec<Crumb>,
    pub yearly: YearlyNavigation,
    pub name: String,
    pub description: String,
    pub prev: Option<NavLink>,
    pub next: Option<NavLink>,
    pub entries: Vec<EntryPreview>,
    pub paging: Paging,
}

#[derive(Debug, Serialize)]
pub struct EntryContext {
    pub title: String,
    pub breadcrumbs: Vec<Crumb>,
    pub yearly: YearlyNavigation,
    pub author: String,
    pub description: String,
    pub external_links: Vec<ExternalLinksSection>,
    pub asset_html: String,
    pub prev: Option<NavLink>,
    pub next: Option<NavLink>,
}

// =========================================================================
// Builders
// =========================================================================

pub fn main_context(state: &SiteState) -> MainContext {
    let mut rng = rand::rng();
    let years = state
        .years
        .iter()
        .map(|year| MainYearBlock {
            name: year.name.clone(),
            path: year.path.clone(),
            previews: random_select_entries(year, PREVIEW_ENTRIES, &mut rng)
                .into_iter()
                .map(EntryPreview::of)
                .collect(),
        })
        .collect();

    MainContext {
        title: String::new(),
        breadcrumbs: vec![Crumb {
            label: state.range_label(),
            href: None,
        }],
        yearly: yearly_navigation(state, None),
        years,
    }
}

pub fn year_context(site_root: &str, state: &SiteState, year: &Year) -> YearContext {
    let mut rng = rand::rng();
    let index = state.year_index(year.key).unwrap_or(0);
    let (prev, next) = adjacent(&state.years, index, |y| NavLink {
        label: y.name.clone(),
        href: y.path.clone(),
    });

    let sections = year
        .sections
        .iter()
        .map(|section| YearSectionBlock {
            name: section.name.clone(),
            path: section.path.clone(),
            description: section.description.clone(),
            is_ranked: section.is_ranked,
            previews: peek_section_entries(section, PREVIEW_ENTRIES, &mut rng)
                .into_iter()
                .map(EntryPreview::of)
                .collect(),
        })
        .collect();

    YearContext {
        title: year.name.clone(),
        breadcrumbs: vec![
            Crumb {
                label: state.range_label(),
                href: Some(format!("{site_root}/")),
            },
            Crumb {
                label: year.name.clone(),
                href: None,
            },
        ],
        yearly: yearly_navigation(state, Some(year.key)),
        prev,
        next,
        sections,
    }
}

pub fn section_context(
    site_root: &str,
    state: &SiteState,
    year: &Year,
    section: &Section,
    query: Option<&str>,
) -> SectionContext {
    let index = year
        .sections
        .iter()
        .position(|s| s.key == section.key)
        .unwrap_or(0);
    let (prev, next) = adjacent(&year.sections, index, |s| NavLink {
        label: s.name.clone(),
        href: s.path.clone(),
    });

    let paging = section_paging(&section.path, section.entries.len(), query);
    let window_start = paging.offset.min(section.entries.len());
    let window_end = (paging.offset + MAX_SECTION_DISPLAY_ENTRIES).min(section.entries.len());
    let entries = section.entries[window_start..window_end]
        .iter()
        .map(EntryPreview::of)
        .collect();

    SectionContext {
        title: section.name.clone(),
        breadcrumbs: vec![
            Crumb {
                label: state.range_label(),
                href: Some(format!("{site_root}/")),
            },
            Crumb {
                label: year.name.clone(),
                href: Some(year.path.clone()),
            },
            Crumb {
                label: section.name.clone(),
                href: None,
            },
        ],
        yearly: yearly_navigation(state, Some(year.key)),
        name: section.name.clone(),
        description: section.description.clone(),
        prev,
        next,
        entries,
        paging,
    }
}

pub fn entry_context(
    site_root: &str,
    state: &SiteState,
    year: &Year,
    section: &Section,
    entry: &Entry,
) -> EntryContext {
    let index = section
        .entries
        .iter()
        .position(|e| e.key == entry.key)
        .unwrap_or(0);
    let (prev, next) = adjacent(&section.entries, index, |e| NavLink {
        label: e.title.clone(),
        href: e.path.clone(),
    });

    EntryContext {
        title: entry.title.clone(),
        breadcrumbs: vec![
            Crumb {
                label: state.range_label(),
                href: Some(format!("{site_root}/")),
            },
            Crumb {
                label: year.name.clone(),
                href: Some(year.path.clone()),
            },
            Crumb {
                label: section.name.clone(),
                href: Some(section.path.clone()),
            },
            Crumb {
                label: entry.title.clone(),
                href: None,
            },
        ],
        yearly: yearly_navigation(state, Some(year.key)),
        author: entry.author.clone(),
        description: entry.description.clone(),
        external_links: entry.external_links.clone(),
        asset_html: embed::asset_html(&entry.asset),
        prev,
        next,
    }
}

// =========================================================================
// Navigation primitives
// =========================================================================

/// Previous/next siblings by list position: `prev` is the lower index,
/// `next` the higher. See the module docs for why this is not flipped for
/// the descending years list.
fn adjacent<T>(
    items: &[T],
    index: usize,
    to_link: impl Fn(&T) -> NavLink,
) -> (Option<NavLink>, Option<NavLink>) {
    let prev = index.checked_sub(1).map(|i| to_link(&items[i]));
    let next = items.get(index + 1).map(&to_link);
    (prev, next)
}

/// The bounded window of year links around the current year.
///
/// At most [`YEARLY_NAVIGATION_YEARS`] wide, centered on the current year
/// (the newest year when there is none, i.e. on the main page). When the
/// centering clamps at an end of the known range the window is widened by
/// one slot on the opposite side. `«`/`»` arrows point at the year just
/// outside each end of the window when one exists.
pub fn yearly_navigation(state: &SiteState, current: Option<YearKey>) -> YearlyNavigation {
    let n = state.years.len();
    if n == 0 {
        return YearlyNavigation::default();
    }
    let index = current
        .and_then(|key| state.year_index(key))
        .unwrap_or(0);

    let half = YEARLY_NAVIGATION_YEARS / 2;
    let mut start = index.saturating_sub(half);
    let mut end = (index + half).min(n - 1);
    if index < half {
        end = (end + 1).min(n - 1);
    }
    if index + half > n - 1 {
        start = start.saturating_sub(1);
    }

    let link = |year: &Year| NavLink {
        label: year.name.clone(),
        href: year.path.clone(),
    };

    YearlyNavigation {
        before: (start > 0).then(|| link(&state.years[start - 1])),
        years: state.years[start..=end]
            .iter()
            .map(|year| YearSlot {
                label: year.name.clone(),
                href: year.path.clone(),
                current: Some(year.key) == current,
            })
            .collect(),
        after: (end < n - 1).then(|| link(&state.years[end + 1])),
    }
}

/// Parse and normalize the `offset` query parameter, then build the
/// prev/next page links for a section of `total` entries.
///
/// Offsets must be non-negative multiples of the page size; anything else
/// resets to zero. The link back to the first page is the bare section
/// URL so it shares a cache slot with direct visits.
pub fn section_paging(section_path: &str, total: usize, query: Option<&str>) -> Paging {
    let offset = parse_offset(query);

    let prev = (offset > 0).then(|| {
        if offset == MAX_SECTION_DISPLAY_ENTRIES {
            section_path.to_string()
        } else {
            format!(
                "{section_path}?offset={}",
                offset - MAX_SECTION_DISPLAY_ENTRIES
            )
        }
    });
    let next = (offset + MAX_SECTION_DISPLAY_ENTRIES < total).then(|| {
        format!(
            "{section_path}?offset={}",
            offset + MAX_SECTION_DISPLAY_ENTRIES
        )
    });

    Paging { offset, prev, next }
}

fn parse_offset(query: Option<&str>) -> usize {
    let query = match query {
        Some(query) => query,
        None => return 0,
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("offset=") {
            match value.parse::<usize>() {
                Ok(n) if n % MAX_SECTION_DISPLAY_ENTRIES == 0 => return n,
                _ => return 0,
            }
        }
    }
    0
}

// =========================================================================
// Preview selection
// =========================================================================

/// Randomly select up to `amount` entries across a year's sections,
/// taking at most [`MAX_MAIN_SECTION_ENTRIES`] from each.
///
/// Walks a shuffled permutation of *doubled* section indices — each
/// section appears exactly twice, so no section can contribute more than
/// two entries — drawing one random entry per visit and skipping
/// duplicates and empty sections.
pub fn random_select_entries<'a>(
    year: &'a Year,
    amount: usize,
    rng: &mut impl Rng,
) -> Vec<&'a Entry> {
    let total_sections = year.sections.len();
    if total_sections == 0 {
        return Vec::new();
    }
    let mut indices: Vec<usize> = (0..total_sections * MAX_MAIN_SECTION_ENTRIES).collect();
    indices.shuffle(rng);

    let mut result: Vec<&Entry> = Vec::new();
    for raw in indices {
        if result.len() == amount {
            break;
        }
        let section = &year.sections[raw % total_sections];
        if section.entries.is_empty() {
            continue;
        }
        let entry = &section.entries[rng.random_range(0..section.entries.len())];
        if result.iter().any(|picked| picked.path == entry.path) {
            continue;
        }
        result.push(entry);
    }
    result
}

/// Take a preview sample of a section's entries.
///
/// A ranked section that is no longer ongoing shows its top entries in
/// section order, promoting the jury's picks. Everything else gets a
/// uniform random sample without duplicates.
pub fn peek_section_entries<'a>(
    section: &'a Section,
    amount: usize,
    rng: &mut impl Rng,
) -> Vec<&'a Entry> {
    let amount = amount.min(section.entries.len());
    if section.is_ranked && !section.is_ongoing {
        return section.entries[..amount].iter().collect();
    }
    rand::seq::index::sample(rng, section.entries.len(), amount)
        .iter()
        .map(|i| &section.entries[i])
        .collect()
}
