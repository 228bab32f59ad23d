//! Frontier discovery
//!
//! Five independent sources enumerate listed items: the paginated listing
//! API, the two-character search sweep, the sitemap, the homepage payload,
//! and repo pages. The convergence controller repeats listing passes until
//! the set of known repos stops moving. Results are combined with a
//! first-writer-wins merge.

pub mod convergence;
pub mod entries;
pub mod homepage;
pub mod listing;
pub mod merge;
pub mod repo_pages;
pub mod search;
pub mod sitemap;

pub use convergence::{
    ControllerState, ConvergenceController, ConvergenceOutcome, ConvergenceTracker, ListingSource,
    SiteListing,
};
pub use entries::{collect_ranked_entries, match_item_path, parse_listing_entry, skills_array};
pub use homepage::{parse_homepage_html, run_homepage_discovery};
pub use listing::crawl_listing_once;
pub use merge::merge_frontiers;
pub use repo_pages::{expand_from_repo_pages, parse_repo_page};
pub use search::{
    generate_two_char_queries, run_fallback_queries, run_search_sweep, search_one_query,
    SearchSweep, SweepOptions,
};
pub use sitemap::{parse_sitemap_xml, run_sitemap_discovery};
