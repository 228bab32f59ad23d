//! First-writer-wins frontier merge

use crate::model::Frontier;

/// Merges frontiers in priority order
///
/// For a key present in several inputs, the value from the earliest input
/// wins. Keys present in only one input are taken as-is, so the result for
/// disjoint inputs does not depend on their order.
pub fn merge_frontiers<I>(groups: I) -> Frontier
where
    I: IntoIterator<Item = Frontier>,
{
    let mut merged = Frontier::new();
    for group in groups {
        for (id, item) in group {
            merged.entry(id).or_insert(item);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscoveredItem, DiscoveryMethod};

    fn frontier(method: DiscoveryMethod, ids: &[&str]) -> Frontier {
        ids.iter()
            .map(|id| {
                let item = DiscoveredItem::new("acme", "tools", id, None, method);
                (item.id.clone(), item)
            })
            .collect()
    }

    #[test]
    fn test_first_writer_wins() {
        let a = frontier(DiscoveryMethod::PaginatedApi, &["shared", "only-a"]);
        let b = frontier(DiscoveryMethod::Sitemap, &["Shared", "only-b"]);

        let merged = merge_frontiers([a, b]);
        assert_eq!(merged.len(), 3);

        let shared = merged.values().find(|i| i.item_id == "shared").unwrap();
        assert_eq!(shared.discovered_via, DiscoveryMethod::PaginatedApi);
    }

    #[test]
    fn test_disjoint_inputs_are_order_independent() {
        let a = frontier(DiscoveryMethod::PaginatedApi, &["one", "two"]);
        let b = frontier(DiscoveryMethod::RepoPage, &["three"]);

        let ab = merge_frontiers([a.clone(), b.clone()]);
        let ba = merge_frontiers([b, a]);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge_frontiers(Vec::<Frontier>::new()).is_empty());
        assert!(merge_frontiers([Frontier::new(), Frontier::new()]).is_empty());
    }
}
