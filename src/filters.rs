// ABOUTME: Table allow-list filtering for a sync pass
// ABOUTME: Decides which enumerated tables participate and reports unmatched entries

use std::collections::HashSet;

use crate::config::WILDCARD;
use crate::types::SchemaTable;

/// Which tables take part in a sync pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFilter {
    /// Every table qualifies
    All,
    /// Only tables whose bare name is in the set
    Only(HashSet<String>),
}

impl SyncFilter {
    /// Builds a filter from the configured allow-list spec.
    ///
    /// `"*"` yields [`SyncFilter::All`]; anything else is split on commas,
    /// trimmed, and empty entries dropped. A `*` entry inside a list also
    /// means "everything".
    pub fn from_spec(spec: &str) -> Self {
        let spec = spec.trim();
        if spec == WILDCARD {
            return Self::All;
        }

        let names: HashSet<String> = spec
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();

        if names.is_empty() || names.contains(WILDCARD) {
            Self::All
        } else {
            Self::Only(names)
        }
    }

    /// Returns true if every table qualifies
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Determines if a table should be synced.
    ///
    /// A table qualifies when the filter is a wildcard, when its bare name is
    /// allow-listed, or when the table is literally named `*`.
    pub fn should_sync_table(&self, table: &SchemaTable) -> bool {
        if table.table == WILDCARD {
            return true;
        }

        match self {
            Self::All => true,
            Self::Only(names) => names.contains(&table.table),
        }
    }

    /// Allow-list entries that matched none of `synced`, sorted.
    ///
    /// Purely diagnostic: an unmatched entry is never an error.
    pub fn unmatched<'a>(&self, synced: impl IntoIterator<Item = &'a SchemaTable>) -> Vec<String> {
        let Self::Only(names) = self else {
            return Vec::new();
        };

        let seen: HashSet<&str> = synced.into_iter().map(|t| t.table.as_str()).collect();
        let mut unmatched: Vec<String> = names
            .iter()
            .filter(|name| !seen.contains(name.as_str()))
            .cloned()
            .collect();
        unmatched.sort();
        unmatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(schema: &str, name: &str) -> SchemaTable {
        SchemaTable::new(schema, name)
    }

    #[test]
    fn test_wildcard_syncs_everything() {
        let filter = SyncFilter::from_spec("*");

        assert!(filter.is_wildcard());
        assert!(filter.should_sync_table(&table("public", "orders")));
        assert!(filter.should_sync_table(&table("sales", "anything")));
    }

    #[test]
    fn test_allow_list_restricts_by_bare_name() {
        let filter = SyncFilter::from_spec("orders,customers");

        assert!(!filter.is_wildcard());
        assert!(filter.should_sync_table(&table("public", "orders")));
        assert!(filter.should_sync_table(&table("public", "customers")));
        assert!(filter.should_sync_table(&table("sales", "orders")));
        assert!(!filter.should_sync_table(&table("public", "logs")));
    }

    #[test]
    fn test_literal_star_table_always_qualifies() {
        let filter = SyncFilter::from_spec("orders");
        assert!(filter.should_sync_table(&table("public", "*")));
    }

    #[test]
    fn test_entries_are_trimmed() {
        let filter = SyncFilter::from_spec(" orders , customers ,");
        assert_eq!(
            filter,
            SyncFilter::Only(
                ["orders", "customers"]
                    .into_iter()
                    .map(String::from)
                    .collect()
            )
        );
    }

    #[test]
    fn test_star_inside_list_or_empty_spec_means_all() {
        assert!(SyncFilter::from_spec("orders,*").is_wildcard());
        assert!(SyncFilter::from_spec("").is_wildcard());
    }

    #[test]
    fn test_allow_list_is_case_sensitive() {
        let filter = SyncFilter::from_spec("Orders");
        assert!(!filter.should_sync_table(&table("public", "orders")));
    }

    #[test]
    fn test_unmatched_entries_are_reported_not_required() {
        let filter = SyncFilter::from_spec("orders,customers,ghost");
        let synced = vec![table("public", "orders"), table("public", "customers")];

        assert_eq!(filter.unmatched(&synced), vec!["ghost".to_string()]);
        assert!(SyncFilter::All.unmatched(&synced).is_empty());
    }
}
