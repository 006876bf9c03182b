//! Receipt line-item aggregation

use super::state::LineItem;
use std::collections::BTreeMap;

/// A per-category total synthesized from a receipt's line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLine {
    /// Synthetic item name, `{merchant} - {category}`.
    pub name: String,
    pub category: String,
    pub amount: i64,
}

/// Group line items by exact category string and sum their amounts.
///
/// Unknown category strings form their own group rather than being rejected.
/// Output is sorted by category so ledger writes happen in a deterministic
/// order.
pub fn summarize_by_category(merchant: &str, items: &[LineItem]) -> Vec<CategoryLine> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for item in items {
        *totals.entry(item.category.as_str()).or_insert(0) += item.amount;
    }

    totals
        .into_iter()
        .map(|(category, amount)| CategoryLine {
            name: format!("{merchant} - {category}"),
            category: category.to_string(),
            amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, category: &str, amount: i64) -> LineItem {
        LineItem {
            name: name.to_string(),
            category: category.to_string(),
            amount,
            date: None,
        }
    }

    #[test]
    fn groups_and_sums_by_category() {
        let items = vec![
            item("牛乳", "いつもごはん", 200),
            item("パン", "いつもごはん", 150),
            item("ケーキ", "ぜいたくごはん", 400),
        ];
        let lines = summarize_by_category("スーパーABC", &items);

        assert_eq!(lines.len(), 2);
        let everyday = lines.iter().find(|l| l.category == "いつもごはん").unwrap();
        assert_eq!(everyday.amount, 350);
        assert_eq!(everyday.name, "スーパーABC - いつもごはん");
        let luxury = lines.iter().find(|l| l.category == "ぜいたくごはん").unwrap();
        assert_eq!(luxury.amount, 400);
    }

    #[test]
    fn unknown_category_passes_through_as_its_own_group() {
        let items = vec![item("謎の品", "ガジェット", 1000)];
        let lines = summarize_by_category("店", &items);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].category, "ガジェット");
        assert_eq!(lines[0].amount, 1000);
    }

    #[test]
    fn output_is_sorted_by_category() {
        let items = vec![
            item("b", "旅行", 1),
            item("a", "いつもごはん", 2),
            item("c", "日用品", 3),
        ];
        let categories: Vec<_> = summarize_by_category("店", &items)
            .into_iter()
            .map(|l| l.category)
            .collect();
        let mut sorted = categories.clone();
        sorted.sort();
        assert_eq!(categories, sorted);
    }

    #[test]
    fn empty_input_produces_no_lines() {
        assert!(summarize_by_category("店", &[]).is_empty());
    }
}
