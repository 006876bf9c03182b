//! Property-based tests for the flow machines and the aggregator

use super::aggregate::summarize_by_category;
use super::effect::Effect;
use super::event::FlowEvent;
use super::state::{FlowState, LineItem, SplitState};
use super::transition::transition;
use proptest::prelude::*;

fn split_result_message(total: i64, people: i64) -> String {
    let state = FlowState::Split(SplitState::AwaitingPeople { total });
    let result = transition(&state, FlowEvent::Text(people.to_string()));
    assert_eq!(result.next, None, "terminal turn must delete state");
    match &result.effects[..] {
        [Effect::SendText(msg)] => msg.clone(),
        other => panic!("unexpected effects: {other:?}"),
    }
}

fn line_item_strategy() -> impl Strategy<Value = LineItem> {
    let category = prop_oneof![
        Just("いつもごはん".to_string()),
        Just("ぜいたくごはん".to_string()),
        Just("日用品".to_string()),
        Just("住居費".to_string()),
        Just("旅行".to_string()),
        Just("その他".to_string()),
        // the extractor can emit anything; unknown strings are valid groups
        "[a-z]{1,6}",
    ];
    (category, 0i64..100_000, "[a-zあ-ん]{1,8}").prop_map(|(category, amount, name)| LineItem {
        name,
        category,
        amount,
        date: None,
    })
}

proptest! {
    #[test]
    fn per_person_share_is_exact_integer_ceiling(total in 1i64..=i64::MAX, people in 1i64..10_000) {
        let expected = (total as u64).div_ceil(people as u64) as i64;
        let msg = split_result_message(total, people);
        prop_assert!(msg.contains(&format!("**{expected}円**")), "message: {msg}");
        // the share always covers the total without overshooting by a full head
        if let Some(covered) = expected.checked_mul(people) {
            prop_assert!(covered >= total);
        }
        prop_assert!((expected - 1) * people < total);
    }

    #[test]
    fn aggregator_is_order_independent(
        items in proptest::collection::vec(line_item_strategy(), 0..20),
        rotate_by in 0usize..20,
    ) {
        let mut reversed = items.clone();
        reversed.reverse();
        let mut rotated = items.clone();
        if !rotated.is_empty() {
            let mid = rotate_by % rotated.len();
            rotated.rotate_left(mid);
        }
        let baseline = summarize_by_category("店", &items);
        prop_assert_eq!(&baseline, &summarize_by_category("店", &reversed));
        prop_assert_eq!(&baseline, &summarize_by_category("店", &rotated));
    }

    #[test]
    fn aggregator_conserves_the_total(items in proptest::collection::vec(line_item_strategy(), 0..20)) {
        let lines = summarize_by_category("店", &items);
        let input_sum: i64 = items.iter().map(|i| i.amount).sum();
        let output_sum: i64 = lines.iter().map(|l| l.amount).sum();
        prop_assert_eq!(input_sum, output_sum);
        // one line per distinct category
        let mut categories: Vec<_> = items.iter().map(|i| i.category.clone()).collect();
        categories.sort();
        categories.dedup();
        prop_assert_eq!(lines.len(), categories.len());
    }

    #[test]
    fn invalid_amount_never_mutates_split_state(text in "[a-zA-Zあ-ん]{1,10}", total in 1i64..100_000) {
        let awaiting_total = FlowState::Split(SplitState::AwaitingTotal);
        let result = transition(&awaiting_total, FlowEvent::Text(text.clone()));
        prop_assert_eq!(result.next, Some(awaiting_total));

        let awaiting_people = FlowState::Split(SplitState::AwaitingPeople { total });
        let result = transition(&awaiting_people, FlowEvent::Text(text));
        prop_assert_eq!(result.next, Some(awaiting_people));
    }

    #[test]
    fn non_positive_amounts_are_rejected(n in -100_000i64..=0) {
        let state = FlowState::Split(SplitState::AwaitingTotal);
        let result = transition(&state, FlowEvent::Text(n.to_string()));
        prop_assert_eq!(result.next, Some(state));
    }
}
