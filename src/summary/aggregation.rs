//! Totals for the monthly summary.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{expense::Expense, money::Amount};

/// The category for expenses with neither a budget item nor a category.
pub(super) const OTHER_CATEGORY: &str = "Otros";

/// `part / whole * 100` rounded half-to-even to two decimal places, or
/// `None` if `whole` is not positive.
pub(super) fn percentage_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole <= Decimal::ZERO {
        return None;
    }

    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|percentage| {
            percentage.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        })
}

/// The percentage of `total_income` left after expenses, or zero if there was no income.
pub(super) fn savings_percentage(total_income: Decimal, balance: Decimal) -> Decimal {
    percentage_of(balance, total_income).unwrap_or(Decimal::ZERO)
}

/// Sum `expenses` by the name of their budget item, falling back to their
/// category and then [OTHER_CATEGORY].
pub(super) fn group_expenses_by_category(expenses: &[Expense]) -> BTreeMap<String, Amount> {
    let mut totals = BTreeMap::new();

    for expense in expenses {
        let category = expense
            .display_name()
            .unwrap_or_else(|| OTHER_CATEGORY.to_owned());
        let total = totals.entry(category).or_insert(Amount::ZERO);
        *total = *total + expense.amount;
    }

    totals
}

#[cfg(test)]
mod aggregation_tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use time::{OffsetDateTime, macros::date};

    use crate::{
        budget::BudgetItemName,
        expense::{Expense, ExpenseKind},
        money::Amount,
    };

    use super::{group_expenses_by_category, percentage_of, savings_percentage};

    fn create_test_expense(budget_item: Option<&str>, category: &str, amount: &str) -> Expense {
        Expense {
            id: 1,
            budget_item_id: budget_item.map(|_| 1),
            budget_item_name: budget_item.map(BudgetItemName::new_unchecked),
            amount: Amount::from_str(amount).unwrap(),
            date: date!(2025 - 03 - 01),
            kind: ExpenseKind::Variable,
            category: category.to_owned(),
            note: String::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn savings_percentage_is_zero_without_income() {
        assert_eq!(
            savings_percentage(Decimal::ZERO, Decimal::new(-50, 0)),
            Decimal::ZERO
        );
    }

    #[test]
    fn savings_percentage_rounds_to_two_places() {
        let percentage = savings_percentage(Decimal::new(3, 0), Decimal::new(1, 0));

        assert_eq!(percentage, Decimal::new(3333, 2));
    }

    #[test]
    fn savings_percentage_can_be_negative() {
        let percentage = savings_percentage(Decimal::new(100, 0), Decimal::new(-25, 0));

        assert_eq!(percentage, Decimal::new(-25, 0));
    }

    #[test]
    fn percentage_rounds_half_to_even() {
        // 1 / 800 * 100 = 0.125
        assert_eq!(
            percentage_of(Decimal::ONE, Decimal::new(800, 0)),
            Some(Decimal::new(12, 2))
        );
    }

    #[test]
    fn groups_by_budget_item_then_category_then_other() {
        let expenses = [
            create_test_expense(Some("Supermercado"), "", "10"),
            create_test_expense(Some("Supermercado"), "ignorada", "5.50"),
            create_test_expense(None, "Regalos", "3"),
            create_test_expense(None, "", "1"),
            create_test_expense(None, "", "2"),
        ];

        let totals = group_expenses_by_category(&expenses);

        assert_eq!(totals.len(), 3);
        assert_eq!(totals["Supermercado"], Amount::from_str("15.50").unwrap());
        assert_eq!(totals["Regalos"], Amount::from_str("3").unwrap());
        assert_eq!(totals["Otros"], Amount::from_str("3").unwrap());
    }
}
