//! Savings suggestions for the monthly summary.

use rust_decimal::Decimal;

use crate::{budget::BudgetItemView, money::format_currency};

use super::aggregation::percentage_of;

const SPENDING_WELL: &str = "Vas administrando bien tu dinero. Considera destinar parte del excedente a un fondo de inversión.";
const OVERSPENT_INCOME: &str = "Has gastado más de lo que ingresó este mes. Revisa tus gastos variables para realizar ajustes.";
const NO_INCOME: &str = "Aún no registras ingresos este mes. Recuerda ingresarlos para obtener un balance realista.";
const POSITIVE_BALANCE: &str = "Excelente, tienes un saldo positivo. Define un objetivo de ahorro para mantener esta tendencia.";
const NEGATIVE_BALANCE: &str = "Tu saldo es negativo. Intenta posponer compras no esenciales para equilibrar tus finanzas.";

/// Spending up to this percentage of income counts as managing money well.
const HEALTHY_SPENDING_PERCENTAGE: Decimal = Decimal::from_parts(85, 0, 0, false, 0);

/// Build the suggestions for a month with `total_income` and `total_expenses`.
///
/// The suggestions are, in order: one about the share of income spent, one
/// about the balance, and one for each budget item that is over or close to
/// its limit, in the order of `budget_items`.
pub(super) fn build_suggestions(
    total_income: Decimal,
    total_expenses: Decimal,
    budget_items: &[BudgetItemView],
) -> Vec<String> {
    let mut suggestions = Vec::new();

    match percentage_of(total_expenses, total_income) {
        Some(usage) if usage <= HEALTHY_SPENDING_PERCENTAGE => {
            suggestions.push(SPENDING_WELL.to_owned())
        }
        Some(usage) if usage > Decimal::ONE_HUNDRED => {
            suggestions.push(OVERSPENT_INCOME.to_owned())
        }
        Some(_) => {}
        None => suggestions.push(NO_INCOME.to_owned()),
    }

    let balance = total_income - total_expenses;
    if balance > Decimal::ZERO {
        suggestions.push(POSITIVE_BALANCE.to_owned());
    } else if balance < Decimal::ZERO {
        suggestions.push(NEGATIVE_BALANCE.to_owned());
    }

    for budget_item in budget_items {
        if let Some(suggestion) = budget_item_suggestion(budget_item) {
            suggestions.push(suggestion);
        }
    }

    suggestions
}

fn budget_item_suggestion(budget_item: &BudgetItemView) -> Option<String> {
    let available = budget_item.disponible_mes;
    let warning_threshold = budget_item.monto_asignado.as_decimal() * Decimal::new(1, 1);

    if available < Decimal::ZERO {
        Some(format!(
            "Has superado el presupuesto de {} en {}. Considera reducir gastos en esta categoría.",
            budget_item.nombre,
            format_currency(available.abs())
        ))
    } else if available <= warning_threshold {
        Some(format!(
            "Estás por alcanzar el límite de {}. Monitorea tus próximos gastos en esta partida.",
            budget_item.nombre
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod suggestion_tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use time::OffsetDateTime;

    use crate::{
        budget::{BudgetItem, BudgetItemKind, BudgetItemName, BudgetItemView},
        money::Amount,
    };

    use super::{
        NEGATIVE_BALANCE, NO_INCOME, OVERSPENT_INCOME, POSITIVE_BALANCE, SPENDING_WELL,
        build_suggestions,
    };

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn budget_item(name: &str, assigned: &str, spent: &str) -> BudgetItemView {
        let item = BudgetItem {
            id: 1,
            name: BudgetItemName::new_unchecked(name),
            kind: BudgetItemKind::Variable,
            assigned_amount: Amount::from_str(assigned).unwrap(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };

        BudgetItemView::new(&item, Amount::from_str(spent).unwrap())
    }

    #[test]
    fn no_income_and_no_expenses() {
        let suggestions = build_suggestions(Decimal::ZERO, Decimal::ZERO, &[]);

        assert_eq!(suggestions, [NO_INCOME]);
    }

    #[test]
    fn no_income_with_expenses() {
        let suggestions = build_suggestions(Decimal::ZERO, dec("10"), &[]);

        assert_eq!(suggestions, [NO_INCOME, NEGATIVE_BALANCE]);
    }

    #[test]
    fn spending_up_to_85_percent_is_healthy() {
        let suggestions = build_suggestions(dec("1000"), dec("850"), &[]);

        assert_eq!(suggestions, [SPENDING_WELL, POSITIVE_BALANCE]);
    }

    #[test]
    fn spending_between_85_and_100_percent_has_no_usage_suggestion() {
        let suggestions = build_suggestions(dec("1000"), dec("900"), &[]);

        assert_eq!(suggestions, [POSITIVE_BALANCE]);

        let suggestions = build_suggestions(dec("1000"), dec("1000"), &[]);

        assert!(suggestions.is_empty());
    }

    #[test]
    fn spending_more_than_income() {
        let suggestions = build_suggestions(dec("1000"), dec("1200"), &[]);

        assert_eq!(suggestions, [OVERSPENT_INCOME, NEGATIVE_BALANCE]);
    }

    #[test]
    fn budget_item_over_limit() {
        let items = [budget_item("Ocio", "1000", "2234.5")];

        let suggestions = build_suggestions(dec("5000"), dec("2234.5"), &items);

        assert_eq!(
            suggestions[2],
            "Has superado el presupuesto de Ocio en $1,234.50. Considera reducir gastos en esta categoría."
        );
    }

    #[test]
    fn budget_item_close_to_limit() {
        let items = [
            budget_item("Arriendo", "1000", "900"),
            budget_item("Supermercado", "1000", "899.99"),
        ];

        let suggestions = build_suggestions(dec("5000"), dec("1799.99"), &items);

        assert_eq!(
            suggestions[2..],
            ["Estás por alcanzar el límite de Arriendo. Monitorea tus próximos gastos en esta partida."]
        );
    }
}
