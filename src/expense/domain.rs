//! Core expense domain types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    budget::{BudgetItemId, BudgetItemName},
    json::double_option,
    money::Amount,
};

/// Whether an expense is a fixed or a variable cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseKind {
    /// A cost that is the same every month.
    Fijo,
    /// A cost that changes from month to month.
    #[default]
    Variable,
}

impl ExpenseKind {
    /// The value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseKind::Fijo => "fijo",
            ExpenseKind::Variable => "variable",
        }
    }
}

impl FromStr for ExpenseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fijo" => Ok(ExpenseKind::Fijo),
            "variable" => Ok(ExpenseKind::Variable),
            other => Err(Error::InvalidRequest(format!(
                "\"{other}\" no es un tipo de gasto válido."
            ))),
        }
    }
}

/// Database identifier for an expense.
pub type ExpenseId = i64;

/// Money that a user spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    pub id: ExpenseId,
    /// The budget item the expense is counted against, if any.
    pub budget_item_id: Option<BudgetItemId>,
    /// The name of the budget item, if the expense has one.
    pub budget_item_name: Option<BudgetItemName>,
    pub amount: Amount,
    pub date: Date,
    pub kind: ExpenseKind,
    /// A free text category for expenses without a budget item. May be empty.
    pub category: String,
    /// A note about the expense. May be empty.
    pub note: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Expense {
    /// The name to show for the expense: the budget item name, falling back to
    /// the category. `None` if both are empty.
    pub fn display_name(&self) -> Option<String> {
        match &self.budget_item_name {
            Some(name) => Some(name.to_string()),
            None if !self.category.is_empty() => Some(self.category.clone()),
            None => None,
        }
    }

    /// The fields of the expense set by the user.
    pub fn data(&self) -> ExpenseData {
        ExpenseData {
            budget_item_id: self.budget_item_id,
            amount: self.amount,
            date: self.date,
            kind: self.kind,
            category: self.category.clone(),
            note: self.note.clone(),
        }
    }
}

/// The fields of an expense set by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseData {
    pub budget_item_id: Option<BudgetItemId>,
    pub amount: Amount,
    pub date: Date,
    pub kind: ExpenseKind,
    pub category: String,
    pub note: String,
}

impl ExpenseData {
    /// Check that the expense has a budget item or a category.
    ///
    /// # Errors
    ///
    /// Returns an [Error::MissingExpenseCategory] if the expense has neither.
    pub fn validate(self) -> Result<Self, Error> {
        if self.budget_item_id.is_none() && self.category.is_empty() {
            Err(Error::MissingExpenseCategory)
        } else {
            Ok(self)
        }
    }
}

/// The request body for creating or changing an expense.
///
/// Every field is optional so the same body works for partial updates.
/// `partida`, `categoria` and `observacion` may be `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseForm {
    #[serde(default, deserialize_with = "double_option")]
    pub partida: Option<Option<BudgetItemId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub monto: Option<Option<Amount>>,
    pub fecha: Option<Date>,
    pub tipo: Option<ExpenseKind>,
    #[serde(default, deserialize_with = "double_option")]
    pub categoria: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub observacion: Option<Option<String>>,
}

impl ExpenseForm {
    /// Validate the form for creating an expense dated `today` unless the form has a date.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidRequest] if `monto` is missing, or an
    /// [Error::MissingExpenseCategory] if there is no budget item or category.
    pub fn into_new(self, today: Date) -> Result<ExpenseData, Error> {
        let amount = self.required_amount()?;

        let defaults = ExpenseData {
            budget_item_id: None,
            amount,
            date: today,
            kind: ExpenseKind::default(),
            category: String::new(),
            note: String::new(),
        };

        self.apply_to(defaults)
    }

    /// Validate the form for replacing `current`.
    ///
    /// `monto` is required, other missing fields keep their current value.
    pub fn into_replacement(self, current: &Expense) -> Result<ExpenseData, Error> {
        let amount = self.required_amount()?;

        self.apply_to(ExpenseData {
            amount,
            ..current.data()
        })
    }

    /// Apply the fields present in the form to `current`.
    pub fn into_patch(self, current: &Expense) -> Result<ExpenseData, Error> {
        self.apply_to(current.data())
    }

    fn required_amount(&self) -> Result<Amount, Error> {
        self.monto
            .flatten()
            .ok_or_else(|| Error::InvalidRequest("El campo \"monto\" es obligatorio.".to_owned()))
    }

    fn apply_to(self, mut data: ExpenseData) -> Result<ExpenseData, Error> {
        if let Some(budget_item_id) = self.partida {
            data.budget_item_id = budget_item_id;
        }

        match self.monto {
            Some(Some(amount)) => data.amount = amount,
            Some(None) => {
                return Err(Error::InvalidRequest(
                    "El campo \"monto\" no puede ser nulo.".to_owned(),
                ));
            }
            None => {}
        }

        if let Some(date) = self.fecha {
            data.date = date;
        }

        if let Some(kind) = self.tipo {
            data.kind = kind;
        }

        if let Some(category) = self.categoria {
            data.category = category.unwrap_or_default().trim().to_owned();
        }

        if let Some(note) = self.observacion {
            data.note = note.unwrap_or_default().trim().to_owned();
        }

        data.validate()
    }
}

/// The JSON representation of an expense.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseView {
    pub id: ExpenseId,
    pub partida: Option<BudgetItemId>,
    /// See [Expense::display_name].
    pub partida_nombre: Option<String>,
    pub monto: Amount,
    pub fecha: Date,
    pub tipo: ExpenseKind,
    pub categoria: String,
    pub observacion: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&Expense> for ExpenseView {
    fn from(expense: &Expense) -> Self {
        Self {
            id: expense.id,
            partida: expense.budget_item_id,
            partida_nombre: expense.display_name(),
            monto: expense.amount,
            fecha: expense.date,
            tipo: expense.kind,
            categoria: expense.category.clone(),
            observacion: expense.note.clone(),
            created_at: expense.created_at,
            updated_at: expense.updated_at,
        }
    }
}
