//! Core budget item domain types.

use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    json::double_option,
    money::{Amount, serialize_two_places},
};

/// The maximum number of characters in a budget item name.
pub const MAX_BUDGET_ITEM_NAME_LENGTH: usize = 120;

/// A validated, non-empty budget item name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct BudgetItemName(String);

impl BudgetItemName {
    /// Create a budget item name, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyBudgetItemName] if `name` is
    /// empty, or an [Error::BudgetItemNameTooLong] if it has more than
    /// [MAX_BUDGET_ITEM_NAME_LENGTH] characters.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyBudgetItemName)
        } else if name.chars().count() > MAX_BUDGET_ITEM_NAME_LENGTH {
            Err(Error::BudgetItemNameTooLong(MAX_BUDGET_ITEM_NAME_LENGTH))
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a budget item name without validation.
    ///
    /// The caller should ensure that the string is not empty and not too long.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for BudgetItemName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for BudgetItemName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BudgetItemName::new(s)
    }
}

impl Display for BudgetItemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the money for a budget item is spent on a fixed or variable amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetItemKind {
    /// A fixed cost, e.g. rent.
    Fijo,
    /// A variable cost, e.g. groceries.
    #[default]
    Variable,
}

impl BudgetItemKind {
    /// The value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetItemKind::Fijo => "fijo",
            BudgetItemKind::Variable => "variable",
        }
    }
}

impl FromStr for BudgetItemKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fijo" => Ok(BudgetItemKind::Fijo),
            "variable" => Ok(BudgetItemKind::Variable),
            other => Err(Error::InvalidRequest(format!(
                "\"{other}\" no es un tipo de partida válido."
            ))),
        }
    }
}

/// Database identifier for a budget item.
pub type BudgetItemId = i64;

/// A user-defined budget category with an amount assigned for each month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetItem {
    pub id: BudgetItemId,
    pub name: BudgetItemName,
    pub kind: BudgetItemKind,
    pub assigned_amount: Amount,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The fields of a budget item set by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetItemData {
    pub name: BudgetItemName,
    pub kind: BudgetItemKind,
    pub assigned_amount: Amount,
}

/// The request body for creating or changing a budget item.
///
/// Every field is optional so the same body works for partial updates.
/// Creating or replacing a budget item requires `nombre` and `monto_asignado`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BudgetItemForm {
    pub nombre: Option<String>,
    pub tipo: Option<BudgetItemKind>,
    #[serde(default, deserialize_with = "double_option")]
    pub monto_asignado: Option<Option<Amount>>,
}

impl BudgetItemForm {
    /// Validate the form for creating a budget item.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidRequest] if a required field is missing, or
    /// the error from [BudgetItemName::new] if the name is invalid.
    pub fn into_new(self) -> Result<BudgetItemData, Error> {
        let name = self.nombre.ok_or_else(|| required("nombre"))?;
        let assigned_amount = self
            .monto_asignado
            .flatten()
            .ok_or_else(|| required("monto_asignado"))?;

        Ok(BudgetItemData {
            name: BudgetItemName::new(&name)?,
            kind: self.tipo.unwrap_or_default(),
            assigned_amount,
        })
    }

    /// Validate the form for replacing all the fields of `current`.
    ///
    /// The required fields are the same as for [BudgetItemForm::into_new],
    /// but a missing `tipo` keeps the current value.
    pub fn into_replacement(self, current: &BudgetItem) -> Result<BudgetItemData, Error> {
        let kind = self.tipo.unwrap_or(current.kind);
        let data = self.into_new()?;

        Ok(BudgetItemData { kind, ..data })
    }

    /// Apply the fields present in the form to `current`.
    pub fn into_patch(self, current: &BudgetItem) -> Result<BudgetItemData, Error> {
        let name = match self.nombre {
            Some(name) => BudgetItemName::new(&name)?,
            None => current.name.clone(),
        };

        let assigned_amount = match self.monto_asignado {
            Some(Some(amount)) => amount,
            Some(None) => return Err(required("monto_asignado")),
            None => current.assigned_amount,
        };

        Ok(BudgetItemData {
            name,
            kind: self.tipo.unwrap_or(current.kind),
            assigned_amount,
        })
    }
}

fn required(field: &str) -> Error {
    Error::InvalidRequest(format!("El campo \"{field}\" es obligatorio."))
}

/// The JSON representation of a budget item with its figures for the month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetItemView {
    pub id: BudgetItemId,
    pub nombre: String,
    pub tipo: BudgetItemKind,
    pub monto_asignado: Amount,
    /// The amount spent this month on the budget item.
    pub gastado_mes: Amount,
    /// What is left this month, negative if the budget was exceeded.
    #[serde(serialize_with = "serialize_two_places")]
    pub disponible_mes: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BudgetItemView {
    /// Create the view of `budget_item` given the amount spent this month.
    pub fn new(budget_item: &BudgetItem, spent: Amount) -> Self {
        Self {
            id: budget_item.id,
            nombre: budget_item.name.to_string(),
            tipo: budget_item.kind,
            monto_asignado: budget_item.assigned_amount,
            gastado_mes: spent,
            disponible_mes: budget_item.assigned_amount.as_decimal() - spent.as_decimal(),
            created_at: budget_item.created_at,
            updated_at: budget_item.updated_at,
        }
    }
}
