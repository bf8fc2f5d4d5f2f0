//! Core income domain types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{Error, json::double_option, money::Amount};

/// Whether an income is received regularly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeKind {
    /// Regular income, e.g. a salary.
    #[default]
    Fijo,
    /// One-off income, e.g. a bonus.
    Eventual,
}

impl IncomeKind {
    /// The value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeKind::Fijo => "fijo",
            IncomeKind::Eventual => "eventual",
        }
    }
}

impl FromStr for IncomeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fijo" => Ok(IncomeKind::Fijo),
            "eventual" => Ok(IncomeKind::Eventual),
            other => Err(Error::InvalidRequest(format!(
                "\"{other}\" no es un tipo de ingreso válido."
            ))),
        }
    }
}

/// Database identifier for an income.
pub type IncomeId = i64;

/// Money that a user received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Income {
    pub id: IncomeId,
    pub amount: Amount,
    pub date: Date,
    pub kind: IncomeKind,
    /// A note about the income. May be empty.
    pub note: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Income {
    /// The fields of the income set by the user.
    pub fn data(&self) -> IncomeData {
        IncomeData {
            amount: self.amount,
            date: self.date,
            kind: self.kind,
            note: self.note.clone(),
        }
    }
}

/// The fields of an income set by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomeData {
    pub amount: Amount,
    pub date: Date,
    pub kind: IncomeKind,
    pub note: String,
}

/// The request body for creating or changing an income.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomeForm {
    #[serde(default, deserialize_with = "double_option")]
    pub monto: Option<Option<Amount>>,
    pub fecha: Option<Date>,
    pub tipo: Option<IncomeKind>,
    #[serde(default, deserialize_with = "double_option")]
    pub observacion: Option<Option<String>>,
}

impl IncomeForm {
    /// Validate the form for creating an income dated `today` unless the form has a date.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidRequest] if `monto` is missing or `null`.
    pub fn into_new(self, today: Date) -> Result<IncomeData, Error> {
        let amount = self.required_amount()?;

        self.apply_to(IncomeData {
            amount,
            date: today,
            kind: IncomeKind::default(),
            note: String::new(),
        })
    }

    /// Validate the form for replacing `current`.
    ///
    /// `monto` is required, other missing fields keep their current value.
    pub fn into_replacement(self, current: &Income) -> Result<IncomeData, Error> {
        let amount = self.required_amount()?;

        self.apply_to(IncomeData {
            amount,
            ..current.data()
        })
    }

    /// Apply the fields present in the form to `current`.
    pub fn into_patch(self, current: &Income) -> Result<IncomeData, Error> {
        self.apply_to(current.data())
    }

    fn required_amount(&self) -> Result<Amount, Error> {
        self.monto
            .flatten()
            .ok_or_else(|| Error::InvalidRequest("El campo \"monto\" es obligatorio.".to_owned()))
    }

    fn apply_to(self, mut data: IncomeData) -> Result<IncomeData, Error> {
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

        if let Some(note) = self.observacion {
            data.note = note.unwrap_or_default().trim().to_owned();
        }

        Ok(data)
    }
}

/// The JSON representation of an income.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeView {
    pub id: IncomeId,
    pub monto: Amount,
    pub fecha: Date,
    pub tipo: IncomeKind,
    pub observacion: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&Income> for IncomeView {
    fn from(income: &Income) -> Self {
        Self {
            id: income.id,
            monto: income.amount,
            fecha: income.date,
            tipo: income.kind,
            observacion: income.note.clone(),
            created_at: income.created_at,
            updated_at: income.updated_at,
        }
    }
}

#[cfg(test)]
mod income_form_tests {
    use serde_json::json;
    use time::macros::date;

    use crate::{
        Error,
        income::{IncomeForm, IncomeKind},
    };

    #[test]
    fn new_defaults_to_fixed_income_today() {
        let form: IncomeForm = serde_json::from_value(json!({"monto": 850000})).unwrap();

        let data = form.into_new(date!(2025 - 03 - 10)).unwrap();

        assert_eq!(data.kind, IncomeKind::Fijo);
        assert_eq!(data.date, date!(2025 - 03 - 10));
        assert_eq!(data.note, "");
    }

    #[test]
    fn new_rejects_null_amount() {
        let form: IncomeForm = serde_json::from_value(json!({"monto": null})).unwrap();

        let result = form.into_new(date!(2025 - 03 - 10));

        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn null_note_becomes_empty() {
        let form: IncomeForm = serde_json::from_value(
            json!({"monto": 1, "tipo": "eventual", "observacion": null}),
        )
        .unwrap();

        let data = form.into_new(date!(2025 - 03 - 10)).unwrap();

        assert_eq!(data.kind, IncomeKind::Eventual);
        assert_eq!(data.note, "");
    }
}
