//! Top-up commands received on `card/topup`.
//!
//! The payload is a JSON object:
//!
//! ```json
//! {"uid": "A1B2C3D4", "amount": 20}
//! {"uid": "A1B2C3D4", "new_balance": 100}
//! ```
//!
//! Messages that are not top-up commands at all (plain text, JSON without a
//! `uid`, commands with neither `amount` nor `new_balance`) are not errors:
//! other clients share the namespace and the bridge simply ignores them.
//! Parsing yields `Ok(None)` for those. A message that looks like a command
//! but carries bad values is an error.

use serde_json::{Map, Value};
use tapbridge_core::{Error, Result, Uid, validate_balance};

/// Actionable top-up command.
#[derive(Debug, Clone, PartialEq)]
pub struct TopUpCommand {
    pub uid: Uid,
    pub amount: Option<f64>,
    pub new_balance: Option<f64>,
}

impl TopUpCommand {
    /// Parse an inbound payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPayload` when `uid`, `amount` or
    /// `new_balance` has the wrong JSON type, and `Error::InvalidUid` when
    /// the uid is not 8-16 hex characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapbridge_protocol::TopUpCommand;
    ///
    /// let cmd = TopUpCommand::parse(br#"{"uid":"a1b2c3d4","amount":20}"#)
    ///     .unwrap()
    ///     .unwrap();
    /// assert_eq!(cmd.uid.as_str(), "A1B2C3D4");
    /// assert_eq!(cmd.amount, Some(20.0));
    ///
    /// assert!(TopUpCommand::parse(b"online").unwrap().is_none());
    /// ```
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(payload) else {
            return Ok(None);
        };

        let uid = match object.get("uid") {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(raw)) => Uid::new(raw)?,
            Some(other) => {
                return Err(Error::InvalidPayload(format!(
                    "uid must be a string, got {other}"
                )));
            }
        };

        let amount = number_field(&object, "amount")?;
        let new_balance = number_field(&object, "new_balance")?;

        if amount.is_none() && new_balance.is_none() {
            return Ok(None);
        }

        Ok(Some(Self {
            uid,
            amount,
            new_balance,
        }))
    }

    /// Compute the balance after this command.
    ///
    /// `new_balance` wins when present; otherwise `amount` is added to the
    /// current balance, an unknown card counting as zero.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBalance` if the result is negative or not
    /// finite.
    pub fn apply(&self, current: Option<f64>) -> Result<f64> {
        let next = match (self.new_balance, self.amount) {
            (Some(absolute), _) => absolute,
            (None, Some(amount)) => current.unwrap_or(0.0) + amount,
            (None, None) => current.unwrap_or(0.0),
        };
        validate_balance(next)
    }
}

fn number_field(object: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::InvalidPayload(format!("{key} is not representable: {n}"))),
        Some(other) => Err(Error::InvalidPayload(format!(
            "{key} must be a number, got {other}"
        ))),
    }
}
