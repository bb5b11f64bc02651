//! # Transaction Record
//!
//! The immutable, already FX-normalized transaction the engine evaluates.
//! Produced upstream by the transaction-creation pipeline or bulk import;
//! the engine never mutates it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::country::CountryCode;
use crate::error::ValidationError;
use crate::identity::{AccountId, ClientId, TransactionId};
use crate::temporal::utc_day;

/// Direction of a transaction relative to the client account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Funds credited to the account.
    Deposit,
    /// Funds debited from the account.
    Withdrawal,
    /// Funds moved to or from a counterparty.
    Transfer,
}

impl TransactionType {
    /// The canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "Deposit",
            Self::Withdrawal => "Withdrawal",
            Self::Transfer => "Transfer",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment rail used for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferMethod {
    /// Brazilian instant payment.
    Pix,
    /// Brazilian same-day wire.
    Ted,
    /// International wire.
    Swift,
    /// Anything else.
    Other,
}

/// Kind of identifier used to address a counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierType {
    /// Brazilian individual taxpayer number.
    Cpf,
    /// Brazilian company taxpayer number.
    Cnpj,
    /// Foreign tax identifier.
    TaxId,
    /// Passport number.
    Passport,
    /// Legal Entity Identifier.
    Lei,
    /// PIX key: e-mail address.
    PixEmail,
    /// PIX key: phone number.
    PixPhone,
    /// PIX key: random key.
    PixRandom,
    /// International Bank Account Number.
    Iban,
    /// Anything else.
    Other,
}

/// The other side of a transfer, as captured at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    /// Counterparty display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Counterparty bank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    /// Counterparty branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Counterparty account number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Kind of [`Counterparty::identifier`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_type: Option<IdentifierType>,
    /// Identifier value (tax id, PIX key, IBAN, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Counterparty country.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<CountryCode>,
}

/// A finalized transaction record.
///
/// `base_amount` is `amount` converted into the institution's reporting
/// currency upstream; every threshold rule compares base amounts only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier.
    pub id: TransactionId,
    /// Owning client.
    pub client_id: ClientId,
    /// Account the transaction was booked on.
    pub account_id: AccountId,
    /// Deposit, withdrawal or transfer.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Amount in the original currency.
    pub amount: Decimal,
    /// ISO 4217 code of `amount`.
    pub currency: String,
    /// Amount in the base (reporting) currency.
    pub base_amount: Decimal,
    /// ISO 4217 code of `base_amount`.
    pub base_currency: String,
    /// When the transaction occurred.
    pub occurred_at: DateTime<Utc>,
    /// Rail used, for transfers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_method: Option<TransferMethod>,
    /// Counterparty details, when captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Counterparty>,
    /// Country of the booking account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_country: Option<CountryCode>,
}

impl Transaction {
    /// Build a validated transaction with a fresh id and no counterparty.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when either amount is not strictly
    /// positive or a currency code is blank.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_id: ClientId,
        account_id: AccountId,
        transaction_type: TransactionType,
        amount: Decimal,
        currency: impl Into<String>,
        base_amount: Decimal,
        base_currency: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let tx = Self {
            id: TransactionId::new(),
            client_id,
            account_id,
            transaction_type,
            amount,
            currency: currency.into().trim().to_ascii_uppercase(),
            base_amount,
            base_currency: base_currency.into().trim().to_ascii_uppercase(),
            occurred_at,
            transfer_method: None,
            counterparty: None,
            account_country: None,
        };
        tx.validate()?;
        Ok(tx)
    }

    /// Attach counterparty details.
    pub fn with_counterparty(mut self, counterparty: Counterparty) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    /// Attach the transfer rail.
    pub fn with_transfer_method(mut self, method: TransferMethod) -> Self {
        self.transfer_method = Some(method);
        self
    }

    /// Attach the booking account's country.
    pub fn with_account_country(mut self, country: CountryCode) -> Self {
        self.account_country = Some(country);
        self
    }

    /// Check the invariants upstream promises. Used when records arrive from
    /// files or storage rather than [`Transaction::new`].
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount {
                field: "amount",
                value: self.amount.to_string(),
            });
        }
        if self.base_amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount {
                field: "base_amount",
                value: self.base_amount.to_string(),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(ValidationError::MissingField("currency"));
        }
        if self.base_currency.trim().is_empty() {
            return Err(ValidationError::MissingField("base_currency"));
        }
        Ok(())
    }

    /// Whether this is a transfer.
    pub fn is_transfer(&self) -> bool {
        self.transaction_type == TransactionType::Transfer
    }

    /// Counterparty country, if captured.
    pub fn counterparty_country(&self) -> Option<&CountryCode> {
        self.counterparty.as_ref().and_then(|cp| cp.country.as_ref())
    }

    /// The country a country-scoped rule is matched against: the
    /// counterparty country for transfers, the account country otherwise.
    pub fn relevant_country(&self) -> Option<&CountryCode> {
        if self.is_transfer() {
            self.counterparty_country()
        } else {
            self.account_country.as_ref()
        }
    }

    /// The UTC calendar day the transaction occurred on.
    pub fn day(&self) -> NaiveDate {
        utc_day(self.occurred_at)
    }
}
