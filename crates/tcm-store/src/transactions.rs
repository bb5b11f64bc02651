//! Transaction persistence and same-day history.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use tcm_core::{
    utc_day_bounds, AccountId, ClientId, CountryCode, Counterparty, Transaction, TransactionId,
    TransactionType, TransferMethod,
};
use tcm_engine::{StoreError, TransactionSource};
use tcm_rules::AggregationSubject;

use crate::error::{corrupt, store_error};
use crate::PgStore;

const COLUMNS: &str = "id, client_id, account_id, transaction_type, amount, currency, \
     base_amount, base_currency, occurred_at, transfer_method, counterparty, account_country";

impl PgStore {
    /// Record a transaction. Returns `false` when one with the same id
    /// already exists.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on database failure.
    pub async fn insert_transaction(&self, tx: &Transaction) -> Result<bool, StoreError> {
        let transfer_method = tx.transfer_method.map(method_name).transpose()?;
        let counterparty = tx
            .counterparty
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| corrupt("transaction", tx.id, e))?;

        let result = sqlx::query(
            "INSERT INTO transactions (id, client_id, account_id, transaction_type, amount, currency,
                 base_amount, base_currency, occurred_at, transfer_method, counterparty, account_country)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(tx.id.as_uuid())
        .bind(tx.client_id.as_uuid())
        .bind(tx.account_id.as_uuid())
        .bind(tx.transaction_type.as_str())
        .bind(tx.amount)
        .bind(&tx.currency)
        .bind(tx.base_amount)
        .bind(&tx.base_currency)
        .bind(tx.occurred_at)
        .bind(transfer_method)
        .bind(counterparty)
        .bind(tx.account_country.as_ref().map(CountryCode::as_str))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("insert_transaction", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TransactionSource for PgStore {
    async fn same_day(
        &self,
        subject: AggregationSubject,
        day: NaiveDate,
    ) -> Result<Vec<Transaction>, StoreError> {
        let (start, end) = utc_day_bounds(day);
        let (filter, id) = match subject {
            AggregationSubject::Client(id) => ("client_id", *id.as_uuid()),
            AggregationSubject::Account(id) => ("account_id", *id.as_uuid()),
        };
        let sql = format!(
            "SELECT {COLUMNS} FROM transactions
             WHERE {filter} = $1 AND occurred_at >= $2 AND occurred_at < $3
             ORDER BY occurred_at, id"
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("same_day", e))?;
        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE id = $1");
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("get_transaction", e))?
            .map(TransactionRow::into_transaction)
            .transpose()
    }
}

fn method_name(method: TransferMethod) -> Result<String, StoreError> {
    match serde_json::to_value(method) {
        Ok(serde_json::Value::String(name)) => Ok(name),
        Ok(other) => Err(StoreError::Corrupt(format!("transfer method encoded as {other}"))),
        Err(e) => Err(StoreError::Corrupt(e.to_string())),
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TransactionRow {
    pub(crate) id: Uuid,
    pub(crate) client_id: Uuid,
    pub(crate) account_id: Uuid,
    pub(crate) transaction_type: String,
    pub(crate) amount: Decimal,
    pub(crate) currency: String,
    pub(crate) base_amount: Decimal,
    pub(crate) base_currency: String,
    pub(crate) occurred_at: DateTime<Utc>,
    pub(crate) transfer_method: Option<String>,
    pub(crate) counterparty: Option<serde_json::Value>,
    pub(crate) account_country: Option<String>,
}

impl TransactionRow {
    pub(crate) fn into_transaction(self) -> Result<Transaction, StoreError> {
        let id = self.id;
        let transaction_type: TransactionType =
            serde_json::from_value(serde_json::Value::String(self.transaction_type))
                .map_err(|e| corrupt("transaction", id, e))?;
        let transfer_method = self
            .transfer_method
            .map(|m| serde_json::from_value::<TransferMethod>(serde_json::Value::String(m)))
            .transpose()
            .map_err(|e| corrupt("transaction", id, e))?;
        let counterparty = self
            .counterparty
            .map(serde_json::from_value::<Counterparty>)
            .transpose()
            .map_err(|e| corrupt("transaction", id, e))?;
        let account_country = self
            .account_country
            .map(CountryCode::new)
            .transpose()
            .map_err(|e| corrupt("transaction", id, e))?;

        Ok(Transaction {
            id: TransactionId::from_uuid(id),
            client_id: ClientId::from_uuid(self.client_id),
            account_id: AccountId::from_uuid(self.account_id),
            transaction_type,
            amount: self.amount,
            currency: self.currency,
            base_amount: self.base_amount,
            base_currency: self.base_currency,
            occurred_at: self.occurred_at,
            transfer_method,
            counterparty,
            account_country,
        })
    }
}
