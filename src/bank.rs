use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Read operations the sync engine consumes. Implemented by [`BankClient`]
/// against the real API and by an in-memory client in tests.
#[async_trait]
pub trait BankApi {
    async fn list_accounts(&self) -> Result<Vec<Account>>;
    async fn list_transactions(&self, account_id: &str) -> Result<Vec<RawTransaction>>;
}

#[derive(Debug, Deserialize, Clone)]
pub struct Account {
    #[serde(rename = "accountId")]
    pub id: String,
    #[serde(rename = "accountNumber", default)]
    pub number: String,
    pub name: String,
    #[serde(rename = "accountType", default)]
    pub account_type: String,
}

/// One transaction as the bank reports it. Only transactions carrying
/// `card_details` represent card purchases; everything else is discarded
/// by the transformer.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub accounting_date: NaiveDateTime,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub is_reservation: bool,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub card_details: Option<CardDetail>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CardDetail {
    pub transaction_id: String,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub currency_amount: f64,
    #[serde(default)]
    pub currency_rate: f64,
    #[serde(default)]
    pub merchant_category_code: String,
    #[serde(default)]
    pub merchant_category_description: String,
    #[serde(default)]
    pub merchant_city: String,
    #[serde(default)]
    pub merchant_name: String,
    #[serde(default)]
    pub original_currency_code: String,
    /// When the card was charged. Can differ from the accounting date on
    /// the enclosing transaction.
    pub purchase_date: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
struct ListAccountsResponse {
    items: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct ListTransactionsResponse {
    #[serde(rename = "availableItems")]
    available_items: Option<i64>,
    #[serde(default)]
    items: Vec<RawTransaction>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    valid_until: Instant,
}

/// Authenticated client for the bank REST API. Acquires a bearer token via
/// the OAuth2 client-credentials flow and caches it until shortly before
/// expiry.
pub struct BankClient {
    http: reqwest::Client,
    api_url: String,
    token_url: String,
    customer_id: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl BankClient {
    pub fn new(
        api_url: String,
        token_url: String,
        customer_id: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("building HTTP client");
        Self {
            http,
            api_url,
            token_url,
            customer_id,
            client_id,
            client_secret,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.valid_until > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        tracing::info!("Requesting new access token...");

        let res = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!("Error occurred in request to token endpoint: {:#?}", err)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(Error::Unauthorized(format!(
                "token endpoint returned status {}: {}",
                status, body
            )));
        }

        let token = res.json::<TokenResponse>().await.map_err(|err| {
            Error::Malformed(format!("deserialising token response: {}", err))
        })?;

        // Renew a minute early so a token never expires mid-cycle.
        let valid_until =
            Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(60));
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            valid_until,
        });
        Ok(access_token)
    }

    async fn call_api(&self, path: &str) -> Result<reqwest::Response> {
        let token = self.access_token().await?;

        let res = self
            .http
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(token)
            .header("customerId", &self.customer_id)
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!("Error occurred in request to bank API: {:#?}", err)
            })?;

        let status = res.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = res.text().await.unwrap_or_default();
            return Err(Error::Unauthorized(format!("status {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(Error::Unavailable(format!("status {}: {}", status, body)));
        }
        Ok(res)
    }
}

#[async_trait]
impl BankApi for BankClient {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        tracing::info!("Listing accounts...");

        let res = self.call_api("/exec.bank/api/v1/Accounts").await?;
        let accounts = res.json::<ListAccountsResponse>().await.map_err(|err| {
            Error::Malformed(format!("deserialising accounts response: {}", err))
        })?;
        Ok(accounts.items)
    }

    async fn list_transactions(&self, account_id: &str) -> Result<Vec<RawTransaction>> {
        tracing::info!("Listing transactions for account_id={}", account_id);

        let res = self
            .call_api(&format!("/exec.bank/api/v1/Transactions/{}", account_id))
            .await?;
        let body = res.json::<ListTransactionsResponse>().await.map_err(|err| {
            Error::Malformed(format!("deserialising transactions response: {}", err))
        })?;
        transactions_from_response(body)
    }
}

fn transactions_from_response(res: ListTransactionsResponse) -> Result<Vec<RawTransaction>> {
    if res.available_items.is_none() {
        return Err(Error::Malformed(
            "missing field \"availableItems\" in response".to_string(),
        ));
    }
    Ok(res.items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const TRANSACTIONS_BODY: &str = r#"{
        "availableItems": 2,
        "items": [
            {
                "accountingDate": "2024-05-03T00:00:00",
                "amount": -120.5,
                "text": "VISA VAREKJOP",
                "transactionType": "Purchase",
                "isReservation": false,
                "source": "Archive",
                "cardDetails": {
                    "transactionId": "abc123",
                    "cardNumber": "****1234",
                    "currencyAmount": 120.5,
                    "currencyRate": 1.0,
                    "merchantCategoryCode": "5411",
                    "merchantCategoryDescription": "groceries",
                    "merchantCity": "OSLO",
                    "merchantName": "KIWI",
                    "originalCurrencyCode": "NOK",
                    "purchaseDate": "2024-05-01T00:00:00"
                }
            },
            {
                "accountingDate": "2024-05-03T00:00:00",
                "amount": -50.0,
                "text": "Overføring",
                "transactionType": "Transfer",
                "cardDetails": null
            }
        ]
    }"#;

    #[test]
    fn deserializes_transactions() {
        let res: ListTransactionsResponse = serde_json::from_str(TRANSACTIONS_BODY).unwrap();
        let transactions = transactions_from_response(res).unwrap();
        assert_eq!(transactions.len(), 2);

        let detail = transactions[0].card_details.as_ref().unwrap();
        assert_eq!(detail.transaction_id, "abc123");
        assert_eq!(
            detail.purchase_date.date(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
        assert!(transactions[1].card_details.is_none());
    }

    #[test]
    fn missing_item_count_is_malformed() {
        let body = r#"{"items": []}"#;
        let res: ListTransactionsResponse = serde_json::from_str(body).unwrap();
        let err = transactions_from_response(res).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn deserializes_accounts() {
        let body = r#"{
            "items": [
                {
                    "accountId": "acct1",
                    "accountNumber": "12345678901",
                    "ownerCustomerId": "01017012345",
                    "name": "main",
                    "accountType": "Standard account",
                    "balance": 1000.0
                }
            ]
        }"#;
        let res: ListAccountsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(res.items.len(), 1);
        assert_eq!(res.items[0].id, "acct1");
        assert_eq!(res.items[0].name, "main");
    }
}
