use sqlx::SqlitePool;

use crate::bank::BankApi;
use crate::db;
use crate::error::Result;
use crate::transform;

/// Runs one full sync cycle: fetch every account, then fetch, transform and
/// store each account's purchases.
///
/// A failure listing accounts aborts the cycle. Failures on a single
/// account are logged and the remaining accounts still get processed; the
/// next cycle retries them naturally.
pub async fn sync_once<C: BankApi>(pool: &SqlitePool, client: &C) -> Result<()> {
    let accounts = client.list_accounts().await?;

    for account in &accounts {
        let transactions = match client.list_transactions(&account.id).await {
            Ok(transactions) => transactions,
            Err(err) => {
                tracing::error!(
                    "getting transactions from account {}: {}",
                    account.name,
                    err
                );
                continue;
            }
        };

        let purchases = transform::to_purchases(&account.name, &transactions);
        if purchases.is_empty() {
            continue;
        }

        if let Err(err) = db::add_purchases(pool, &purchases).await {
            tracing::error!("storing purchases from account {}: {}", account.name, err);
            continue;
        }
        tracing::info!("loaded {} purchases from {}", purchases.len(), account.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{Account, CardDetail, RawTransaction};
    use crate::db::testutil::TestDb;
    use crate::domain::Month;
    use crate::error::Error;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::{HashMap, HashSet};

    struct FakeBank {
        accounts: Vec<Account>,
        transactions: HashMap<String, Vec<RawTransaction>>,
        failing_accounts: HashSet<String>,
        accounts_down: bool,
    }

    impl FakeBank {
        fn new() -> Self {
            Self {
                accounts: Vec::new(),
                transactions: HashMap::new(),
                failing_accounts: HashSet::new(),
                accounts_down: false,
            }
        }

        fn with_account(mut self, id: &str, transactions: Vec<RawTransaction>) -> Self {
            self.accounts.push(account(id));
            self.transactions.insert(id.to_string(), transactions);
            self
        }

        fn with_failing_account(mut self, id: &str) -> Self {
            self.accounts.push(account(id));
            self.failing_accounts.insert(id.to_string());
            self
        }
    }

    #[async_trait]
    impl BankApi for FakeBank {
        async fn list_accounts(&self) -> Result<Vec<Account>> {
            if self.accounts_down {
                return Err(Error::Unavailable("accounts endpoint down".to_string()));
            }
            Ok(self.accounts.clone())
        }

        async fn list_transactions(&self, account_id: &str) -> Result<Vec<RawTransaction>> {
            if self.failing_accounts.contains(account_id) {
                return Err(Error::Unavailable(
                    "transactions endpoint down".to_string(),
                ));
            }
            Ok(self
                .transactions
                .get(account_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            number: "12345678901".to_string(),
            name: format!("account {}", id),
            account_type: "Standard account".to_string(),
        }
    }

    fn card_purchase(id: &str, amount: f64) -> RawTransaction {
        let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).unwrap();
        RawTransaction {
            accounting_date: midnight(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()),
            amount: -amount,
            text: "VISA VAREKJOP".to_string(),
            transaction_type: "Purchase".to_string(),
            is_reservation: false,
            source: "Archive".to_string(),
            card_details: Some(CardDetail {
                transaction_id: id.to_string(),
                card_number: "****1234".to_string(),
                currency_amount: amount,
                currency_rate: 0.0,
                merchant_category_code: "5411".to_string(),
                merchant_category_description: "groceries".to_string(),
                merchant_city: "OSLO".to_string(),
                merchant_name: "KIWI".to_string(),
                original_currency_code: "NOK".to_string(),
                purchase_date: midnight(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            }),
        }
    }

    fn plain_transfer() -> RawTransaction {
        let mut trans = card_purchase("unused", 10.0);
        trans.card_details = None;
        trans.transaction_type = "Transfer".to_string();
        trans
    }

    #[tokio::test]
    async fn one_failing_account_does_not_abort_the_cycle() {
        let db = TestDb::new().await;
        let bank = FakeBank::new()
            .with_account("acct1", vec![card_purchase("t1", 100.0)])
            .with_failing_account("acct2")
            .with_account("acct3", vec![card_purchase("t3", 300.0)]);

        sync_once(&db.pool, &bank).await.unwrap();

        let stored = db::query_purchases(&db.pool, Month::new(2024, 5).unwrap())
            .await
            .unwrap();
        let mut ids: Vec<_> = stored.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["t1", "t3"]);
    }

    #[tokio::test]
    async fn accounts_failure_aborts_the_cycle() {
        let db = TestDb::new().await;
        let mut bank = FakeBank::new().with_account("acct1", vec![card_purchase("t1", 100.0)]);
        bank.accounts_down = true;

        let err = sync_once(&db.pool, &bank).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));

        let stored = db::query_purchases(&db.pool, Month::new(2024, 5).unwrap())
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn accounts_without_card_purchases_are_skipped() {
        let db = TestDb::new().await;
        let bank = FakeBank::new()
            .with_account("acct1", vec![plain_transfer(), plain_transfer()])
            .with_account("acct2", vec![card_purchase("t2", 50.0)]);

        sync_once(&db.pool, &bank).await.unwrap();

        let stored = db::query_purchases(&db.pool, Month::new(2024, 5).unwrap())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, "t2");
    }

    #[tokio::test]
    async fn repeated_cycles_do_not_duplicate() {
        let db = TestDb::new().await;
        let bank = FakeBank::new().with_account("acct1", vec![card_purchase("t1", 100.0)]);

        sync_once(&db.pool, &bank).await.unwrap();
        sync_once(&db.pool, &bank).await.unwrap();

        let stored = db::query_purchases(&db.pool, Month::new(2024, 5).unwrap())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }
}
