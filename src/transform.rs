use crate::bank::RawTransaction;
use crate::domain::Purchase;

/// Converts raw bank transactions into purchases, tagged with the account
/// label they came from. Transactions without card details are dropped.
/// Output order mirrors input order.
///
/// Amounts in a foreign currency carry a non-zero rate and are converted
/// to local minor units; the fractional part is truncated toward zero.
pub fn to_purchases(account: &str, transactions: &[RawTransaction]) -> Vec<Purchase> {
    transactions
        .iter()
        .filter_map(|trans| trans.card_details.as_ref())
        .map(|detail| {
            let mut amount = detail.currency_amount;
            if detail.currency_rate != 0.0 {
                amount *= detail.currency_rate;
            }
            Purchase {
                id: detail.transaction_id.clone(),
                date: detail.purchase_date.date(),
                amount: amount as i64,
                account: account.to_string(),
                category: detail.merchant_category_description.clone(),
                location: detail.merchant_city.clone(),
                vendor: detail.merchant_name.clone(),
            }
        })
        .collect()
}
