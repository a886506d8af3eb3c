use chrono::{Days, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db;
use crate::domain::{Month, Purchase};
use crate::error::{Error, Result};

const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Computes the next report trigger: today at `notify_hour:00:00` local, or
/// the same hour tomorrow when that instant has already passed. Advancing
/// by one calendar day, not 24 hours, keeps the trigger hour stable across
/// DST changes.
pub fn next_notify_instant(now: NaiveDateTime, notify_hour: u32) -> NaiveDateTime {
    let target = now.date().and_hms_opt(notify_hour, 0, 0).unwrap();
    if now > target {
        target.checked_add_days(Days::new(1)).unwrap()
    } else {
        target
    }
}

/// Sums purchases per configured category, in configured order. Categories
/// with no purchases total 0; categories present in the data but not
/// configured are left out.
pub fn category_totals(categories: &[String], purchases: &[Purchase]) -> Vec<(String, i64)> {
    categories
        .iter()
        .map(|category| {
            let total = purchases
                .iter()
                .filter(|p| &p.category == category)
                .map(|p| p.amount)
                .sum();
            (category.clone(), total)
        })
        .collect()
}

pub fn render_report(month_name: &str, total: i64, categories: &[(String, i64)]) -> String {
    let mut report = format!(
        "Spending so far in {}: {}\nspending in categories:",
        month_name, total
    );
    for (category, amount) in categories {
        report.push_str(&format!("\n{}: {}", category, amount));
    }
    report
}

/// Builds the current month's spending report and pushes it out. Any
/// failure abandons the report; the next one goes out tomorrow.
pub async fn send_report(
    pool: &SqlitePool,
    categories: &[String],
    notifier: &Notifier,
) -> Result<()> {
    let month = Month::containing(Local::now().date_naive());
    let purchases = db::query_purchases(pool, month).await?;

    let total = purchases.iter().map(|p| p.amount).sum();
    let breakdown = category_totals(categories, &purchases);
    let message = render_report(&month.name(), total, &breakdown);

    notifier.send(&message).await
}

#[derive(Debug, Serialize)]
struct PushoverMessage<'a> {
    user: &'a str,
    token: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i64,
    #[serde(default)]
    errors: Vec<String>,
}

/// Push-notification transport. One operation: send a text message.
pub struct Notifier {
    http: reqwest::Client,
    user: String,
    token: String,
}

impl Notifier {
    pub fn new(user: String, token: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("building HTTP client");
        Self { http, user, token }
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        let body = PushoverMessage {
            user: &self.user,
            token: &self.token,
            message,
        };

        let res = self
            .http
            .post(PUSHOVER_API_URL)
            .json(&body)
            .send()
            .await
            .map_err(|err| Error::Unavailable(format!("posting message: {}", err)))?;

        if !res.status().is_success() {
            return Err(Error::Unavailable(format!("got status {}", res.status())));
        }

        let parsed = res
            .json::<PushoverResponse>()
            .await
            .map_err(|err| Error::Malformed(format!("decoding response: {}", err)))?;
        delivery_result(parsed)
    }
}

fn delivery_result(res: PushoverResponse) -> Result<()> {
    if res.status != 1 {
        return Err(Error::RemoteRejected(format!(
            "status {}: {}",
            res.status,
            res.errors.join(", ")
        )));
    }
    Ok(())
}
