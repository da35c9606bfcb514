use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::lifecycle::ClassifiedAlert;
use crate::models::{SaleLine, SalesTotals};

/// Alerts rendered into a single chat message
pub const ALERTS_PER_MESSAGE: usize = 15;
/// Sales lines rendered into a single chat message
pub const SALES_PER_MESSAGE: usize = 10;

pub const EXPIRING_TITLE: &str = "Expiring Products";
pub const RENEWALS_TITLE: &str = "Renewals Due Soon";

/// Escapes the characters legacy Telegram Markdown treats as markup
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '[' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Text placed inside a `code` span
///
/// Markup is not parsed inside code spans, but a backtick still ends the
/// span, so it is replaced with a look-alike quote.
fn code_span(text: &str) -> String {
    format!("`{}`", text.replace('`', "'"))
}

/// `05 Mar 2024`
pub fn format_date_readable(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

fn days_text(days_left: i64) -> String {
    if days_left == 0 {
        "Today!".to_string()
    } else {
        format!("{} day(s)", days_left)
    }
}

fn paginate<T>(title: &str, items: &[T], render: impl Fn(usize, &T) -> String) -> Vec<String> {
    items
        .chunks(ALERTS_PER_MESSAGE)
        .enumerate()
        .map(|(part, chunk)| {
            let mut message = if part == 0 {
                format!("*{}:*\n\n", title)
            } else {
                format!("*{} (Part {}):*\n\n", title, part + 1)
            };

            for (offset, item) in chunk.iter().enumerate() {
                message.push_str(&render(part * ALERTS_PER_MESSAGE + offset + 1, item));
            }

            message.trim_end().to_string()
        })
        .collect()
}

fn record_lines(alert: &ClassifiedAlert<'_>) -> String {
    let record = alert.record;
    format!(
        "Product: {}\nCustomer: {}\nEmail: {}\n{} to {}\n",
        escape_markdown(&record.product_label),
        code_span(&record.customer),
        code_span(record.email.as_deref().unwrap_or("-")),
        format_date_readable(record.purchased_date),
        format_date_readable(record.expired_date),
    )
}

pub fn format_expiring_message(alerts: &[ClassifiedAlert<'_>], horizon_days: i64) -> Vec<String> {
    if alerts.is_empty() {
        return vec![format!(
            "No {} within {} day(s).",
            EXPIRING_TITLE.to_lowercase(),
            horizon_days
        )];
    }

    paginate(EXPIRING_TITLE, alerts, |number, alert| {
        format!(
            "{}. {}Ends in: {}\n\n",
            number,
            record_lines(alert),
            days_text(alert.days_left)
        )
    })
}

pub fn format_renewals_message(alerts: &[ClassifiedAlert<'_>], horizon_days: i64) -> Vec<String> {
    if alerts.is_empty() {
        return vec![format!("No renewals due within {} day(s).", horizon_days)];
    }

    paginate(RENEWALS_TITLE, alerts, |number, alert| {
        format!(
            "{}. {}Next Due: {}\nDue in: {}\n\n",
            number,
            record_lines(alert),
            format_date_readable(alert.target_date),
            days_text(alert.days_left)
        )
    })
}

/// `1500.75 Ks`; whole amounts print without decimals
fn kyats(amount: Decimal) -> String {
    format!("{} Ks", amount.round_dp(2).normalize())
}

/// Daily and month-to-date totals
pub fn format_summary(day: NaiveDate, daily: &SalesTotals, monthly: &SalesTotals) -> String {
    format!(
        "*Sales Summary for {}*\n\n\
         *Daily Summary:*\nSales: {}\nProfit: {}\nOrders: {}\n\n\
         *Monthly Summary ({}):*\nTotal Sales: {}\nTotal Profit: {}\nTotal Orders: {}",
        day.format("%Y-%m-%d"),
        kyats(daily.total_sales),
        kyats(daily.total_profit),
        daily.sale_count,
        day.format("%B %Y"),
        kyats(monthly.total_sales),
        kyats(monthly.total_profit),
        monthly.sale_count,
    )
}

/// Itemized sales of a day, `SALES_PER_MESSAGE` per message
pub fn format_sales_lines(day: NaiveDate, today: NaiveDate, lines: &[SaleLine]) -> Vec<String> {
    let title = if day == today {
        "Today's Sales".to_string()
    } else {
        format!("Sales on {}", format_date_readable(day))
    };

    if lines.is_empty() {
        return vec![format!("*{}:* No sales", title)];
    }

    lines
        .chunks(SALES_PER_MESSAGE)
        .enumerate()
        .map(|(part, chunk)| {
            let mut message = format!("*{} ({} orders):*\n\n", title, lines.len());
            for (offset, line) in chunk.iter().enumerate() {
                message.push_str(&format!(
                    "{}. {}\nCustomer: {}\nPrice: {}\n\n",
                    part * SALES_PER_MESSAGE + offset + 1,
                    escape_markdown(&line.sale_product),
                    escape_markdown(&line.customer),
                    kyats(line.price),
                ));
            }
            message.trim_end().to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{AlertKind, Channel, SubscriptionRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(label: &str) -> SubscriptionRecord {
        SubscriptionRecord {
            product_label: label.to_string(),
            customer: "mg_mg".to_string(),
            email: None,
            purchased_date: date(2024, 1, 5),
            duration_months: 12,
            renewal_interval_months: 1,
            expired_date: date(2025, 1, 5),
            channel: Channel::Retail,
        }
    }

    fn alert(record: &SubscriptionRecord, kind: AlertKind, days_left: i64) -> ClassifiedAlert<'_> {
        ClassifiedAlert {
            record,
            kind,
            days_left,
            target_date: date(2024, 3, 5),
        }
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a_b*c[d]"), "a\\_b\\*c\\[d]");
        assert_eq!(escape_markdown("Zaw`s shop"), "Zaw\\`s shop");
    }

    #[test]
    fn test_backtick_in_customer_keeps_code_span_balanced() {
        let mut record = record("Retail - Netflix");
        record.customer = "Zaw`s `shop".to_string();
        let messages = format_expiring_message(&[alert(&record, AlertKind::Expiring, 1)], 1);

        assert!(messages[0].contains("Customer: `Zaw's 'shop`"));
        assert_eq!(messages[0].matches('`').count() % 2, 0);
    }

    #[test]
    fn test_format_date_readable() {
        assert_eq!(format_date_readable(date(2024, 3, 5)), "05 Mar 2024");
    }

    #[test]
    fn test_empty_messages() {
        assert_eq!(
            format_expiring_message(&[], 1),
            vec!["No expiring products within 1 day(s).".to_string()]
        );
        assert_eq!(
            format_renewals_message(&[], 2),
            vec!["No renewals due within 2 day(s).".to_string()]
        );
    }

    #[test]
    fn test_expiring_message_content() {
        let record = record("Retail - Canva_Pro");
        let messages = format_expiring_message(&[alert(&record, AlertKind::Expiring, 0)], 1);

        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert!(message.starts_with("*Expiring Products:*\n\n1. Product: Retail - Canva\\_Pro\n"));
        assert!(message.contains("Customer: `mg_mg`"));
        assert!(message.contains("Email: `-`"));
        assert!(message.contains("05 Jan 2024 to 05 Jan 2025"));
        assert!(message.ends_with("Ends in: Today!"));
    }

    #[test]
    fn test_renewals_message_content() {
        let record = record("Wholesale - Spotify");
        let messages = format_renewals_message(&[alert(&record, AlertKind::RenewalDue, 2)], 2);

        assert!(messages[0].starts_with("*Renewals Due Soon:*"));
        assert!(messages[0].contains("Next Due: 05 Mar 2024"));
        assert!(messages[0].ends_with("Due in: 2 day(s)"));
    }

    #[test]
    fn test_pagination_numbers_continue_across_parts() {
        let records: Vec<_> = (0..32).map(|i| record(&format!("Retail - P{}", i))).collect();
        let alerts: Vec<_> = records
            .iter()
            .map(|r| alert(r, AlertKind::Expiring, 1))
            .collect();

        let messages = format_expiring_message(&alerts, 1);
        assert_eq!(messages.len(), 3);
        assert!(messages[1].starts_with("*Expiring Products (Part 2):*\n\n16. "));
        assert!(messages[2].starts_with("*Expiring Products (Part 3):*\n\n31. "));
        assert!(messages[2].contains("32. Product: Retail - P31"));
    }

    #[test]
    fn test_format_summary() {
        let daily = SalesTotals {
            total_sales: Decimal::new(150075, 2),
            total_profit: Decimal::new(300, 0),
            sale_count: 3,
        };
        let monthly = SalesTotals {
            total_sales: Decimal::new(42000, 0),
            total_profit: Decimal::new(900010, 2),
            sale_count: 57,
        };

        let summary = format_summary(date(2024, 3, 5), &daily, &monthly);
        assert!(summary.starts_with("*Sales Summary for 2024-03-05*"));
        assert!(summary.contains("Sales: 1500.75 Ks"));
        assert!(summary.contains("Profit: 9000.1 Ks"));
        assert!(summary.contains("*Monthly Summary (March 2024):*"));
        assert!(summary.contains("Total Orders: 57"));
    }

    #[test]
    fn test_format_sales_lines() {
        let today = date(2024, 3, 5);
        assert_eq!(
            format_sales_lines(today, today, &[]),
            vec!["*Today's Sales:* No sales".to_string()]
        );
        assert_eq!(
            format_sales_lines(date(2024, 3, 1), today, &[]),
            vec!["*Sales on 01 Mar 2024:* No sales".to_string()]
        );

        let lines: Vec<_> = (0..11)
            .map(|i| SaleLine {
                sale_product: format!("Retail - P{}", i),
                customer: "Aye".to_string(),
                price: Decimal::new(100, 0),
                profit: Decimal::new(20, 0),
                manager: None,
                channel: Channel::Retail,
            })
            .collect();

        let messages = format_sales_lines(today, today, &lines);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("*Today's Sales (11 orders):*"));

        let messages = format_sales_lines(date(2024, 3, 1), today, &lines);
        assert!(messages[0].starts_with("*Sales on 01 Mar 2024 (11 orders):*"));
        assert!(messages[1].contains("11. Retail - P10"));
    }
}
