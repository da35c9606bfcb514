use csv::Writer;

use crate::models::Sale;

const SALE_COLUMNS: [&str; 14] = [
    "sale_id",
    "channel",
    "sale_product",
    "duration",
    "quantity",
    "renew",
    "customer",
    "email",
    "purchased_date",
    "expired_date",
    "manager",
    "note",
    "price",
    "profit",
];

/// Renders sales as RFC 4180 CSV with a header row
pub fn sales_to_csv(sales: &[Sale]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(SALE_COLUMNS)?;

    for sale in sales {
        writer.write_record([
            sale.sale_id.to_string(),
            sale.channel.to_string(),
            sale.sale_product.clone(),
            sale.duration.to_string(),
            sale.quantity.to_string(),
            sale.renew.to_string(),
            sale.customer.clone(),
            sale.email.clone().unwrap_or_default(),
            sale.purchased_date.format("%Y-%m-%d").to_string(),
            sale.expired_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            sale.manager.clone().unwrap_or_default(),
            sale.note.clone().unwrap_or_default(),
            sale.price.to_string(),
            sale.profit.to_string(),
        ])?;
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// File name offered for download, e.g. `retail_sales_2024-03.csv`
pub fn export_file_name(channel: &str, month: Option<&str>) -> String {
    match month {
        Some(month) => format!("{}_sales_{}.csv", channel, month),
        None => format!("{}_sales.csv", channel),
    }
}
