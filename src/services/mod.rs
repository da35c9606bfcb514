// Services module - Outbound integrations and message rendering

pub mod alert_formatter;
pub mod csv_export;
pub mod telegram;
