// Models module - Database entity representations

pub mod bot_user;
pub mod product;
pub mod sale;
pub mod subscription;
pub mod summary;

pub use bot_user::BotUser;
pub use product::{NewProduct, Product, ProductUpdate};
pub use sale::{NewSale, Sale, SaleUpdate};
pub use subscription::SubscriptionRow;
pub use summary::{SaleLine, SalesTotals};
