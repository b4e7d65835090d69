//! Backend adapters, one module per upstream.

pub mod eastmoney;
pub mod recent;
pub mod tencent;

pub use eastmoney::EastmoneyProvider;
pub use recent::RecentWindowProvider;
pub use tencent::TencentProvider;
