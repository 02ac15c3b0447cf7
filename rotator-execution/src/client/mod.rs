/// Binance Convert signed client.
pub mod binance;
