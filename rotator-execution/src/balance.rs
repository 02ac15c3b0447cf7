use crate::{
    client::binance::BinanceConvertClient,
    error::ClientError,
};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::str::FromStr;

/// Venue wallet a Convert swap draws from. Convert defaults to Spot.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Wallet {
    #[default]
    Spot,
    Funding,
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wallet::Spot => write!(f, "SPOT"),
            Wallet::Funding => write!(f, "FUNDING"),
        }
    }
}

impl FromStr for Wallet {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "SPOT" | "" => Ok(Wallet::Spot),
            "FUNDING" | "EARN" => Ok(Wallet::Funding),
            other => Err(format!("wallet must be SPOT or FUNDING, got {other}")),
        }
    }
}

/// Free and locked amounts held for one asset in one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetBalance {
    pub asset: SmolStr,
    pub wallet: Wallet,
    pub free: Decimal,
    pub locked: Decimal,
}

/// Unified balance access over Spot and Funding wallets.
///
/// Only `free` amounts feed the returned map; locked funds cannot back a
/// Convert quote.
#[derive(Debug, Clone)]
pub struct BalanceReader {
    client: BinanceConvertClient,
}

impl BalanceReader {
    pub fn new(client: BinanceConvertClient) -> Self {
        Self { client }
    }

    /// Map of `asset -> free amount` for the requested wallet, zero balances
    /// dropped.
    pub async fn read_all(&self, wallet: Wallet) -> Result<IndexMap<SmolStr, Decimal>, ClientError> {
        let balances = match wallet {
            Wallet::Spot => self.client.spot_balances().await?,
            Wallet::Funding => self.client.funding_balances().await?,
        };

        Ok(balances
            .into_iter()
            .filter(|balance| balance.free > Decimal::ZERO)
            .map(|balance| (balance.asset, balance.free))
            .collect())
    }

    /// Free amount of a single asset in the requested wallet.
    pub async fn read_free(&self, asset: &str, wallet: Wallet) -> Result<Decimal, ClientError> {
        let asset = asset.to_ascii_uppercase();
        Ok(self
            .read_all(wallet)
            .await?
            .get(asset.as_str())
            .copied()
            .unwrap_or(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_from_str() {
        assert_eq!("spot".parse::<Wallet>().unwrap(), Wallet::Spot);
        assert_eq!("FUNDING".parse::<Wallet>().unwrap(), Wallet::Funding);
        assert_eq!("earn".parse::<Wallet>().unwrap(), Wallet::Funding);
        assert!("MARGIN".parse::<Wallet>().is_err());
    }
}
