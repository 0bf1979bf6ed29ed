mod binance;
mod fixture;

pub use binance::BinanceAdapter;
pub use fixture::FixtureAdapter;
