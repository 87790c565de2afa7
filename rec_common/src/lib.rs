mod currency;

pub mod helpers;
mod secret;

pub use currency::{CurrencyCode, CurrencyCodeError, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;
