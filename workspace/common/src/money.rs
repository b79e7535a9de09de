use rust_decimal::Decimal;
use rusty_money::{iso, Money};
use tracing::warn;

/// Formats an amount for humans using the ISO 4217 rules of `currency_code`,
/// e.g. `$100.000,00` for COP. Unknown codes fall back to `"<amount> <code>"`.
pub fn format_amount(amount: Decimal, currency_code: &str) -> String {
    match iso::find(currency_code) {
        Some(currency) => Money::from_decimal(amount, currency).to_string(),
        None => {
            warn!("Unknown currency code '{}', using plain formatting", currency_code);
            format!("{} {}", amount.round_dp(2), currency_code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_currency_uses_symbol() {
        let formatted = format_amount(Decimal::new(10000, 2), "USD");
        assert_eq!(formatted, "$100.00");
    }

    #[test]
    fn test_unknown_currency_falls_back() {
        let formatted = format_amount(Decimal::new(12345, 2), "XXZ");
        assert_eq!(formatted, "123.45 XXZ");
    }
}
