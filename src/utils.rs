use rust_decimal::Decimal;
use std::str::FromStr;

/// 8-decimal fixed rendering, "1.00000000" 형식
pub fn fixed8(amount: Decimal) -> String {
  format!("{:.8}", amount)
}

pub fn fixed8_from_f64(value: f64) -> String {
  match Decimal::from_f64_retain(value) {
    Some(d) => fixed8(d.round_dp(8)),
    None => fixed8(Decimal::ZERO),
  }
}

/// Lenient amount parse, empty or malformed strings count as zero the way
/// the fee summation treats unresolved inputs.
pub fn parse_amount(value: &str) -> Decimal {
  Decimal::from_str(value).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fixed8_pads_trailing_zeros() {
    assert_eq!(fixed8(Decimal::from_str("1").unwrap()), "1.00000000");
    assert_eq!(fixed8(Decimal::from_str("2.5").unwrap()), "2.50000000");
    assert_eq!(fixed8(Decimal::ZERO), "0.00000000");
  }

  #[test]
  fn parse_amount_tolerates_empty() {
    assert_eq!(parse_amount(""), Decimal::ZERO);
    assert_eq!(parse_amount("0.1"), Decimal::from_str("0.1").unwrap());
  }
}
