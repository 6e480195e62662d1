// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use dormbite_config::model::PaymentsConfig;

/// Settlement account a customer pays into, chosen by the accepting
/// deliverer's handle. Unknown or missing handles get the default account.
pub fn settlement_account<'a>(payments: &'a PaymentsConfig, handle: Option<&str>) -> &'a str {
    handle
        .map(|h| h.trim_start_matches('@'))
        .and_then(|h| {
            payments
                .accounts
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(h))
        })
        .map(|(_, account)| account.as_str())
        .unwrap_or(payments.default_account.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_handle_gets_its_account() {
        let mut payments = PaymentsConfig::default();
        payments
            .accounts
            .insert("kebede_rides".into(), "1000111122223".into());

        assert_eq!(
            settlement_account(&payments, Some("@Kebede_Rides")),
            "1000111122223"
        );
        assert_eq!(
            settlement_account(&payments, Some("someone_else")),
            "1000397137833"
        );
        assert_eq!(settlement_account(&payments, None), "1000397137833");
    }
}
