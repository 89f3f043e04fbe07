//! Payment link building
//!
//! Turns a resolved transaction into an app deep link plus a web fallback.
//! When the organizer is the sender the link pays the other side; otherwise
//! it charges (requests from) the sender.

use crate::{
    config::LinkConfig,
    money::format_amount,
    types::{PaymentHandle, ResolvedTransaction},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

/// Links for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinks {
    /// App deep link
    pub deep_link: String,

    /// Browser fallback
    pub web_link: String,

    /// True when the link charges the counterparty rather than paying them
    pub is_request: bool,
}

/// Payment link builder
#[derive(Debug, Clone, Default)]
pub struct LinkBuilder {
    config: LinkConfig,
}

impl LinkBuilder {
    /// Create new link builder
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }

    /// Note shown in the payment app
    pub fn note(&self, label: &str) -> String {
        format!("{} - {}", self.config.note_prefix, label)
    }

    /// Build links for `transaction` as acted on by `organizer`
    pub fn build(
        &self,
        transaction: &ResolvedTransaction,
        organizer: &PaymentHandle,
    ) -> Result<PaymentLinks> {
        if transaction.from == transaction.to {
            return Err(Error::Link(format!(
                "transaction sends {} to itself",
                transaction.from
            )));
        }

        let organizer_pays = &transaction.from == organizer;
        let target = if organizer_pays {
            &transaction.to
        } else {
            &transaction.from
        };
        let is_request = !organizer_pays;
        let action = if is_request { "charge" } else { "pay" };
        let amount = format_amount(transaction.amount);
        let note = self.note(&transaction.label);

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("txn", action)
            .append_pair("recipients", target.recipient())
            .append_pair("amount", &amount)
            .append_pair("note", &note)
            .finish();
        let deep_link = format!("{}?{}", self.config.deep_link_base, query);

        let mut web = Url::parse(&self.config.web_base_url)
            .map_err(|e| Error::Link(format!("invalid web base url: {}", e)))?;
        web.path_segments_mut()
            .map_err(|_| Error::Link("web base url cannot take a path".to_string()))?
            .pop_if_empty()
            .push(action)
            .push(target.recipient());
        web.set_query(None);
        // Built by hand: `Url` would re-escape the quote characters kept by `encode_component`
        let web_link = format!("{}?amount={}&note={}", web, amount, encode_component(&note));

        tracing::debug!(
            recipient = %target,
            amount = %amount,
            is_request,
            "Built payment links"
        );

        Ok(PaymentLinks {
            deep_link,
            web_link,
            is_request,
        })
    }
}

/// Escape like a browser's `encodeURIComponent`
///
/// Spaces become `%20`, and `! ' ( ) ~` stay literal, unlike form encoding.
fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%7E", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;
    use rust_decimal_macros::dec;

    fn handle(raw: &str) -> PaymentHandle {
        PaymentHandle::parse(raw).unwrap()
    }

    #[test]
    fn test_request_becomes_charge() {
        let host = handle("@host");
        let tx = Transaction::request(handle("@bob"), dec!(50), "bob owes $50.00").resolve(&host);

        let links = LinkBuilder::default().build(&tx, &host).unwrap();
        assert!(links.is_request);
        assert_eq!(
            links.deep_link,
            "venmo://paycharge?txn=charge&recipients=bob&amount=50.00\
             &note=Poker+Night+Settlement+-+bob+owes+%2450.00"
        );
        assert_eq!(
            links.web_link,
            "https://venmo.com/charge/bob?amount=50.00\
             &note=Poker%20Night%20Settlement%20-%20bob%20owes%20%2450.00"
        );
    }

    #[test]
    fn test_payout_becomes_pay() {
        let host = handle("@host");
        let tx = Transaction::payout(handle("@amy"), dec!(12.5), "amy won $12.50").resolve(&host);

        let links = LinkBuilder::default().build(&tx, &host).unwrap();
        assert!(!links.is_request);
        assert!(links.deep_link.starts_with("venmo://paycharge?txn=pay&recipients=amy&amount=12.50"));
        assert!(links.web_link.starts_with("https://venmo.com/pay/amy?amount=12.50"));
    }

    #[test]
    fn test_web_note_matches_uri_component_escaping() {
        assert_eq!(encode_component("a b+c"), "a%20b%2Bc");
        assert_eq!(encode_component("O'Neil (host) won!~"), "O'Neil%20(host)%20won!~");
        assert_eq!(encode_component("100% & more"), "100%25%20%26%20more");
        assert_eq!(encode_component("-_.*"), "-_.*");

        let host = handle("@host");
        let tx = Transaction::request(handle("@bob"), dec!(5), "O'Neil owes $5.00").resolve(&host);
        let links = LinkBuilder::default().build(&tx, &host).unwrap();
        assert!(links.web_link.ends_with("&note=Poker%20Night%20Settlement%20-%20O'Neil%20owes%20%245.00"));
        assert!(links.deep_link.ends_with("&note=Poker+Night+Settlement+-+O%27Neil+owes+%245.00"));
    }

    #[test]
    fn test_custom_note_prefix() {
        let builder = LinkBuilder::new(LinkConfig {
            note_prefix: "Game Night".to_string(),
            ..LinkConfig::default()
        });
        assert_eq!(builder.note("x"), "Game Night - x");
    }

    #[test]
    fn test_self_transfer_rejected() {
        let host = handle("@host");
        let tx = Transaction::payout(host.clone(), dec!(5), "host won $5.00").resolve(&host);
        assert!(LinkBuilder::default().build(&tx, &host).is_err());
    }
}
