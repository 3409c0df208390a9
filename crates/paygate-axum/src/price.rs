//! Price tags: the payment terms attached to a protected route.

use paygate_types::network::Network;
use paygate_types::proto::PaymentRequirements;
use paygate_types::util::{MoneyAmount, MoneyAmountParseError};

use crate::paygate::ResourceInfo;

/// Scheme identifier of a fixed-amount transfer.
pub const EXACT_SCHEME: &str = "exact";

/// How long a signed authorization stays acceptable, unless overridden.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 60;

/// Payment terms for one accepted way of paying.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTag {
    pub scheme: String,
    /// Recipient address. `None` leaves the gate unable to accept any payment.
    pub pay_to: Option<String>,
    pub asset: String,
    pub network: Network,
    /// Amount in the asset's atomic units.
    pub amount: String,
    pub max_timeout_seconds: u64,
    pub extra: Option<serde_json::Value>,
}

impl PriceTag {
    /// Prices a route in USDC on `network`, converting a human price like `"$0.10"`.
    ///
    /// # Errors
    ///
    /// Returns an error if `price` is not a valid amount for a 6-decimal token.
    pub fn usdc(
        network: Network,
        pay_to: Option<String>,
        price: &str,
    ) -> Result<Self, MoneyAmountParseError> {
        let usdc = network.usdc();
        let amount = MoneyAmount::parse(price)?.to_token_units(usdc.decimals)?;
        Ok(Self {
            scheme: EXACT_SCHEME.to_string(),
            pay_to,
            asset: usdc.address.to_string(),
            network,
            amount,
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            extra: Some(usdc.eip712_extra()),
        })
    }

    /// Sets the maximum timeout for this price tag.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// Whether the tag names someone to pay.
    pub fn has_recipient(&self) -> bool {
        self.pay_to.as_deref().is_some_and(|pay_to| !pay_to.is_empty())
    }

    /// Expands the tag into wire requirements for a concrete resource.
    pub fn to_requirements(&self, resource: &ResourceInfo) -> PaymentRequirements {
        PaymentRequirements {
            scheme: self.scheme.clone(),
            network: self.network.to_string(),
            max_amount_required: self.amount.clone(),
            resource: resource.url.clone(),
            description: resource.description.clone(),
            mime_type: resource.mime_type.clone(),
            output_schema: None,
            pay_to: self.pay_to.clone().unwrap_or_default(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.clone(),
            extra: self.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource() -> ResourceInfo {
        ResourceInfo {
            description: "Video access".to_string(),
            mime_type: "text/html".to_string(),
            url: "http://localhost:4021/authenticate".to_string(),
        }
    }

    #[test]
    fn test_usdc_price_tag_on_base_sepolia() {
        let tag = PriceTag::usdc(Network::BaseSepolia, Some("0xabc".into()), "$0.10").unwrap();
        assert_eq!(tag.amount, "100000");
        assert_eq!(tag.asset, "0x036CbD53842c5426634e7929541eC2318f3dCF7e");
        assert_eq!(tag.scheme, "exact");
        assert!(tag.has_recipient());
    }

    #[test]
    fn test_requirements_carry_resource_and_empty_recipient() {
        let tag = PriceTag::usdc(Network::Base, None, "$1").unwrap().with_timeout(30);
        let requirements = tag.to_requirements(&resource());
        assert_eq!(requirements.network, "base");
        assert_eq!(requirements.max_amount_required, "1000000");
        assert_eq!(requirements.pay_to, "");
        assert_eq!(requirements.max_timeout_seconds, 30);
        assert_eq!(requirements.resource, "http://localhost:4021/authenticate");
        assert!(!tag.has_recipient());
    }

    #[test]
    fn test_invalid_price_is_rejected() {
        assert!(PriceTag::usdc(Network::BaseSepolia, None, "ten cents").is_err());
    }
}
