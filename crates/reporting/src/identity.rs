//! Campaign-name decoding: recovers merchant and affiliate identity from
//! the hyphen-delimited names used on the ads account.
//!
//! `0915-rw-US-12345` decodes to creation tag `0915`, affiliate `rw`,
//! country `US` and merchant `12345`. Token positions come from
//! [`NamingConfig`]; the merchant is always the last token. Tokens are
//! trimmed, and a blank affiliate or merchant token is an error.

use campaign_core::config::NamingConfig;
use campaign_core::error::ParseError;
use campaign_core::types::CampaignKey;

/// Stateless parser over a configured token layout.
#[derive(Debug, Clone, Default)]
pub struct CampaignNameParser {
    layout: NamingConfig,
}

impl CampaignNameParser {
    pub fn new(layout: NamingConfig) -> Self {
        Self { layout }
    }

    pub fn parse(&self, campaign_name: &str) -> Result<CampaignKey, ParseError> {
        let tokens: Vec<&str> = campaign_name.split('-').map(str::trim).collect();
        if tokens.len() < 2 {
            return Err(ParseError::TooFewTokens {
                name: campaign_name.to_string(),
                found: tokens.len(),
            });
        }

        let merchant_idx = tokens.len() - 1;
        // Two-token names have no room for a separate affiliate slot.
        let affiliate_idx = if self.layout.affiliate_index < merchant_idx {
            self.layout.affiliate_index
        } else {
            0
        };

        for idx in [affiliate_idx, merchant_idx] {
            if tokens[idx].is_empty() {
                return Err(ParseError::EmptyToken {
                    name: campaign_name.to_string(),
                    position: idx,
                });
            }
        }

        let tag_idx = self.layout.creation_tag_index;
        let creation_tag = tokens
            .get(tag_idx)
            .filter(|t| tag_idx != affiliate_idx && tag_idx != merchant_idx && !t.is_empty())
            .map(|t| t.to_string());

        let country_idx = self.layout.country_index;
        let country = tokens
            .get(country_idx)
            .filter(|t| {
                country_idx < merchant_idx
                    && country_idx != affiliate_idx
                    && country_idx != tag_idx
                    && t.len() == 2
                    && t.chars().all(|c| c.is_ascii_alphabetic())
            })
            .map(|t| t.to_ascii_uppercase());

        Ok(CampaignKey {
            merchant_id: tokens[merchant_idx].to_string(),
            affiliate_code: tokens[affiliate_idx].to_string(),
            country,
            creation_tag,
        })
    }
}

/// Parse with the default token layout.
pub fn parse_campaign_name(campaign_name: &str) -> Result<CampaignKey, ParseError> {
    CampaignNameParser::default().parse(campaign_name)
}
