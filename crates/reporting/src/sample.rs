//! Sample adequacy: how much to trust a campaign's ROI given its click volume.

use campaign_core::config::SampleConfig;
use campaign_core::types::SampleTier;

/// `< red_below` is red, `> green_above` is green, anything between
/// (both ends inclusive) is yellow.
pub fn classify_sample(avg_daily_clicks: f64, config: &SampleConfig) -> SampleTier {
    if avg_daily_clicks < config.red_below {
        SampleTier::Red
    } else if avg_daily_clicks > config.green_above {
        SampleTier::Green
    } else {
        SampleTier::Yellow
    }
}
