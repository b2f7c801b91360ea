use serde::Serialize;

use crate::types::{Campaign, CampaignReview};

pub const INDEPENDENT_SELLER: &str = "Independent Seller";

/// Credit accounting across a campaign's products. The backend does the
/// bookkeeping; this only sums what it reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditUsage {
    pub budget: i64,
    pub spent: i64,
    pub remaining: i64,
}

impl CreditUsage {
    pub fn of(campaign: &Campaign) -> Self {
        CreditUsage {
            budget: campaign.total_credits,
            spent: campaign.products.iter().map(|p| p.spent()).sum(),
            remaining: campaign.products.iter().map(|p| p.remaining_credits).sum(),
        }
    }
}

/// The most recent moderation decision, if any.
pub fn latest_review(campaign: &Campaign) -> Option<&CampaignReview> {
    campaign.reviews.first()
}

pub fn seller_name(campaign: &Campaign) -> &str {
    campaign
        .seller
        .as_ref()
        .map(|s| s.name.as_str())
        .unwrap_or(INDEPENDENT_SELLER)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignView {
    pub campaign: Campaign,
    pub usage: CreditUsage,
    pub latest_review: Option<CampaignReview>,
}

impl CampaignView {
    pub fn new(campaign: Campaign) -> Self {
        CampaignView {
            usage: CreditUsage::of(&campaign),
            latest_review: latest_review(&campaign).cloned(),
            campaign,
        }
    }
}
