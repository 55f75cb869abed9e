use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Standard,
    Premium,
}

impl Plan {
    pub fn parse(s: &str) -> Result<Plan, String> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            other => Err(format!(
                "{} is not a known plan. Use 'free', 'standard' or 'premium'.",
                other
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Standard => "standard",
            Plan::Premium => "premium",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }

    /// How many photos a producer may attach to their profile.
    pub fn photo_limit(&self) -> i64 {
        match self {
            Plan::Free => 3,
            Plan::Standard => 10,
            Plan::Premium => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Free,
    Active,
    Canceled,
}

impl SubscriptionStatus {
    pub fn parse(s: &str) -> Result<SubscriptionStatus, String> {
        match s {
            "free" => Ok(Self::Free),
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!("{} is not a known subscription status.", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Free => "free",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}
