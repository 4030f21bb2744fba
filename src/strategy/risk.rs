use crate::config::RiskConfig;
use crate::portfolio::AccountState;

//chooses the percent of balance risked on a day's trades
pub trait RiskPolicy: Send + Sync {
    //evaluated once per day, before that day's orders are placed
    fn risk_percent(&self, account: &AccountState) -> f64;

    fn name(&self) -> &str;
}

//base risk while drawdown stays above the threshold, reduced risk otherwise
//risk returns to base once the balance recovers past the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownRisk {
    pub base_risk: f64,
    pub reduced_risk: f64,
    pub dd_threshold: f64,
}

impl DrawdownRisk {
    pub fn new(base_risk: f64, reduced_risk: f64, dd_threshold: f64) -> Self {
        DrawdownRisk {
            base_risk,
            reduced_risk,
            dd_threshold,
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.base_risk, config.reduced_risk, config.dd_threshold)
    }
}

impl RiskPolicy for DrawdownRisk {
    fn risk_percent(&self, account: &AccountState) -> f64 {
        if account.drawdown() > self.dd_threshold {
            self.base_risk
        } else {
            self.reduced_risk
        }
    }

    fn name(&self) -> &str {
        "Drawdown Half-Risk"
    }
}

//constant risk regardless of account state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRisk {
    pub percent: f64,
}

impl RiskPolicy for FixedRisk {
    fn risk_percent(&self, _account: &AccountState) -> f64 {
        self.percent
    }

    fn name(&self) -> &str {
        "Fixed Risk"
    }
}
