//! User settings stored alongside the project data.
//!
//! Settings are read at call time and handed to the engine as explicit
//! parameters: a `CostPolicy` for cost reads and a `Scheduler` for deadline
//! generation. Nothing in the engine reads them on its own.

use serde::{Deserialize, Serialize};

use crate::cost::{parse_custom_order, CostPolicy};
use crate::error::{Error, Result};
use crate::fields::CostModel;
use crate::offsets::UserOffsets;
use crate::schedule::Scheduler;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Stored model name; unknown names fall back to actual-first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cost_precedence_order: Vec<String>,
    #[serde(default)]
    pub user_offsets: UserOffsets,
}

impl Settings {
    pub fn cost_model(&self) -> CostModel {
        self.cost_model
            .as_deref()
            .map(CostModel::from_setting)
            .unwrap_or_default()
    }

    /// Cost policy for this run. `model_override` comes from the command line.
    pub fn policy(&self, model_override: Option<CostModel>) -> CostPolicy<'_> {
        let order = if self.cost_precedence_order.is_empty() {
            None
        } else {
            Some(self.cost_precedence_order.as_slice())
        };
        CostPolicy::new(model_override.unwrap_or_else(|| self.cost_model()), order)
    }

    pub fn scheduler(&self) -> Scheduler<'_> {
        Scheduler::new(&self.user_offsets)
    }

    pub fn set_cost_model(&mut self, model: CostModel) {
        let name = serde_json::to_value(model)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string));
        self.cost_model = name;
    }

    /// Store a custom order and switch to the custom model. Unlike stored
    /// data, user input is rejected when it names an unknown source.
    pub fn set_custom_order(&mut self, names: &[String]) -> Result<()> {
        let names: Vec<String> = names
            .iter()
            .flat_map(|s| s.split(','))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if parse_custom_order(&names).is_none() {
            return Err(Error::InvalidInput(format!(
                "cost order must list sources from \
                 actual, paid, partially_paid, quoted, estimated (got {})",
                names.join(",")
            )));
        }
        self.cost_precedence_order = names;
        self.set_cost_model(CostModel::Custom);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostLayer;
    use crate::fields::CostSource;
    use serde_json::json;

    #[test]
    fn test_load_stored_settings() {
        let s: Settings = serde_json::from_value(json!({
            "costModel": "paidFirst",
            "userOffsets": { "song": { "Mix": 30, "Master": -2 } }
        }))
        .unwrap();
        assert_eq!(s.cost_model(), CostModel::PaidFirst);
        assert_eq!(s.scheduler().offset("Mix", crate::fields::Category::Song, None), 30);
        assert_eq!(s.scheduler().offset("Master", crate::fields::Category::Song, None), 21);
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let s = Settings { cost_model: Some("cheapest-first".into()), ..Default::default() };
        assert_eq!(s.cost_model(), CostModel::ActualFirst);
    }

    #[test]
    fn test_custom_order_round_trip() {
        let mut s = Settings::default();
        assert!(s.set_custom_order(&["quoted,nope".to_string()]).is_err());
        assert!(s.cost_precedence_order.is_empty());

        s.set_custom_order(&["estimated, quoted".to_string()]).unwrap();
        assert_eq!(s.cost_model(), CostModel::Custom);
        let cost = CostLayer { estimated: 5.0, quoted: 9.0, ..Default::default() };
        assert_eq!(s.policy(None).resolve(&cost).source, CostSource::Estimated);
        let quoted_first = s.policy(Some(CostModel::QuotedFirst));
        assert_eq!(quoted_first.resolve(&cost).source, CostSource::Quoted);

        let back: Settings = serde_json::from_value(serde_json::to_value(&s).unwrap()).unwrap();
        assert_eq!(back, s);
    }
}
