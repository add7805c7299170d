//! Layered costs and the effective-cost resolver.
//!
//! Every costed entity carries up to five cost layers (estimated, quoted,
//! paid, actual, partially paid). The figure shown to the user is chosen by
//! walking a precedence order and taking the first layer that holds a
//! positive amount. Stored data is forgiving: layers may be missing, spelled
//! with legacy field names, or hold strings; all of that normalises to a
//! finite number, with anything unusable becoming zero.

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::fields::{CostModel, CostSource};

/// Plain dollar amount. Currency is a presentation concern.
pub type Money = f64;

const ESTIMATED_KEYS: &[&str] = &["estimated", "estimatedCost", "estimated_cost", "estimate"];
const QUOTED_KEYS: &[&str] = &["quoted", "quotedCost", "quoted_cost", "quote"];
const PAID_KEYS: &[&str] = &["paid", "paidCost", "amount_paid", "amountPaid", "paid_cost"];
const ACTUAL_KEYS: &[&str] = &["actual", "actualCost", "actual_cost"];
const PARTIALLY_PAID_KEYS: &[&str] = &[
    "partiallyPaid",
    "partially_paid",
    "partiallyPaidCost",
    "partially_paid_cost",
];

const ACTUAL_FIRST: &[CostSource] = &[
    CostSource::Actual,
    CostSource::Paid,
    CostSource::PartiallyPaid,
    CostSource::Quoted,
    CostSource::Estimated,
];
const PAID_FIRST: &[CostSource] = &[
    CostSource::Paid,
    CostSource::Actual,
    CostSource::PartiallyPaid,
    CostSource::Quoted,
    CostSource::Estimated,
];
const QUOTED_FIRST: &[CostSource] = &[
    CostSource::Quoted,
    CostSource::Actual,
    CostSource::Paid,
    CostSource::PartiallyPaid,
    CostSource::Estimated,
];
const ESTIMATED_FIRST: &[CostSource] = &[
    CostSource::Estimated,
    CostSource::Quoted,
    CostSource::Actual,
    CostSource::Paid,
    CostSource::PartiallyPaid,
];

/// The cost layers attached to a task or entity.
///
/// Serialises with canonical names. Deserialisation goes through a raw JSON
/// value so legacy aliases (`paidCost`, `amount_paid`, `actualCost`, ...) and
/// string amounts are accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct CostLayer {
    pub estimated: Money,
    pub quoted: Money,
    pub paid: Money,
    pub actual: Money,
    pub partially_paid: Money,
}

impl From<Value> for CostLayer {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => CostLayer::from_fields(&map),
            _ => CostLayer::default(),
        }
    }
}

impl CostLayer {
    /// Build a layer from an object holding canonical or legacy field names.
    /// The first non-null, non-empty alias of each layer wins.
    pub fn from_fields(map: &Map<String, Value>) -> Self {
        CostLayer {
            estimated: pick(map, ESTIMATED_KEYS),
            quoted: pick(map, QUOTED_KEYS),
            paid: pick(map, PAID_KEYS),
            actual: pick(map, ACTUAL_KEYS),
            partially_paid: pick(map, PARTIALLY_PAID_KEYS),
        }
    }

    pub fn estimated(amount: Money) -> Self {
        CostLayer { estimated: amount, ..Default::default() }
    }

    /// Normalised value of a single layer.
    pub fn get(&self, source: CostSource) -> Money {
        let raw = match source {
            CostSource::Actual => self.actual,
            CostSource::Paid => self.paid,
            CostSource::PartiallyPaid => self.partially_paid,
            CostSource::Quoted => self.quoted,
            CostSource::Estimated => self.estimated,
        };
        finite_or_zero(raw)
    }

    pub fn set(&mut self, source: CostSource, amount: Money) {
        let slot = match source {
            CostSource::Actual => &mut self.actual,
            CostSource::Paid => &mut self.paid,
            CostSource::PartiallyPaid => &mut self.partially_paid,
            CostSource::Quoted => &mut self.quoted,
            CostSource::Estimated => &mut self.estimated,
        };
        *slot = finite_or_zero(amount);
    }

    pub fn is_empty(&self) -> bool {
        ACTUAL_FIRST.iter().all(|s| self.get(*s) == 0.0)
    }
}

/// An effective cost together with the layer it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedCost {
    pub value: Money,
    pub source: CostSource,
}

fn pick(map: &Map<String, Value>, keys: &[&str]) -> Money {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
        .map(normalize_money)
        .unwrap_or(0.0)
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Coerce a stored JSON value to an amount. Numbers pass through, numeric
/// strings are parsed (a leading `$` and thousands separators are ignored),
/// everything else is zero.
pub fn normalize_money(value: &Value) -> Money {
    match value {
        Value::Number(n) => n.as_f64().map(finite_or_zero).unwrap_or(0.0),
        Value::String(s) => {
            let cleaned: String =
                s.trim().trim_start_matches('$').chars().filter(|c| *c != ',').collect();
            cleaned.trim().parse::<f64>().map(finite_or_zero).unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

/// Serde helper for single money fields stored by forms (numbers or strings).
pub fn deserialize_money<'de, D>(deserializer: D) -> Result<Money, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_money(&value))
}

impl CostModel {
    /// Parse a stored model name, falling back to the default on anything
    /// unrecognised.
    pub fn from_setting(name: &str) -> CostModel {
        let key = name.trim().to_lowercase().replace(['-', '_', ' '], "");
        match key.as_str() {
            "actualfirst" | "actual" => CostModel::ActualFirst,
            "paidfirst" | "paid" => CostModel::PaidFirst,
            "quotedfirst" | "quoted" => CostModel::QuotedFirst,
            "estimatedfirst" | "estimated" => CostModel::EstimatedFirst,
            "custom" => CostModel::Custom,
            _ => {
                warn!(model = name, "unknown cost model, using actual-first");
                CostModel::default()
            }
        }
    }
}

/// Validate a stored custom order. It must be non-empty and name only known
/// sources.
pub fn parse_custom_order(order: &[String]) -> Option<Vec<CostSource>> {
    if order.is_empty() {
        return None;
    }
    order.iter().map(|name| CostSource::from_name(name)).collect()
}

/// The precedence order for a model. `Custom` uses `custom_order` when it is
/// valid and the default order otherwise.
pub fn precedence(model: CostModel, custom_order: Option<&[String]>) -> Cow<'static, [CostSource]> {
    match model {
        CostModel::ActualFirst => Cow::Borrowed(ACTUAL_FIRST),
        CostModel::PaidFirst => Cow::Borrowed(PAID_FIRST),
        CostModel::QuotedFirst => Cow::Borrowed(QUOTED_FIRST),
        CostModel::EstimatedFirst => Cow::Borrowed(ESTIMATED_FIRST),
        CostModel::Custom => match custom_order.and_then(parse_custom_order) {
            Some(order) => Cow::Owned(order),
            None => {
                warn!(?custom_order, "invalid custom cost precedence, using actual-first");
                Cow::Borrowed(ACTUAL_FIRST)
            }
        },
    }
}

/// Resolve the effective cost of a layer.
///
/// Walks the precedence order and returns the first source holding a value
/// above zero. When no layer is positive the estimated layer is returned,
/// even if it is zero.
pub fn resolve(
    cost: &CostLayer,
    model: CostModel,
    custom_order: Option<&[String]>,
) -> ResolvedCost {
    precedence(model, custom_order)
        .iter()
        .map(|&source| ResolvedCost { value: cost.get(source), source })
        .find(|r| r.value > 0.0)
        .unwrap_or(ResolvedCost {
            value: cost.get(CostSource::Estimated),
            source: CostSource::Estimated,
        })
}

/// Resolve directly from a raw stored object (legacy field names allowed).
pub fn resolve_value(
    value: &Value,
    model: CostModel,
    custom_order: Option<&[String]>,
) -> ResolvedCost {
    resolve(&CostLayer::from(value.clone()), model, custom_order)
}

/// Cost settings threaded through read paths: the model and, for
/// `Custom`, the stored precedence order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostPolicy<'a> {
    pub model: CostModel,
    pub custom_order: Option<&'a [String]>,
}

impl<'a> CostPolicy<'a> {
    pub fn new(model: CostModel, custom_order: Option<&'a [String]>) -> Self {
        CostPolicy { model, custom_order }
    }

    pub fn resolve(&self, cost: &CostLayer) -> ResolvedCost {
        resolve(cost, self.model, self.custom_order)
    }
}

/// Money actually committed: actual, then paid, then partially paid.
/// Quotes and estimates are never committed spend.
pub fn committed_cost(cost: &CostLayer) -> Money {
    [CostSource::Actual, CostSource::Paid, CostSource::PartiallyPaid]
        .into_iter()
        .map(|s| cost.get(s))
        .find(|v| *v > 0.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MODELS: [CostModel; 5] = [
        CostModel::ActualFirst,
        CostModel::PaidFirst,
        CostModel::QuotedFirst,
        CostModel::EstimatedFirst,
        CostModel::Custom,
    ];

    #[test]
    fn test_estimate_then_quote_then_paid() {
        let mut cost = CostLayer::estimated(500.0);
        let r = resolve(&cost, CostModel::ActualFirst, None);
        assert_eq!(r, ResolvedCost { value: 500.0, source: CostSource::Estimated });

        cost.quoted = 650.0;
        assert_eq!(resolve(&cost, CostModel::ActualFirst, None).value, 650.0);
        assert_eq!(resolve(&cost, CostModel::QuotedFirst, None).source, CostSource::Quoted);

        cost.paid = 700.0;
        let r = resolve(&cost, CostModel::ActualFirst, None);
        assert_eq!(r, ResolvedCost { value: 700.0, source: CostSource::Paid });
        assert_eq!(resolve(&cost, CostModel::PaidFirst, None).value, 700.0);
        assert_eq!(resolve(&cost, CostModel::QuotedFirst, None).value, 650.0);
        assert_eq!(resolve(&cost, CostModel::EstimatedFirst, None).value, 500.0);
    }

    #[test]
    fn test_all_zero_falls_back_to_estimated() {
        let cost = CostLayer::default();
        for model in MODELS {
            let r = resolve(&cost, model, None);
            assert_eq!(r, ResolvedCost { value: 0.0, source: CostSource::Estimated });
        }
    }

    #[test]
    fn test_paid_first_always_takes_paid() {
        let cost = CostLayer {
            estimated: 10.0,
            quoted: 20.0,
            paid: 5.0,
            actual: 99.0,
            partially_paid: 1.0,
        };
        assert_eq!(
            resolve(&cost, CostModel::PaidFirst, None),
            ResolvedCost { value: 5.0, source: CostSource::Paid }
        );
    }

    #[test]
    fn test_legacy_aliases_and_strings() {
        let v = json!({
            "estimatedCost": "1,200",
            "paidCost": null,
            "amount_paid": "$300",
            "actualCost": "",
            "quote": "not a number"
        });
        let cost = CostLayer::from(v.clone());
        assert_eq!(cost.estimated, 1200.0);
        assert_eq!(cost.paid, 300.0);
        assert_eq!(cost.actual, 0.0);
        assert_eq!(cost.quoted, 0.0);
        assert_eq!(resolve_value(&v, CostModel::ActualFirst, None).source, CostSource::Paid);
    }

    #[test]
    fn test_first_alias_wins() {
        let cost = CostLayer::from(json!({ "paid": 10, "paidCost": 20 }));
        assert_eq!(cost.paid, 10.0);
    }

    #[test]
    fn test_non_finite_is_zero() {
        let cost = CostLayer { estimated: f64::NAN, quoted: f64::INFINITY, ..Default::default() };
        assert_eq!(resolve(&cost, CostModel::QuotedFirst, None).value, 0.0);
    }

    #[test]
    fn test_custom_order() {
        let cost = CostLayer { estimated: 100.0, quoted: 200.0, ..Default::default() };
        let order = vec!["estimated".to_string(), "quoted".to_string()];
        let source = |order: Option<&[String]>| resolve(&cost, CostModel::Custom, order).source;
        assert_eq!(source(Some(order.as_slice())), CostSource::Estimated);

        let bad = vec!["estimated".to_string(), "vibes".to_string()];
        assert_eq!(source(Some(bad.as_slice())), CostSource::Quoted);
        assert_eq!(source(Some(&[][..])), CostSource::Quoted);
        assert_eq!(source(None), CostSource::Quoted);
    }

    #[test]
    fn test_unknown_model_name_uses_default() {
        assert_eq!(CostModel::from_setting("paid-first"), CostModel::PaidFirst);
        assert_eq!(CostModel::from_setting("quotedFirst"), CostModel::QuotedFirst);
        assert_eq!(CostModel::from_setting("cheapest"), CostModel::ActualFirst);
    }

    #[test]
    fn test_resolver_does_not_mutate() {
        let cost =
            CostLayer { estimated: 1.0, quoted: 2.0, paid: 3.0, actual: 4.0, partially_paid: 5.0 };
        let before = cost;
        for model in MODELS {
            let _ = resolve(&cost, model, None);
        }
        assert_eq!(cost, before);
    }

    #[test]
    fn test_committed_cost() {
        assert_eq!(committed_cost(&CostLayer { quoted: 50.0, ..Default::default() }), 0.0);
        assert_eq!(committed_cost(&CostLayer { partially_paid: 25.0, ..Default::default() }), 25.0);
        let settled = CostLayer { paid: 40.0, actual: 45.0, ..Default::default() };
        assert_eq!(committed_cost(&settled), 45.0);
    }

    #[test]
    fn test_serialises_canonical_names() {
        let json =
            serde_json::to_value(CostLayer { partially_paid: 5.0, ..Default::default() }).unwrap();
        assert_eq!(json["partiallyPaid"], 5.0);
        let back: CostLayer = serde_json::from_value(json).unwrap();
        assert_eq!(back.partially_paid, 5.0);
    }
}
