use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// String-keyed mapping that keeps the order in which keys were first seen.
///
/// Row and column order of the rendered tables follows this order, so the
/// response's object key order is preserved through deserialization. A repeated
/// key keeps its first position and takes the last value.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for LeadMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> LeadMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn first(&self) -> Option<(&str, &V)> {
        self.entries.first().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for LeadMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = LeadMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for LeadMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for LeadMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LeadMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for LeadMapVisitor<V> {
            type Value = LeadMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = LeadMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(LeadMapVisitor(PhantomData))
    }
}

/// HRV metric value: a scalar statistic or a curve such as a PSD.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Series(Vec<f64>),
}

/// Payload returned by `/analyze` and `/analyze-sample`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResult {
    pub hrv_metrics: LeadMap<LeadMap<MetricValue>>,
    pub predictions: LeadMap<LeadMap<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_samples: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_symbols: Option<Vec<String>>,
}

impl AnalysisResult {
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Tally of reference annotation symbols in first-seen order.
    pub fn annotation_counts(&self) -> Option<LeadMap<u64>> {
        let symbols = self.annotation_symbols.as_ref()?;
        let mut counts: LeadMap<u64> = LeadMap::new();
        for symbol in symbols {
            let next = counts.get(symbol).copied().unwrap_or(0) + 1;
            counts.insert(symbol.as_str(), next);
        }
        Some(counts)
    }

    /// Leads in `hrv_metrics` whose metric keys differ from the first lead's.
    pub fn hrv_schema_mismatches(&self) -> Vec<String> {
        let Some((_, reference)) = self.hrv_metrics.first() else {
            return Vec::new();
        };
        let expected: Vec<&str> = reference.keys().collect();
        self.hrv_metrics
            .iter()
            .skip(1)
            .filter(|(_, metrics)| {
                metrics.len() != expected.len()
                    || !expected.iter().all(|key| metrics.contains_key(key))
            })
            .map(|(lead, _)| lead.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "hrv_metrics": {
            "lead_2": {"sdnn": 41.234, "psd": [1.0, 2.5, 3.25]},
            "lead_1": {"sdnn": 38.0, "psd": []}
        },
        "predictions": {
            "lead_2": {"N": 70, "V": 3},
            "lead_1": {"N": 72}
        },
        "report_path": "/tmp/abc/100_report.pdf",
        "record_path": "/tmp/abc/100.dat",
        "annotation_samples": [18, 77, 370],
        "annotation_symbols": ["+", "N", "N"]
    }"#;

    #[test]
    fn parses_response_preserving_order() {
        let result = AnalysisResult::from_slice(BODY.as_bytes()).unwrap();
        let leads: Vec<_> = result.hrv_metrics.keys().collect();
        assert_eq!(leads, vec!["lead_2", "lead_1"]);
        let metrics = result.hrv_metrics.get("lead_2").unwrap();
        assert_eq!(metrics.get("sdnn"), Some(&MetricValue::Scalar(41.234)));
        assert_eq!(
            metrics.get("psd"),
            Some(&MetricValue::Series(vec![1.0, 2.5, 3.25]))
        );
        assert_eq!(result.predictions.get("lead_2").unwrap().get("V"), Some(&3));
        assert_eq!(result.report_path.as_deref(), Some("/tmp/abc/100_report.pdf"));
    }

    #[test]
    fn optional_handles_may_be_absent() {
        let body = r#"{"hrv_metrics": {}, "predictions": {}}"#;
        let result = AnalysisResult::from_slice(body.as_bytes()).unwrap();
        assert!(result.report_path.is_none());
        assert!(result.record_path.is_none());
        assert!(result.annotation_counts().is_none());
    }

    #[test]
    fn missing_metrics_is_an_error() {
        assert!(AnalysisResult::from_slice(br#"{"predictions": {}}"#).is_err());
        assert!(AnalysisResult::from_slice(b"not json").is_err());
    }

    #[test]
    fn counts_annotation_symbols() {
        let result = AnalysisResult::from_slice(BODY.as_bytes()).unwrap();
        let counts = result.annotation_counts().unwrap();
        let pairs: Vec<_> = counts.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        assert_eq!(pairs, vec![("+".to_string(), 1), ("N".to_string(), 2)]);
    }

    #[test]
    fn detects_hrv_schema_mismatch() {
        let body = r#"{
            "hrv_metrics": {"a": {"x": 1, "y": 2}, "b": {"x": 1, "y": 2}, "c": {"x": 1}, "d": {"x": 1, "z": 3}},
            "predictions": {}
        }"#;
        let result = AnalysisResult::from_slice(body.as_bytes()).unwrap();
        assert_eq!(result.hrv_schema_mismatches(), vec!["c", "d"]);
    }

    #[test]
    fn repeated_key_keeps_first_position() {
        let map: LeadMap<u64> = serde_json::from_str(r#"{"a": 1, "b": 2, "a": 3}"#).unwrap();
        let pairs: Vec<_> = map.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        assert_eq!(pairs, vec![("a".to_string(), 3), ("b".to_string(), 2)]);
    }
}
