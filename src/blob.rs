use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEncoding {
    Object,
    PairArray,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlexMap {
    Parsed {
        encoding: MapEncoding,
        entries: IndexMap<String, Value>,
    },
    Malformed(String),
}

impl FlexMap {
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Object(map) => FlexMap::Parsed {
                encoding: MapEncoding::Object,
                entries: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            },
            Value::Array(items) => parse_pairs(items),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(inner @ (Value::Object(_) | Value::Array(_))) => FlexMap::parse(&inner),
                _ => FlexMap::Malformed("string is not an encoded map".to_string()),
            },
            Value::Null => FlexMap::Parsed {
                encoding: MapEncoding::Object,
                entries: IndexMap::new(),
            },
            other => FlexMap::Malformed(format!("unexpected {}", kind(other))),
        }
    }

    pub fn into_entries(self) -> IndexMap<String, Value> {
        match self {
            FlexMap::Parsed { entries, .. } => entries,
            FlexMap::Malformed(_) => IndexMap::new(),
        }
    }
}

fn parse_pairs(items: &[Value]) -> FlexMap {
    let mut entries = IndexMap::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let Some(pair) = item.as_array() else {
            return FlexMap::Malformed(format!("entry {position} is not a pair"));
        };
        let (Some(key), Some(value)) = (pair.first(), pair.get(1)) else {
            return FlexMap::Malformed(format!("entry {position} has fewer than two items"));
        };
        let key = match key {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            other => {
                return FlexMap::Malformed(format!(
                    "entry {position} has a {} key",
                    kind(other)
                ));
            }
        };
        entries.insert(key, value.clone());
    }
    FlexMap::Parsed {
        encoding: MapEncoding::PairArray,
        entries,
    }
}

pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => vec![text.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
