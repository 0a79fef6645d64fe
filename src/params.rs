//! Generation parameters sent alongside every prompt.
//!
//! [`Parameters`] is a validated value object: every constructor checks the
//! numeric bounds of each knob and fails with [`ClientError::Validation`]
//! naming the offending field. Once built it cannot be mutated, so a single
//! instance can be shared between threads and reused across calls.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// Raw, unchecked field set. Mirrors the backend's generate payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Fields {
    /// Add the beginning-of-sequence token
    add_bos_token: bool,

    /// Ignore `max_new_tokens` and fill the remaining context
    auto_max_new_tokens: bool,

    /// Do not allow the model to end generation
    ban_eos_token: bool,

    /// Classifier-free guidance strength, used with negative prompts
    guidance_scale: f64,

    max_new_tokens: u32,

    /// Force a minimum generation length
    min_length: u32,

    /// Number of recent tokens the repetition penalty looks at
    repetition_penalty_range: u32,

    repetition_penalty: f64,

    /// `-1` picks a random seed
    seed: i64,

    skip_special_tokens: bool,

    /// Generation stops when any of these is produced
    stopping_strings: Vec<String>,

    temperature: f64,

    top_k: u32,

    top_p: f64,

    /// `1.0` disables typical sampling
    typical_p: f64,

    /// Prompt is truncated to this many tokens
    truncation_length: u32,
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            add_bos_token: true,
            auto_max_new_tokens: false,
            ban_eos_token: false,
            guidance_scale: 1.0,
            max_new_tokens: 128,
            min_length: 0,
            repetition_penalty_range: 1,
            repetition_penalty: 1.1,
            seed: -1,
            skip_special_tokens: true,
            stopping_strings: Vec::new(),
            temperature: 0.6,
            top_k: 20,
            top_p: 0.5,
            typical_p: 1.0,
            truncation_length: 4096,
        }
    }
}

fn check(field: &str, ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(ClientError::validation(field, message()))
    }
}

fn check_finite(field: &str, value: f64) -> Result<()> {
    check(field, value.is_finite(), || format!("must be a finite number (got {})", value))
}

impl Fields {
    fn validate(&self) -> Result<()> {
        check_finite("guidance_scale", self.guidance_scale)?;
        check("guidance_scale", (0.0..=2.5).contains(&self.guidance_scale), || {
            format!("must be between 0 and 2.5 (got {})", self.guidance_scale)
        })?;

        check("max_new_tokens", self.max_new_tokens > 1, || {
            format!("must be greater than 1 (got {})", self.max_new_tokens)
        })?;

        check("repetition_penalty_range", self.repetition_penalty_range > 0, || {
            format!("must be greater than 0 (got {})", self.repetition_penalty_range)
        })?;

        check_finite("repetition_penalty", self.repetition_penalty)?;
        check("repetition_penalty", self.repetition_penalty > 0.0, || {
            format!("must be greater than 0 (got {})", self.repetition_penalty)
        })?;

        check_finite("temperature", self.temperature)?;
        check("temperature", self.temperature > 0.0 && self.temperature < 1.0, || {
            format!("must be strictly between 0 and 1 (got {})", self.temperature)
        })?;

        check("top_k", self.top_k > 0, || {
            format!("must be greater than 0 (got {})", self.top_k)
        })?;

        check_finite("top_p", self.top_p)?;
        check("top_p", self.top_p > 0.0 && self.top_p < 1.0, || {
            format!("must be strictly between 0 and 1 (got {})", self.top_p)
        })?;

        check_finite("typical_p", self.typical_p)?;
        check("typical_p", self.typical_p > 0.0 && self.typical_p <= 1.0, || {
            format!("must be greater than 0 and at most 1 (got {})", self.typical_p)
        })?;

        check("truncation_length", self.truncation_length > 1, || {
            format!("must be greater than 1 (got {})", self.truncation_length)
        })?;

        Ok(())
    }
}

/// Validated generation knobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Parameters(Fields);

impl<'de> Deserialize<'de> for Parameters {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Fields::deserialize(deserializer)?;
        Parameters::from_fields(fields).map_err(de::Error::custom)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self(Fields::default())
    }
}

impl Parameters {
    fn from_fields(fields: Fields) -> Result<Self> {
        fields.validate()?;
        Ok(Self(fields))
    }

    /// Start from the defaults and override individual knobs.
    pub fn builder() -> ParametersBuilder {
        ParametersBuilder::default()
    }

    /// Build from a field name to value mapping.
    ///
    /// Missing fields keep their defaults. Unknown names, wrongly typed values
    /// and out-of-range values are rejected with the field named in the error.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let known = Self::default().to_map();

        for (key, value) in &map {
            if !known.contains_key(key) {
                return Err(ClientError::validation(key.as_str(), "unknown parameter"));
            }

            let mut single = Map::new();
            single.insert(key.clone(), value.clone());
            serde_json::from_value::<Fields>(Value::Object(single))
                .map_err(|e| ClientError::validation(key.as_str(), e.to_string()))?;
        }

        let fields: Fields = serde_json::from_value(Value::Object(map))?;
        Self::from_fields(fields)
    }

    /// Flat key/value mapping, as merged into the generate payload.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(&self.0) {
            Ok(Value::Object(map)) => map,
            other => unreachable!("parameters serialize to a JSON object, got {:?}", other),
        }
    }

    /// Copy of these parameters with extra stopping strings appended.
    pub fn with_stopping_strings<I, S>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields = self.0.clone();
        fields.stopping_strings.extend(extra.into_iter().map(Into::into));
        Self(fields)
    }

    pub fn add_bos_token(&self) -> bool {
        self.0.add_bos_token
    }

    pub fn auto_max_new_tokens(&self) -> bool {
        self.0.auto_max_new_tokens
    }

    pub fn ban_eos_token(&self) -> bool {
        self.0.ban_eos_token
    }

    pub fn guidance_scale(&self) -> f64 {
        self.0.guidance_scale
    }

    pub fn max_new_tokens(&self) -> u32 {
        self.0.max_new_tokens
    }

    pub fn min_length(&self) -> u32 {
        self.0.min_length
    }

    pub fn repetition_penalty_range(&self) -> u32 {
        self.0.repetition_penalty_range
    }

    pub fn repetition_penalty(&self) -> f64 {
        self.0.repetition_penalty
    }

    pub fn seed(&self) -> i64 {
        self.0.seed
    }

    pub fn skip_special_tokens(&self) -> bool {
        self.0.skip_special_tokens
    }

    pub fn stopping_strings(&self) -> &[String] {
        &self.0.stopping_strings
    }

    pub fn temperature(&self) -> f64 {
        self.0.temperature
    }

    pub fn top_k(&self) -> u32 {
        self.0.top_k
    }

    pub fn top_p(&self) -> f64 {
        self.0.top_p
    }

    pub fn typical_p(&self) -> f64 {
        self.0.typical_p
    }

    pub fn truncation_length(&self) -> u32 {
        self.0.truncation_length
    }
}

/// Builder for [`Parameters`]. Bounds are checked in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ParametersBuilder {
    fields: Fields,
}

macro_rules! setter {
    ($name:ident: $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.fields.$name = value;
            self
        }
    };
}

impl ParametersBuilder {
    setter!(add_bos_token: bool);
    setter!(auto_max_new_tokens: bool);
    setter!(ban_eos_token: bool);
    setter!(guidance_scale: f64);
    setter!(max_new_tokens: u32);
    setter!(min_length: u32);
    setter!(repetition_penalty_range: u32);
    setter!(repetition_penalty: f64);
    setter!(seed: i64);
    setter!(skip_special_tokens: bool);
    setter!(temperature: f64);
    setter!(top_k: u32);
    setter!(top_p: f64);
    setter!(typical_p: f64);
    setter!(truncation_length: u32);

    /// Replace the stopping strings.
    pub fn stopping_strings<I, S>(mut self, strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.stopping_strings = strings.into_iter().map(Into::into).collect();
        self
    }

    /// Append one stopping string.
    pub fn stopping_string(mut self, string: impl Into<String>) -> Self {
        self.fields.stopping_strings.push(string.into());
        self
    }

    pub fn build(self) -> Result<Parameters> {
        Parameters::from_fields(self.fields)
    }
}
