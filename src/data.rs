use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::registry::{SHARD_ID_MAX, SHARD_ID_MIN};
use crate::errors::{DatasetError, Result};

pub use crate::types::{ExampleKey, ImageName, Prompt};

/// Identifier of one corpus shard, always within `1..=2000`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ShardId(u16);

impl ShardId {
    /// Validate and wrap a raw shard id.
    pub fn new(raw: i64) -> Result<Self> {
        if raw < i64::from(SHARD_ID_MIN) || raw > i64::from(SHARD_ID_MAX) {
            return Err(DatasetError::InvalidShardId(raw));
        }
        Ok(Self(raw as u16))
    }

    /// Raw numeric id.
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Every valid shard id in ascending order.
    pub fn all() -> impl DoubleEndedIterator<Item = ShardId> + ExactSizeIterator {
        (SHARD_ID_MIN..=SHARD_ID_MAX).map(ShardId)
    }

    /// Zero-padded six digit form used in resource names (`000042`).
    pub fn padded(self) -> String {
        format!("{:06}", self.0)
    }
}

impl TryFrom<i64> for ShardId {
    type Error = DatasetError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ShardId> for i64 {
    fn from(value: ShardId) -> Self {
        i64::from(value.0)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical sampling algorithm token.
///
/// Shard sidecars carry the token as a string while the consolidated table
/// stores a numeric code; both normalize into this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sampler {
    /// DDIM (code 1).
    #[serde(rename = "ddim")]
    Ddim,
    /// PLMS (code 2).
    #[serde(rename = "plms")]
    Plms,
    /// Euler (code 3).
    #[serde(rename = "k_euler")]
    KEuler,
    /// Euler ancestral (code 4).
    #[serde(rename = "k_euler_ancestral")]
    KEulerAncestral,
    /// Heun (code 5).
    #[serde(rename = "ddik_heunm")]
    DdikHeunm,
    /// DPM2 (code 6).
    #[serde(rename = "k_dpm_2")]
    KDpm2,
    /// DPM2 ancestral (code 7).
    #[serde(rename = "k_dpm_2_ancestral")]
    KDpm2Ancestral,
    /// LMS (code 8).
    #[serde(rename = "k_lms")]
    KLms,
    /// Anything else (code 9).
    #[serde(rename = "others")]
    Others,
}

impl Sampler {
    /// Every sampler in code order (code 1 first).
    pub const ALL: [Sampler; 9] = [
        Sampler::Ddim,
        Sampler::Plms,
        Sampler::KEuler,
        Sampler::KEulerAncestral,
        Sampler::DdikHeunm,
        Sampler::KDpm2,
        Sampler::KDpm2Ancestral,
        Sampler::KLms,
        Sampler::Others,
    ];

    /// Translate a consolidated-table sampler code (`1..=9`).
    pub fn from_code(code: i64) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(DatasetError::UnknownSamplerCode(code))
    }

    /// Numeric code used by the consolidated table.
    pub fn code(self) -> i64 {
        match self {
            Sampler::Ddim => 1,
            Sampler::Plms => 2,
            Sampler::KEuler => 3,
            Sampler::KEulerAncestral => 4,
            Sampler::DdikHeunm => 5,
            Sampler::KDpm2 => 6,
            Sampler::KDpm2Ancestral => 7,
            Sampler::KLms => 8,
            Sampler::Others => 9,
        }
    }

    /// Canonical string token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Sampler::Ddim => "ddim",
            Sampler::Plms => "plms",
            Sampler::KEuler => "k_euler",
            Sampler::KEulerAncestral => "k_euler_ancestral",
            Sampler::DdikHeunm => "ddik_heunm",
            Sampler::KDpm2 => "k_dpm_2",
            Sampler::KDpm2Ancestral => "k_dpm_2_ancestral",
            Sampler::KLms => "k_lms",
            Sampler::Others => "others",
        }
    }

    /// Normalize a sidecar sampler string.
    ///
    /// Canonical tokens map to themselves and `k_heun` maps to the code-5
    /// sampler. Anything unrecognized lands in `Others`.
    pub fn from_token(token: &str) -> Self {
        Self::parse_token(token).unwrap_or_else(|| {
            debug!("[diffusiondb:data] unrecognized sampler token '{token}' recorded as others");
            Sampler::Others
        })
    }

    /// Strict form of [`Sampler::from_token`]: `None` for unrecognized tokens.
    pub fn parse_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("k_heun") {
            return Some(Sampler::DdikHeunm);
        }
        Self::ALL
            .into_iter()
            .find(|sampler| sampler.as_str().eq_ignore_ascii_case(token))
    }
}

impl FromStr for Sampler {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_token(s))
    }
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate a consolidated-table sampler code into its canonical token.
pub fn translate(code: i64) -> Result<&'static str> {
    Sampler::from_code(code).map(Sampler::as_str)
}

/// Generation parameters shared by both record shapes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    /// Prompt text.
    pub prompt: Prompt,
    /// Random seed used for generation.
    pub seed: i64,
    /// Number of sampling steps.
    pub step: i64,
    /// Classifier-free guidance scale.
    pub cfg: f32,
    /// Normalized sampler.
    pub sampler: Sampler,
    /// Shard id the record belongs to; only the consolidated table carries it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<i64>,
}

/// Image bytes together with the path they were read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Location of the image inside the extracted shard.
    pub path: PathBuf,
    /// Raw encoded image bytes.
    pub bytes: Vec<u8>,
}

/// Record emitted by image configurations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageExample {
    /// Image payload.
    pub image: ImagePayload,
    /// Prompt text.
    pub prompt: Prompt,
    /// Random seed used for generation.
    pub seed: i64,
    /// Number of sampling steps.
    pub step: i64,
    /// Classifier-free guidance scale.
    pub cfg: f32,
    /// Normalized sampler.
    pub sampler: Sampler,
}

/// Record emitted by the `text_only` configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextExample {
    /// Image filename the row describes.
    pub image_name: ImageName,
    /// Prompt text.
    pub prompt: Prompt,
    /// Shard the image lives in.
    pub part_id: i64,
    /// Random seed used for generation.
    pub seed: i64,
    /// Number of sampling steps.
    pub step: i64,
    /// Classifier-free guidance scale.
    pub cfg: f32,
    /// Sampler translated from the table's numeric code.
    pub sampler: Sampler,
}

/// Which record shape a configuration emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExampleKind {
    /// [`ImageExample`] records.
    Image,
    /// [`TextExample`] records.
    Text,
}

/// One emitted record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Example {
    /// Record from a shard archive.
    Image(ImageExample),
    /// Row from the consolidated table.
    Text(TextExample),
}

impl Example {
    /// Record shape of this example.
    pub fn kind(&self) -> ExampleKind {
        match self {
            Example::Image(_) => ExampleKind::Image,
            Example::Text(_) => ExampleKind::Text,
        }
    }

    /// Prompt text.
    pub fn prompt(&self) -> &str {
        match self {
            Example::Image(example) => &example.prompt,
            Example::Text(example) => &example.prompt,
        }
    }

    /// Normalized sampler.
    pub fn sampler(&self) -> Sampler {
        match self {
            Example::Image(example) => example.sampler,
            Example::Text(example) => example.sampler,
        }
    }

    /// Flatten the shared generation parameters.
    pub fn parameters(&self) -> ParameterRecord {
        match self {
            Example::Image(example) => ParameterRecord {
                prompt: example.prompt.clone(),
                seed: example.seed,
                step: example.step,
                cfg: example.cfg,
                sampler: example.sampler,
                part_id: None,
            },
            Example::Text(example) => ParameterRecord {
                prompt: example.prompt.clone(),
                seed: example.seed,
                step: example.step,
                cfg: example.cfg,
                sampler: example.sampler,
                part_id: Some(example.part_id),
            },
        }
    }

    /// The image record, if this is one.
    pub fn into_image(self) -> Option<ImageExample> {
        match self {
            Example::Image(example) => Some(example),
            Example::Text(_) => None,
        }
    }

    /// The table record, if this is one.
    pub fn into_text(self) -> Option<TextExample> {
        match self {
            Example::Text(example) => Some(example),
            Example::Image(_) => None,
        }
    }
}

impl ImageExample {
    pub(crate) fn from_parameters(image: ImagePayload, params: ParameterRecord) -> Self {
        Self {
            image,
            prompt: params.prompt,
            seed: params.seed,
            step: params.step,
            cfg: params.cfg,
            sampler: params.sampler,
        }
    }
}
