use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Generators
// GET {baseURL}/api/v1/generators — flat JSON array
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Generator {
    /// Backend name, e.g. "stable-diffusion". Passed verbatim in submissions.
    pub generator: String,
    /// Parameter metadata keyed by field name. Order as declared by the API.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

impl Generator {
    /// Editable field list for this generator, one entry per declared param.
    pub fn fields(&self) -> Vec<GeneratorField> {
        self.params
            .iter()
            .map(|(key, meta)| GeneratorField {
                key: key.clone(),
                value: String::new(),
                required: meta["required"].as_bool().unwrap_or(false),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorField {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub required: bool,
}

// ---------------------------------------------------------------------------
// Skybox styles
// GET {baseURL}/api/v1/skybox — object keyed by numeric-string indices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkyboxStyle {
    pub id: i32,
    pub name: String,
    pub user_inputs: Vec<UserInput>,
}

/// One prompt field a style expects. `key` is the JSON property name under
/// `user_prompts.inputs` and may carry literal brackets (e.g. "[subject]").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInput {
    pub key: String,
    pub id: i32,
    pub name: String,
    pub placeholder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkyboxStyleField {
    pub key: String,
    pub name: String,
    pub value: String,
}

impl SkyboxStyleField {
    /// Empty field ready for user input, from a style's declared prompt slot.
    pub fn from_input(input: &UserInput) -> Self {
        Self {
            key: input.key.clone(),
            name: input.name.clone(),
            value: String::new(),
        }
    }
}

/// Parse the styles response. The top-level object maps numeric-string
/// indices to style entries; non-numeric keys are skipped. Entries and each
/// style's `user_prompts.inputs` properties are kept in document order.
pub fn parse_skybox_styles(body: &str) -> Result<Vec<SkyboxStyle>> {
    let root: Value = serde_json::from_str(body).context("skybox styles response is not JSON")?;
    let entries = root
        .as_object()
        .context("skybox styles response is not a JSON object")?;

    let mut styles = Vec::new();
    for (key, entry) in entries {
        if key.parse::<i64>().is_err() {
            continue;
        }

        let id = int_field(&entry["id"]).context("style entry missing id")?;
        let name = entry["name"]
            .as_str()
            .context("style entry missing name")?
            .to_string();

        let mut user_inputs = Vec::new();
        if let Some(inputs) = entry["user_prompts"]["inputs"].as_object() {
            for (input_key, input) in inputs {
                user_inputs.push(UserInput {
                    key: input_key.clone(),
                    id: int_field(&input["id"])
                        .with_context(|| format!("input {input_key} missing id"))?,
                    name: input["name"].as_str().unwrap_or_default().to_string(),
                    placeholder: input["placeholder"].as_str().unwrap_or_default().to_string(),
                });
            }
        }

        styles.push(SkyboxStyle { id, name, user_inputs });
    }

    Ok(styles)
}

/// The API is inconsistent about numeric fields: some arrive as JSON numbers,
/// some as strings.
fn int_field(v: &Value) -> Result<i32> {
    if let Some(n) = v.as_i64() {
        return Ok(n as i32);
    }
    v.as_str()
        .context("field is neither number nor string")?
        .parse::<i32>()
        .context("field does not parse as an integer")
}

// ---------------------------------------------------------------------------
// Job submission bodies
// ---------------------------------------------------------------------------

/// Body for POST /api/v1/skybox/submit/{styleId}:
/// `{"prompt": {key: value, ...}}`. Empty-valued fields are omitted and keys
/// are stripped of leading/trailing bracket characters.
pub fn skybox_prompt_body(fields: &[SkyboxStyleField]) -> Value {
    let mut prompt = serde_json::Map::new();
    for field in fields {
        if !field.value.is_empty() {
            let key = field.key.trim_matches(|c| c == '[' || c == ']');
            prompt.insert(key.to_string(), Value::String(field.value.clone()));
        }
    }
    serde_json::json!({ "prompt": prompt })
}

/// Body for POST /api/v1/imagine/requests: a flat object with the generator
/// name plus one key per non-empty field.
pub fn imagine_request_body(generator: &str, fields: &[GeneratorField]) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("generator".to_string(), Value::String(generator.to_string()));
    for field in fields {
        if !field.value.is_empty() {
            body.insert(field.key.clone(), Value::String(field.value.clone()));
        }
    }
    Value::Object(body)
}

// ---------------------------------------------------------------------------
// Job responses — submission acks and poll status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSkyboxResponse {
    #[serde(default)]
    pub imaginations: Vec<ImaginationRef>,
}

#[derive(Debug, Deserialize)]
pub struct ImaginationRef {
    pub id: String,
}

impl CreateSkyboxResponse {
    /// Server-assigned job id from `imaginations[0].id`.
    pub fn job_id(&self) -> Result<i32> {
        let first = self
            .imaginations
            .first()
            .context("skybox submit response has no imagination result")?;
        first
            .id
            .parse::<i32>()
            .with_context(|| format!("imagination id {:?} is not an integer", first.id))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateImagineResponse {
    pub request: Option<ImagineRef>,
}

#[derive(Debug, Deserialize)]
pub struct ImagineRef {
    pub id: String,
}

impl CreateImagineResponse {
    /// Server-assigned job id from `request.id`.
    pub fn job_id(&self) -> Result<i32> {
        let request = self
            .request
            .as_ref()
            .context("imagine submit response has no request result")?;
        request
            .id
            .parse::<i32>()
            .with_context(|| format!("request id {:?} is not an integer", request.id))
    }
}

#[derive(Debug, Deserialize)]
pub struct GetImagineResponse {
    pub request: Option<ImagineStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ImagineStatus {
    pub status: Option<String>,
    pub file_url: Option<String>,
    pub prompt: Option<String>,
}

/// Outcome of one status check. Any status other than exactly "complete"
/// means the caller should poll again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImaginePoll {
    Pending { status: String },
    Complete { file_url: String, prompt: String },
}

impl GetImagineResponse {
    pub fn into_poll(self) -> Result<ImaginePoll> {
        let request = self.request.context("poll response has no request object")?;
        match request.status.as_deref() {
            Some("complete") => Ok(ImaginePoll::Complete {
                file_url: request
                    .file_url
                    .context("job complete but response has no file_url")?,
                prompt: request.prompt.unwrap_or_default(),
            }),
            Some(other) => Ok(ImaginePoll::Pending {
                status: other.to_string(),
            }),
            None => Ok(ImaginePoll::Pending {
                status: "unknown".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests — wire parsing and body construction
// ---------------------------------------------------------------------------
