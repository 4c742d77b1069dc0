//! Text-to-image workflow graphs in ComfyUI API format.
//!
//! A [`WorkflowTemplate`] is validated once at load time: the sampler
//! node and the nodes it links to are located by class type and recorded,
//! so rendering a [`GenerationRequest`] into the graph cannot fail.

use serde_json::{json, Map, Value};

use newsframe_core::error::CoreError;
use newsframe_core::prompt::GenerationRequest;

// ---------------------------------------------------------------------------
// ComfyUI node class types
// ---------------------------------------------------------------------------

const KSAMPLER_CLASS: &str = "KSampler";
const CLIP_TEXT_ENCODE_CLASS: &str = "CLIPTextEncode";
const EMPTY_LATENT_CLASS: &str = "EmptyLatentImage";
const SAVE_IMAGE_CLASS: &str = "SaveImage";

/// Checkpoint used by the built-in graph.
pub const DEFAULT_CHECKPOINT: &str = "dreamshaper_8.safetensors";

/// `filename_prefix` of the built-in `SaveImage` node.
pub const DEFAULT_FILENAME_PREFIX: &str = "news_image";

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// Node ids the renderer patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchTargets {
    pub sampler: String,
    pub positive: String,
    pub negative: String,
    pub latent: String,
}

/// A validated workflow graph.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    graph: Map<String, Value>,
    targets: PatchTargets,
}

impl WorkflowTemplate {
    /// The built-in graph: checkpoint -> two prompt encoders -> KSampler
    /// -> VAE decode -> SaveImage.
    pub fn builtin() -> Self {
        let graph = json!({
            "3": {
                "class_type": "KSampler",
                "inputs": {
                    "seed": 0,
                    "steps": 25,
                    "cfg": 7.0,
                    "sampler_name": "dpmpp_2m",
                    "scheduler": "karras",
                    "denoise": 1.0,
                    "model": ["4", 0],
                    "positive": ["6", 0],
                    "negative": ["7", 0],
                    "latent_image": ["5", 0]
                }
            },
            "4": {
                "class_type": "CheckpointLoaderSimple",
                "inputs": { "ckpt_name": DEFAULT_CHECKPOINT }
            },
            "5": {
                "class_type": "EmptyLatentImage",
                "inputs": { "width": 512, "height": 512, "batch_size": 1 }
            },
            "6": {
                "class_type": "CLIPTextEncode",
                "inputs": { "text": "", "clip": ["4", 1] }
            },
            "7": {
                "class_type": "CLIPTextEncode",
                "inputs": { "text": "", "clip": ["4", 1] }
            },
            "8": {
                "class_type": "VAEDecode",
                "inputs": { "samples": ["3", 0], "vae": ["4", 2] }
            },
            "9": {
                "class_type": "SaveImage",
                "inputs": { "filename_prefix": DEFAULT_FILENAME_PREFIX, "images": ["8", 0] }
            }
        });

        Self {
            graph: graph.as_object().cloned().unwrap_or_default(),
            targets: PatchTargets {
                sampler: "3".into(),
                positive: "6".into(),
                negative: "7".into(),
                latent: "5".into(),
            },
        }
    }

    /// Parse and validate a custom API-format workflow.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidInput(format!("Workflow is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validate a workflow graph and locate its patch targets.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let Value::Object(graph) = value else {
            return Err(CoreError::InvalidInput(
                "Workflow JSON must be an object".to_string(),
            ));
        };
        if graph.is_empty() {
            return Err(CoreError::InvalidInput(
                "Workflow JSON must contain at least one node".to_string(),
            ));
        }

        for (node_id, node) in &graph {
            if node.get("class_type").and_then(Value::as_str).is_none() {
                return Err(CoreError::InvalidInput(format!(
                    "Node '{node_id}' is missing required 'class_type' field"
                )));
            }
        }

        let sampler = find_by_class(&graph, KSAMPLER_CLASS)?;
        let positive = linked_node(&graph, &sampler, "positive", CLIP_TEXT_ENCODE_CLASS)?;
        let negative = linked_node(&graph, &sampler, "negative", CLIP_TEXT_ENCODE_CLASS)?;
        let latent = linked_node(&graph, &sampler, "latent_image", EMPTY_LATENT_CLASS)?;
        find_by_class(&graph, SAVE_IMAGE_CLASS)?;

        Ok(Self {
            graph,
            targets: PatchTargets {
                sampler,
                positive,
                negative,
                latent,
            },
        })
    }

    pub fn targets(&self) -> &PatchTargets {
        &self.targets
    }

    /// Produce the graph for one request.
    ///
    /// A request without a seed keeps the template's seed.
    pub fn render(&self, request: &GenerationRequest) -> Value {
        let mut graph = self.graph.clone();

        set_input(&mut graph, &self.targets.positive, "text", json!(request.prompt_text));
        set_input(&mut graph, &self.targets.negative, "text", json!(request.negative_prompt));

        let sampler = &self.targets.sampler;
        set_input(&mut graph, sampler, "steps", json!(request.steps));
        set_input(&mut graph, sampler, "cfg", json!(request.cfg_scale));
        set_input(&mut graph, sampler, "sampler_name", json!(request.sampler.comfy_name()));
        set_input(&mut graph, sampler, "scheduler", json!(request.scheduler));
        if let Some(seed) = request.seed {
            set_input(&mut graph, sampler, "seed", json!(seed));
        }

        let latent = &self.targets.latent;
        set_input(&mut graph, latent, "width", json!(request.resolution.width));
        set_input(&mut graph, latent, "height", json!(request.resolution.height));

        Value::Object(graph)
    }
}

impl Default for WorkflowTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn class_of(node: &Value) -> Option<&str> {
    node.get("class_type").and_then(Value::as_str)
}

/// First node of the given class, in numeric node-id order.
fn find_by_class(graph: &Map<String, Value>, class: &str) -> Result<String, CoreError> {
    let mut ids: Vec<&String> = graph
        .iter()
        .filter(|(_, node)| class_of(node) == Some(class))
        .map(|(id, _)| id)
        .collect();
    ids.sort_by_key(|id| (id.parse::<u64>().unwrap_or(u64::MAX), id.as_str()));

    ids.first().map(|id| (*id).clone()).ok_or_else(|| {
        CoreError::InvalidInput(format!("Workflow has no '{class}' node"))
    })
}

/// Resolve `graph[from].inputs[input]` (a `[node_id, slot]` link) and
/// require the target to be of `class`.
fn linked_node(
    graph: &Map<String, Value>,
    from: &str,
    input: &str,
    class: &str,
) -> Result<String, CoreError> {
    let link = graph
        .get(from)
        .and_then(|node| node.get("inputs"))
        .and_then(|inputs| inputs.get(input))
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .ok_or_else(|| {
            CoreError::InvalidInput(format!("Node '{from}' has no '{input}' link"))
        })?;

    // ComfyUI accepts both string and numeric node ids in links.
    let target = match link {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(CoreError::InvalidInput(format!(
                "Node '{from}' input '{input}' is not a node link"
            )))
        }
    };

    match graph.get(&target).and_then(class_of) {
        Some(found) if found == class => Ok(target),
        Some(found) => Err(CoreError::InvalidInput(format!(
            "Node '{from}' input '{input}' links to '{found}', expected '{class}'"
        ))),
        None => Err(CoreError::InvalidInput(format!(
            "Node '{from}' input '{input}' links to missing node '{target}'"
        ))),
    }
}

fn set_input(graph: &mut Map<String, Value>, node_id: &str, key: &str, value: Value) {
    let inputs = graph
        .get_mut(node_id)
        .and_then(Value::as_object_mut)
        .map(|node| {
            node.entry("inputs")
                .or_insert_with(|| Value::Object(Map::new()))
        });
    if let Some(Value::Object(inputs)) = inputs {
        inputs.insert(key.to_string(), value);
    }
}
