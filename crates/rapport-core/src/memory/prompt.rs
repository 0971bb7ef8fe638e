//! Extraction prompt templates and the structured output schema.
//!
//! Prompt wording scales with [`TrackingDepth`]; only the requested output
//! fields are contractual. Multi-party conversations get a preamble naming
//! the speaking participant so relationship subjects can be disambiguated.

use schemars::JsonSchema;
use serde::Deserialize;

use rapport_types::config::TrackingDepth;
use rapport_types::llm::OutputJsonSchema;

/// Name of the structured output schema sent to the generator.
pub const EXTRACTION_SCHEMA_NAME: &str = "MemoryExtraction";

/// Output shape requested from the generator.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryExtraction {
    pub summary: String,
    pub importance: f64,
    pub emotion: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub relationship: Option<RelationshipExtraction>,
    #[serde(default)]
    pub continuity_note: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RelationshipExtraction {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// "improved", "worsened" or "neutral".
    #[serde(default)]
    pub change: Option<String>,
    /// For multi-party conversations: "A and B".
    #[serde(default)]
    pub between: Option<String>,
}

/// Build the output hint passed alongside every extraction prompt.
pub fn extraction_schema() -> OutputJsonSchema {
    let schema = schemars::schema_for!(MemoryExtraction);
    OutputJsonSchema {
        name: EXTRACTION_SCHEMA_NAME.to_string(),
        schema: serde_json::to_value(&schema).unwrap_or_default(),
        strict: Some(true),
    }
}

const OUTPUT_INSTRUCTIONS: &str = r#"Respond with a single JSON object with these fields:
- "summary": string
- "importance": number between 0.0 and 1.0
- "emotion": string
- "keywords": array of strings
- "relationship" (optional): {"type": string, "change": "improved" | "worsened" | "neutral", "between": string}
- "continuityNote" (optional): string

If nothing in the message is worth remembering, set "summary" to "none"."#;

/// Build the extraction prompt for one message.
pub fn build_prompt(
    message: &str,
    speaker: &str,
    is_multi_party: bool,
    depth: TrackingDepth,
) -> String {
    let preamble = if is_multi_party {
        format!(
            "This message comes from a multi-party conversation. The participant speaking is: {speaker}\n\
             When a relationship changes, name both participants in \"between\" (e.g. \"A and B\").\n\n"
        )
    } else {
        String::new()
    };

    let body = match depth {
        TrackingDepth::Basic => format!(
            "Read this message and pull out the single most important fact or event.\n\n\
             Message: \"{message}\"\n\n\
             Provide:\n\
             1. The fact or event, in one sentence\n\
             2. How important it is (0.0 to 1.0)\n\
             3. The emotional tone (positive, negative or neutral)"
        ),
        TrackingDepth::Detailed => format!(
            "Read this message and record what should be remembered about it. Look for significant \
             events, emotional moments, character development and shifts in relationships.\n\n\
             Message: \"{message}\"\n\n\
             Provide:\n\
             1. A summary of the main event or revelation\n\
             2. How important it is (0.0 to 1.0, where 1.0 is pivotal)\n\
             3. The emotional context\n\
             4. What the speaker feels or thinks\n\
             5. Any relationship dynamics that changed\n\
             6. Keywords for later lookup"
        ),
        TrackingDepth::Comprehensive => format!(
            "Analyze this message in depth for long-term conversation memory.\n\n\
             Message: \"{message}\"\n\n\
             Provide:\n\
             1. What happened\n\
             2. Emotional analysis (feelings, tone, subtext)\n\
             3. How this develops the speaker as a character\n\
             4. Relationship dynamics and how they changed\n\
             5. Revelations or secrets shared\n\
             6. Continuity notes: details that must be remembered later\n\
             7. Keywords and tags\n\
             8. How important it is (0.0 to 1.0)\n\
             9. Anything that contradicts earlier events"
        ),
    };

    format!("{preamble}{body}\n\n{OUTPUT_INSTRUCTIONS}")
}
