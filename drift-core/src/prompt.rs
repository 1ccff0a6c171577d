use crate::text::filter_model_output;
use crate::types::WalkRequest;
use serde::{Deserialize, Serialize};

/// Caps how many nearby places are quoted back to the model.
const MAX_INSPIRATION_PLACES: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub system_message: String,
    pub user_message: String,
}

pub fn build_walk_prompt(req: &WalkRequest, nearby: Option<&[String]>) -> BuiltPrompt {
    let stops = req.stops.max(1);

    let system = format!(
        "<SYSTEM_INSTRUCTIONS>\n\
You are a psychogeographer guiding a dérive: an unplanned, drifting walk through a city, \
led by its atmosphere rather than by its landmarks.\n\n\
Plan a walk of exactly {stops} stops. Every stop must be a real, publicly reachable place \
(a street, square, park, building or corner) that exists in the named city, and the stops \
must be listed in the order they are walked. Consecutive stops should be within walking distance.\n\n\
For each stop write one or two sentences of narration in the second person, present tense, \
as if spoken aloud while standing there.\n\n\
Answer with a single JSON object and nothing else:\n\
{{\"title\": string, \"intro\": string, \"stops\": [{{\"name\": string, \"narration\": string, \"lat\": number, \"lon\": number}}]}}\n\
Omit lat/lon when unsure of the coordinates.\n\
</SYSTEM_INSTRUCTIONS>"
    );

    let mut user = format!("<CITY>\n{}\n</CITY>", req.city.trim());

    if let Some(theme) = req.theme.as_ref().filter(|s| !s.trim().is_empty()) {
        user.push_str(&format!("\n\n<MOOD>\n{}\n</MOOD>", theme.trim()));
    }

    user.push_str(&format!("\n\n<STOPS>\n{stops}\n</STOPS>"));

    if let Some(places) = nearby {
        let listed: Vec<&str> = places
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .take(MAX_INSPIRATION_PLACES)
            .collect();
        if !listed.is_empty() {
            user.push_str(&format!(
                "\n\n<NEARBY_PLACES>\n{}\n</NEARBY_PLACES>",
                listed.join("\n")
            ));
        }
    }

    BuiltPrompt {
        system_message: system,
        user_message: user,
    }
}

pub fn post_process_llm_output(text: &str) -> String {
    filter_model_output(text)
}
