//! Turns a free-form completion into an ordered [`WalkPlan`].
//!
//! Extraction never fails: output that matches none of the expected shapes
//! produces a partial or empty plan, and the caller decides what to do with it.
//! Three shapes are tried in order:
//!
//! 1. a JSON object (or bare array) of stops, optionally inside a code fence;
//! 2. a numbered or bulleted list, one stop per line;
//! 3. prose such as "Start at A, walk to B, end at C".

use crate::text::{filter_model_output, strip_markdown, unfence};
use crate::types::{GeoPoint, WalkPlan, Waypoint};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const STOP_KEYS: &[&str] = &["stops", "waypoints", "route", "places", "locations", "walk"];
const NAME_KEYS: &[&str] = &["name", "place", "title", "stop", "location"];
const NARRATION_KEYS: &[&str] = &["narration", "description", "text", "details"];
const LAT_KEYS: &[&str] = &["lat", "latitude"];
const LON_KEYS: &[&str] = &["lon", "lng", "longitude"];

// Longest first so "and then walk to" wins over "and".
const CONNECTORS: &[&str] = &[
    "and finally end at",
    "and then walk to",
    "and then head to",
    "and finish at",
    "and end at",
    "continue on to",
    "make your way to",
    "finally end at",
    "start at",
    "start from",
    "starting at",
    "begin at",
    "beginning at",
    "walk to",
    "walk over to",
    "walk down to",
    "walk up to",
    "head to",
    "head over to",
    "continue to",
    "proceed to",
    "go to",
    "stroll to",
    "wander to",
    "drift to",
    "end at",
    "ending at",
    "finish at",
    "finishing at",
];

// Single words that only read as connectors inside prose; list items keep
// them ("Next Door Café").
const BARE_CONNECTORS: &[&str] = &["finally", "then", "next", "and"];

const ABBREVIATIONS: &[&str] = &["st", "ave", "mt", "dr", "blvd", "rd", "ft", "sta", "ste"];

// Clauses longer than this are treated as commentary, not places.
const MAX_PROSE_WORDS: usize = 10;

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+\s*[.)]|[-*•])\s+(.+?)\s*$").expect("valid list item regex")
    })
}

fn clause_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*(?:,|;|->|→|\band then\b|\bthen\b)\s*").expect("valid clause regex")
    })
}

pub fn extract_walk_plan(text: &str) -> WalkPlan {
    let cleaned = filter_model_output(text);

    if let Some(plan) = extract_from_json(&cleaned) {
        return plan;
    }

    let waypoints = extract_from_list(&cleaned);
    if !waypoints.is_empty() {
        return WalkPlan {
            waypoints,
            ..Default::default()
        };
    }

    WalkPlan {
        waypoints: extract_from_prose(&cleaned),
        ..Default::default()
    }
}

fn extract_from_json(text: &str) -> Option<WalkPlan> {
    let body = unfence(text);
    // Models wrap JSON in prose that may itself contain brackets, so try every
    // opening position and keep the first value that looks like a plan.
    body.match_indices(['{', '['])
        .filter_map(|(start, _)| {
            serde_json::Deserializer::from_str(&body[start..])
                .into_iter::<Value>()
                .next()?
                .ok()
        })
        .find_map(plan_from_value)
}

fn plan_from_value(value: Value) -> Option<WalkPlan> {
    match value {
        Value::Object(obj) => {
            let stops = STOP_KEYS
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_array))?;
            let waypoints = stops.iter().filter_map(waypoint_from_value).collect();
            Some(WalkPlan {
                title: string_field(&obj, &["title", "name"]),
                intro: string_field(&obj, &["intro", "introduction", "summary"]),
                waypoints,
            })
        }
        Value::Array(items) => {
            let waypoints: Vec<Waypoint> = items.iter().filter_map(waypoint_from_value).collect();
            (!waypoints.is_empty()).then(|| WalkPlan {
                waypoints,
                ..Default::default()
            })
        }
        _ => None,
    }
}

fn waypoint_from_value(value: &Value) -> Option<Waypoint> {
    match value {
        Value::String(s) => {
            let name = strip_markdown(s);
            (!name.is_empty()).then(|| Waypoint::named(name))
        }
        Value::Object(obj) => {
            let name = string_field(obj, NAME_KEYS).map(|n| strip_markdown(&n))?;
            if name.is_empty() {
                return None;
            }
            let mut waypoint = Waypoint::named(name);
            if let Some(narration) = string_field(obj, NARRATION_KEYS) {
                waypoint = waypoint.with_narration(narration);
            }
            if let Some(point) = point_from_object(obj) {
                waypoint = waypoint.with_location(point);
            }
            Some(waypoint)
        }
        _ => None,
    }
}

fn point_from_object(obj: &Map<String, Value>) -> Option<GeoPoint> {
    let direct = number_field(obj, LAT_KEYS).zip(number_field(obj, LON_KEYS));
    let nested = || {
        ["coordinates", "location", "geometry"]
            .iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_object))
            .find_map(|inner| number_field(inner, LAT_KEYS).zip(number_field(inner, LON_KEYS)))
    };

    direct
        .or_else(nested)
        .map(|(lat, lon)| GeoPoint::new(lat, lon))
        .filter(GeoPoint::is_valid)
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn extract_from_list(text: &str) -> Vec<Waypoint> {
    text.lines()
        .filter_map(|line| list_item_re().captures(line))
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter_map(|item| {
            let (name, narration) = split_name_and_narration(item);
            let name = strip_connector(&strip_markdown(name), CONNECTORS).to_string();
            if name.is_empty() {
                return None;
            }
            let waypoint = Waypoint::named(name);
            Some(match narration {
                Some(n) => waypoint.with_narration(strip_markdown(n)),
                None => waypoint,
            })
        })
        .collect()
}

fn split_name_and_narration(item: &str) -> (&str, Option<&str>) {
    [": ", " — ", " – ", " - "]
        .iter()
        .filter_map(|sep| item.find(sep).map(|idx| (idx, sep.len())))
        .min_by_key(|(idx, _)| *idx)
        .map(|(idx, len)| (&item[..idx], Some(&item[idx + len..])))
        .unwrap_or((item, None))
}

fn extract_from_prose(text: &str) -> Vec<Waypoint> {
    let mut clauses: Vec<(String, bool)> = Vec::new();
    for sentence in split_sentences(text) {
        for raw in clause_split_re().split(&sentence) {
            let raw = strip_markdown(raw);
            let stripped = strip_prose_connector(&raw);
            let had_connector = stripped.len() != raw.trim().len();
            let name = stripped.trim_end_matches(['.', '!', '?']).trim();
            if !name.is_empty() {
                clauses.push((name.to_string(), had_connector));
            }
        }
    }

    // Once the model clearly narrates a route, drop clauses that are not stops.
    let connected = clauses.iter().filter(|(_, c)| *c).count();
    clauses
        .into_iter()
        .filter(|(name, had_connector)| {
            if connected >= 2 {
                *had_connector
            } else {
                name.split_whitespace().count() <= MAX_PROSE_WORDS
            }
        })
        .map(|(name, _)| Waypoint::named(name))
        .collect()
}

/// Splits on sentence-ending periods, keeping common street abbreviations intact.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for token in text.split_whitespace() {
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(token);

        let ends_sentence = token.ends_with(['.', '!', '?'])
            && !ABBREVIATIONS.contains(
                &token
                    .trim_end_matches('.')
                    .to_ascii_lowercase()
                    .as_str(),
            );
        if ends_sentence {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

fn strip_prose_connector(clause: &str) -> &str {
    let mut rest = clause.trim();
    loop {
        let next = strip_connector(strip_connector(rest, CONNECTORS), BARE_CONNECTORS);
        if next.len() == rest.len() {
            return rest;
        }
        rest = next;
    }
}

fn strip_connector<'a>(clause: &'a str, connectors: &[&str]) -> &'a str {
    let mut rest = clause.trim();
    // Connectors can stack ("and finally end at"), so strip until none match.
    loop {
        let matched = connectors.iter().find_map(|c| {
            let head = rest.get(..c.len())?;
            let boundary = rest[c.len()..]
                .chars()
                .next()
                .is_none_or(|ch| ch.is_whitespace());
            (head.eq_ignore_ascii_case(c) && boundary).then_some(c.len())
        });
        match matched {
            Some(len) => rest = rest[len..].trim_start(),
            None => return rest,
        }
    }
}
