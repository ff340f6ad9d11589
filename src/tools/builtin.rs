//! Built-in demo tools
//!
//! `echo`, `get_time`, `random_joke`, `add_numbers`, `calculate` and
//! `get_weather`. All are in-process and side-effect free except `get_time`,
//! which may ask the completion backend to interpret an unfamiliar timezone.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::calculator;
use super::descriptor::{ParamSpec, ParamType, ToolDescriptor};
use super::registry::{RegistryError, ToolRegistry};
use super::trait_def::{Arguments, Tool};
use crate::llm::{ChatMessage, LLMClient, LLMRequest};

const JOKES: &[&str] = &[
    "I told my computer I needed a break, and it said 'no problem, I'll go to sleep.'",
    "Why do programmers prefer dark mode? Because light attracts bugs.",
    "There are 10 kinds of people in the world: those who understand binary and those who don't.",
    "A SQL query walks into a bar, walks up to two tables and asks: 'Can I join you?'",
];

/// Common abbreviations and city names mapped to IANA identifiers
const TIMEZONE_ALIASES: &[(&str, &str)] = &[
    ("utc", "UTC"),
    ("gmt", "Europe/London"),
    ("bst", "Europe/London"),
    ("cet", "Europe/Paris"),
    ("jst", "Asia/Tokyo"),
    ("kst", "Asia/Seoul"),
    ("ist", "Asia/Kolkata"),
    ("est", "America/New_York"),
    ("edt", "America/New_York"),
    ("cst", "America/Chicago"),
    ("cdt", "America/Chicago"),
    ("mst", "America/Denver"),
    ("pst", "America/Los_Angeles"),
    ("pdt", "America/Los_Angeles"),
    ("aest", "Australia/Sydney"),
    ("tokyo", "Asia/Tokyo"),
    ("japan", "Asia/Tokyo"),
    ("seoul", "Asia/Seoul"),
    ("shanghai", "Asia/Shanghai"),
    ("beijing", "Asia/Shanghai"),
    ("china", "Asia/Shanghai"),
    ("singapore", "Asia/Singapore"),
    ("mumbai", "Asia/Kolkata"),
    ("delhi", "Asia/Kolkata"),
    ("india", "Asia/Kolkata"),
    ("dubai", "Asia/Dubai"),
    ("london", "Europe/London"),
    ("paris", "Europe/Paris"),
    ("berlin", "Europe/Berlin"),
    ("madrid", "Europe/Madrid"),
    ("rome", "Europe/Rome"),
    ("moscow", "Europe/Moscow"),
    ("new york", "America/New_York"),
    ("nyc", "America/New_York"),
    ("chicago", "America/Chicago"),
    ("denver", "America/Denver"),
    ("los angeles", "America/Los_Angeles"),
    ("la", "America/Los_Angeles"),
    ("san francisco", "America/Los_Angeles"),
    ("sao paulo", "America/Sao_Paulo"),
    ("sydney", "Australia/Sydney"),
    ("melbourne", "Australia/Melbourne"),
    ("auckland", "Pacific/Auckland"),
];

const WEATHER: &[(&str, &str)] = &[
    ("tokyo", "Sunny, 22°C"),
    ("london", "Cloudy, 15°C"),
    ("new york", "Rainy, 18°C"),
    ("paris", "Partly cloudy, 19°C"),
];

/// Registers every built-in tool in a fixed order
pub(crate) fn register_all(
    registry: &mut ToolRegistry,
    normalizer: Option<Arc<dyn LLMClient>>,
) -> Result<(), RegistryError> {
    registry.register(EchoTool::descriptor(), Arc::new(EchoTool))?;
    registry.register(TimeTool::descriptor(), Arc::new(TimeTool::new(normalizer)))?;
    registry.register(JokeTool::descriptor(), Arc::new(JokeTool))?;
    registry.register(AddNumbersTool::descriptor(), Arc::new(AddNumbersTool))?;
    registry.register(CalculateTool::descriptor(), Arc::new(CalculateTool))?;
    registry.register(WeatherTool::descriptor(), Arc::new(WeatherTool))?;
    Ok(())
}

fn str_arg<'a>(args: &'a Arguments, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing '{}' parameter", name))
}

pub struct EchoTool;

impl EchoTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("echo", "Echo the given text back unchanged")
            .param("text", ParamSpec::required(ParamType::String, "Text to echo"))
    }
}

#[async_trait]
impl Tool for EchoTool {
    async fn call(&self, args: &Arguments) -> Result<Value> {
        Ok(json!(str_arg(args, "text")?))
    }
}

/// Current time in a timezone given as an IANA name, abbreviation or city
pub struct TimeTool {
    normalizer: Option<Arc<dyn LLMClient>>,
}

impl TimeTool {
    pub fn new(normalizer: Option<Arc<dyn LLMClient>>) -> Self {
        Self { normalizer }
    }

    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("get_time", "Get current time for a given timezone").param(
            "timezone",
            ParamSpec::with_default(
                ParamType::String,
                "Timezone (e.g., 'UTC', 'JST', 'Asia/Tokyo', 'London')",
                json!("UTC"),
            ),
        )
    }

    /// Resolves user input to a timezone, falling back to UTC
    pub async fn resolve_timezone(&self, input: &str) -> Tz {
        if let Some(tz) = lookup_timezone(input) {
            return tz;
        }

        if let Some(client) = &self.normalizer {
            match normalize_with_model(client.as_ref(), input).await {
                Ok(Some(tz)) => return tz,
                Ok(None) => debug!(input, "Model did not return a valid timezone"),
                Err(e) => warn!(input, error = %e, "Timezone normalization failed"),
            }
        }

        Tz::UTC
    }
}

#[async_trait]
impl Tool for TimeTool {
    async fn call(&self, args: &Arguments) -> Result<Value> {
        let input = str_arg(args, "timezone")?;
        let tz = self.resolve_timezone(input).await;
        let now = Utc::now().with_timezone(&tz);

        Ok(json!(format!(
            "Current time in {} ({}): {}",
            input,
            tz.name(),
            now.format("%Y-%m-%d %H:%M:%S %Z")
        )))
    }
}

/// Alias table first, then IANA names, both case-insensitively
pub fn lookup_timezone(input: &str) -> Option<Tz> {
    let trimmed = input.trim();
    let key = trimmed.to_lowercase().replace('_', " ");
    if let Some((_, name)) = TIMEZONE_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return name.parse().ok();
    }

    if let Ok(tz) = trimmed.parse::<Tz>() {
        return Some(tz);
    }

    chrono_tz::TZ_VARIANTS
        .iter()
        .find(|tz| tz.name().eq_ignore_ascii_case(trimmed))
        .copied()
}

async fn normalize_with_model(client: &dyn LLMClient, input: &str) -> Result<Option<Tz>> {
    let prompt = format!(
        r#"Convert the user's timezone input to a proper IANA timezone identifier.

User input: "{}"

Available IANA timezone identifiers include examples like:
- Asia/Tokyo, Asia/Shanghai, Asia/Kolkata
- America/New_York, America/Los_Angeles, America/Chicago
- Europe/London, Europe/Paris, Europe/Berlin
- Australia/Sydney, Australia/Melbourne
- UTC

Rules:
1. If the input is already a valid IANA timezone (like "Asia/Tokyo"), return it exactly
2. Convert city/country names to proper IANA format (e.g., "Tokyo" -> "Asia/Tokyo")
3. Convert abbreviations (e.g., "JST" -> "Asia/Tokyo", "EST" -> "America/New_York")
4. Handle misspellings (e.g., "T0kyo" -> "Asia/Tokyo")
5. If unclear or invalid, return "UTC"

Respond with ONLY the IANA timezone identifier, nothing else."#,
        input
    );

    let response = client
        .chat(LLMRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(0.0))
        .await
        .context("completion backend unavailable")?;

    let candidate = response.content.trim().trim_matches(|c: char| c == '"' || c == '`');
    debug!(input, candidate, "Model timezone suggestion");
    Ok(candidate.parse::<Tz>().ok())
}

pub struct JokeTool;

impl JokeTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("random_joke", "Get a random programming joke")
    }
}

#[async_trait]
impl Tool for JokeTool {
    async fn call(&self, _args: &Arguments) -> Result<Value> {
        let joke = JOKES
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| anyhow!("No jokes available"))?;
        Ok(json!(joke))
    }
}

pub struct AddNumbersTool;

impl AddNumbersTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("add_numbers", "Add two numbers together")
            .param("a", ParamSpec::required(ParamType::Number, "First number"))
            .param("b", ParamSpec::required(ParamType::Number, "Second number"))
    }
}

#[async_trait]
impl Tool for AddNumbersTool {
    async fn call(&self, args: &Arguments) -> Result<Value> {
        let a = &args["a"];
        let b = &args["b"];

        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            if let Some(sum) = x.checked_add(y) {
                return Ok(json!(sum));
            }
        }

        let x = a.as_f64().ok_or_else(|| anyhow!("'a' is not a number"))?;
        let y = b.as_f64().ok_or_else(|| anyhow!("'b' is not a number"))?;
        serde_json::Number::from_f64(x + y)
            .map(Value::Number)
            .ok_or_else(|| anyhow!("Sum is not a finite number"))
    }
}

pub struct CalculateTool;

impl CalculateTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("calculate", "Calculate simple math expressions").param(
            "expression",
            ParamSpec::required(
                ParamType::String,
                "Math expression to calculate (e.g., '2 + 2', '10 * 5')",
            ),
        )
    }
}

#[async_trait]
impl Tool for CalculateTool {
    async fn call(&self, args: &Arguments) -> Result<Value> {
        let expression = str_arg(args, "expression")?;
        let value = calculator::evaluate(expression)
            .with_context(|| format!("Error calculating '{}'", expression))?;
        Ok(json!(format!(
            "Result: {} = {}",
            expression.trim(),
            calculator::format_number(value)
        )))
    }
}

pub struct WeatherTool;

impl WeatherTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("get_weather", "Get weather information for a city").param(
            "city",
            ParamSpec::required(
                ParamType::String,
                "City name (e.g., 'Tokyo', 'London', 'New York')",
            ),
        )
    }
}

#[async_trait]
impl Tool for WeatherTool {
    async fn call(&self, args: &Arguments) -> Result<Value> {
        let city = str_arg(args, "city")?;
        let key = city.trim().to_lowercase();

        let report = match WEATHER.iter().find(|(name, _)| *name == key) {
            Some((_, conditions)) => format!("Weather in {}: {}", city, conditions),
            None => format!("Weather data not available for {}", city),
        };
        Ok(json!(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLLMClient, MockResponse};

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_echo() {
        let result = EchoTool.call(&args(json!({"text": "hi"}))).await.unwrap();
        assert_eq!(result, json!("hi"));
    }

    #[test]
    fn test_lookup_timezone() {
        assert_eq!(lookup_timezone("Asia/Tokyo"), Some(Tz::Asia__Tokyo));
        assert_eq!(lookup_timezone("JST"), Some(Tz::Asia__Tokyo));
        assert_eq!(lookup_timezone("EST"), Some(Tz::America__New_York));
        assert_eq!(lookup_timezone("new york"), Some(Tz::America__New_York));
        assert_eq!(lookup_timezone("New_York"), Some(Tz::America__New_York));
        assert_eq!(lookup_timezone("europe/paris"), Some(Tz::Europe__Paris));
        assert_eq!(lookup_timezone("Atlantis"), None);
    }

    #[tokio::test]
    async fn test_get_time_known_zone() {
        let tool = TimeTool::new(None);
        let result = tool.call(&args(json!({"timezone": "JST"}))).await.unwrap();
        let text = result.as_str().unwrap();
        assert!(text.starts_with("Current time in JST (Asia/Tokyo): "));
        assert!(text.ends_with("JST"));
    }

    #[tokio::test]
    async fn test_get_time_unknown_zone_falls_back_to_utc() {
        let tool = TimeTool::new(None);
        let result = tool
            .call(&args(json!({"timezone": "Atlantis"})))
            .await
            .unwrap();
        assert!(result
            .as_str()
            .unwrap()
            .starts_with("Current time in Atlantis (UTC): "));
    }

    #[tokio::test]
    async fn test_get_time_uses_model_normalization() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::text("  Asia/Tokyo\n"));

        let tool = TimeTool::new(Some(client.clone() as Arc<dyn LLMClient>));
        let tz = tool.resolve_timezone("T0kyo").await;

        assert_eq!(tz, Tz::Asia__Tokyo);
        assert_eq!(client.request_count(), 1);
        assert!(client.requests()[0].messages[0].content.contains("\"T0kyo\""));
    }

    #[tokio::test]
    async fn test_get_time_rejects_invalid_model_answer() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::text("Somewhere/Else"));

        let tool = TimeTool::new(Some(client as Arc<dyn LLMClient>));
        assert_eq!(tool.resolve_timezone("Atlantis").await, Tz::UTC);
    }

    #[tokio::test]
    async fn test_get_time_alias_skips_model() {
        let client = Arc::new(MockLLMClient::new());
        let tool = TimeTool::new(Some(client.clone() as Arc<dyn LLMClient>));

        assert_eq!(tool.resolve_timezone("london").await, Tz::Europe__London);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_random_joke() {
        let result = JokeTool.call(&Arguments::new()).await.unwrap();
        assert!(JOKES.contains(&result.as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_add_numbers() {
        let result = AddNumbersTool
            .call(&args(json!({"a": 2, "b": 3})))
            .await
            .unwrap();
        assert_eq!(result, json!(5));
        assert_eq!(result.to_string(), "5");

        let result = AddNumbersTool
            .call(&args(json!({"a": 1.5, "b": 2})))
            .await
            .unwrap();
        assert_eq!(result, json!(3.5));
    }

    #[tokio::test]
    async fn test_calculate() {
        let result = CalculateTool
            .call(&args(json!({"expression": "15 * 3"})))
            .await
            .unwrap();
        assert_eq!(result, json!("Result: 15 * 3 = 45"));

        let err = CalculateTool
            .call(&args(json!({"expression": "1/0"})))
            .await
            .unwrap_err();
        assert_eq!(format!("{:#}", err), "Error calculating '1/0': Division by zero");
    }

    #[tokio::test]
    async fn test_get_weather() {
        let result = WeatherTool
            .call(&args(json!({"city": "Tokyo"})))
            .await
            .unwrap();
        assert_eq!(result, json!("Weather in Tokyo: Sunny, 22°C"));

        let result = WeatherTool
            .call(&args(json!({"city": "Oslo"})))
            .await
            .unwrap();
        assert_eq!(result, json!("Weather data not available for Oslo"));
    }
}
