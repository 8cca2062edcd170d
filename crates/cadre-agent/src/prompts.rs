//! Default system prompts for workers whose config leaves `prompt` unset.

const FINANCIAL: &str = "You are a financial analysis agent. Your role is to use the Alpha Vantage tool \
to gather financial data and provide concise, informative answers. When a user asks about a stock, \
always use the Alpha Vantage tool to retrieve the latest data. Do not generate charts or plots. \
Only use the tools provided to you and return a clear, text-based analysis or result.";

const WEB_SEARCH: &str = "You are a web search agent. Your role is to use web search tools to find \
information and return comprehensive answers to queries.";

const CODE: &str = "You are a visualization agent. Your role is to create visual representations of \
data using Python. Use the available tools to submit your visualization code or to execute and save \
graphs as JPEGs. Do not perform any data analysis or gather information. Your sole purpose is to take \
the given data and create appropriate visualizations. Return the code for the visualization for \
review, or save the graph as instructed.";

/// Built-in prompt for a well-known worker name.
pub fn builtin(worker: &str) -> Option<&'static str> {
    match worker {
        "FinancialAgent" => Some(FINANCIAL),
        "WebSearchAgent" => Some(WEB_SEARCH),
        "CodeAgent" => Some(CODE),
        _ => None,
    }
}

/// The system prompt a worker runs with.
pub fn resolve(worker: &str, configured: Option<&str>, description: &str) -> String {
    if let Some(prompt) = configured {
        return prompt.to_string();
    }
    match builtin(worker) {
        Some(prompt) => prompt.to_string(),
        None => format!(
            "You are {worker}, one member of a team of agents coordinated by a supervisor. \
             Your responsibility: {description} Use the tools provided to you when they help, \
             and reply with a clear, self-contained answer."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_prompt_wins() {
        assert_eq!(resolve("CodeAgent", Some("custom"), "d"), "custom");
    }

    #[test]
    fn test_builtin_for_known_workers() {
        assert!(resolve("FinancialAgent", None, "d").contains("Alpha Vantage"));
        assert!(resolve("WebSearchAgent", None, "d").starts_with("You are a web search agent"));
        assert!(resolve("CodeAgent", None, "d").contains("JPEGs"));
    }

    #[test]
    fn test_generic_prompt_uses_description() {
        let prompt = resolve("Summarizer", None, "Condenses long answers.");
        assert!(prompt.contains("Summarizer"));
        assert!(prompt.contains("Condenses long answers."));
    }
}
