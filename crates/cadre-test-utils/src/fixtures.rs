use cadre_core::graph_config::GraphConfig;

/// The three-worker research topology: every worker reports back to the
/// supervisor, and the supervisor branches to any worker or `FINISH`.
pub fn sample_graph_json() -> &'static str {
    r#"{
        "max_turns": 3,
        "agents": {
            "WebSearchAgent": {
                "tools": ["tavily_search", "get_current_date"],
                "prompt": null,
                "description": "Searches the web for current information."
            },
            "FinancialAgent": {
                "tools": ["alpha_vantage", "get_current_date"],
                "prompt": null,
                "description": "Retrieves stock prices and company financials."
            },
            "CodeAgent": {
                "tools": ["python_repl", "execute_and_save_graph_tool"],
                "prompt": null,
                "description": "Writes Python to plot data and saves the chart."
            }
        },
        "supervisor": {
            "name": "Supervisor",
            "prompt": "You are a supervisor managing a team of agents. Pick the agent best suited for the next step, or FINISH when the request is answered."
        },
        "relations": [
            { "sender": "WebSearchAgent", "receiver": "Supervisor", "edge_type": "edge" },
            { "sender": "FinancialAgent", "receiver": "Supervisor", "edge_type": "edge" },
            { "sender": "CodeAgent", "receiver": "Supervisor", "edge_type": "edge" }
        ],
        "conditional_edges": [
            {
                "sender": "Supervisor",
                "receivers": {
                    "WebSearchAgent": "WebSearchAgent",
                    "FinancialAgent": "FinancialAgent",
                    "CodeAgent": "CodeAgent"
                }
            }
        ]
    }"#
}

pub fn sample_graph() -> GraphConfig {
    GraphConfig::from_json(sample_graph_json()).expect("fixture must parse")
}

/// Star topology over the given `(name, description)` workers.
pub fn star_graph(max_turns: usize, workers: &[(&str, &str)]) -> GraphConfig {
    let agents: serde_json::Map<String, serde_json::Value> = workers
        .iter()
        .map(|(name, description)| {
            (
                name.to_string(),
                serde_json::json!({ "tools": [], "description": description }),
            )
        })
        .collect();
    let relations: Vec<serde_json::Value> = workers
        .iter()
        .map(|(name, _)| serde_json::json!({ "sender": name, "receiver": "Supervisor" }))
        .collect();
    let receivers: serde_json::Map<String, serde_json::Value> = workers
        .iter()
        .map(|(name, _)| (name.to_string(), serde_json::Value::String(name.to_string())))
        .collect();

    let doc = serde_json::json!({
        "max_turns": max_turns,
        "agents": agents,
        "supervisor": { "name": "Supervisor", "prompt": "Route the work." },
        "relations": relations,
        "conditional_edges": [ { "sender": "Supervisor", "receivers": receivers } ]
    });
    GraphConfig::from_json(&doc.to_string()).expect("star fixture must parse")
}
