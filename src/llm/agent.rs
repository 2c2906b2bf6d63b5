//! Agent definition sent with every turn
//!
//! The hosted runtime executes the tools; all we declare is which ones are
//! available and how they are configured.

use crate::config::{Config, ToolsConfig};
use serde::Serialize;

pub const DEFAULT_AGENT_NAME: &str = "ChatGPT Clone";

pub const DEFAULT_INSTRUCTIONS: &str = "\
You are a helpful AI assistant. Engage in a friendly and informative manner.
You have access to the following tools:
    - Web Search Tool: Use this tool to search the web for up-to-date information. \
Always use the tools when necessary to answer the user's questions accurately.
    - File Search Tool: Use this tool to search the contents of files in a vector store. \
Use this tool when the user asks about specific documents or files.
    - Image Generation Tool: Use this tool to generate images based on user descriptions. \
Use this tool when the user requests images or visual content.
    - Code Interpreter Tool: Use this tool when you need to write and run code to answer \
the user's question.
    - Hosted MCP Tool: Use this tool to access additional functionalities provided by the \
hosted MCP service.
Always provide accurate and concise responses to the user's queries.";

/// Instructions, model and hosted tools for the chat agent
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<HostedTool>,
}

impl Agent {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            model: model.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_tool(mut self, tool: HostedTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Build the agent from config
    ///
    /// File search is only declared when a vector store is configured, since
    /// the API rejects an empty `vector_store_ids`.
    pub fn from_config(config: &Config) -> Self {
        let mut agent = Agent::new(&config.agent.name, &config.openai.model)
            .with_instructions(&config.agent.instructions);
        agent.tools = hosted_tools(&config.tools, config.openai.vector_store_id.as_deref());
        agent
    }
}

fn hosted_tools(tools: &ToolsConfig, vector_store_id: Option<&str>) -> Vec<HostedTool> {
    let mut hosted = Vec::new();

    if tools.web_search.enabled {
        hosted.push(HostedTool::WebSearch);
    }

    match vector_store_id {
        Some(id) if tools.file_search.enabled => hosted.push(HostedTool::FileSearch {
            vector_store_ids: vec![id.to_string()],
            max_num_results: tools.file_search.max_num_results,
        }),
        None if tools.file_search.enabled => {
            tracing::warn!("File search disabled: VECTOR_STORE_ID is not set");
        }
        _ => {}
    }

    if tools.image_generation.enabled {
        hosted.push(HostedTool::ImageGeneration {
            quality: tools.image_generation.quality.clone(),
            output_format: tools.image_generation.output_format.clone(),
            partial_images: tools.image_generation.partial_images,
        });
    }

    if tools.code_interpreter.enabled {
        hosted.push(HostedTool::CodeInterpreter {
            container: ContainerConfig::Auto,
        });
    }

    if tools.mcp.enabled {
        hosted.push(HostedTool::Mcp {
            server_url: tools.mcp.server_url.clone(),
            server_label: tools.mcp.server_label.clone(),
            server_description: tools.mcp.server_description.clone(),
            require_approval: tools.mcp.require_approval.clone(),
        });
    }

    hosted
}

/// Tool declarations in Responses API form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostedTool {
    WebSearch,
    FileSearch {
        vector_store_ids: Vec<String>,
        max_num_results: u32,
    },
    ImageGeneration {
        quality: String,
        output_format: String,
        partial_images: u32,
    },
    CodeInterpreter {
        container: ContainerConfig,
    },
    Mcp {
        server_url: String,
        server_label: String,
        server_description: String,
        require_approval: String,
    },
}

/// Sandbox provisioning for the code interpreter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContainerConfig {
    Auto,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_declares_all_tools() {
        let mut config = Config::default();
        config.openai.vector_store_id = Some("vs_123".to_string());

        let agent = Agent::from_config(&config);
        assert_eq!(agent.name, "ChatGPT Clone");

        let tools = serde_json::to_value(&agent.tools).unwrap();
        assert_eq!(
            tools,
            json!([
                {"type": "web_search"},
                {"type": "file_search", "vector_store_ids": ["vs_123"], "max_num_results": 3},
                {"type": "image_generation", "quality": "auto", "output_format": "jpeg", "partial_images": 1},
                {"type": "code_interpreter", "container": {"type": "auto"}},
                {
                    "type": "mcp",
                    "server_url": "https://mcp.context7.com/mcp",
                    "server_label": "Context7",
                    "server_description": "Use this to get the docs from software projects.",
                    "require_approval": "never"
                }
            ])
        );
    }

    #[test]
    fn test_file_search_dropped_without_vector_store() {
        let config = Config::default();
        let agent = Agent::from_config(&config);
        assert!(!agent
            .tools
            .iter()
            .any(|t| matches!(t, HostedTool::FileSearch { .. })));
        assert_eq!(agent.tools.len(), 4);
    }

    #[test]
    fn test_disabled_tools_are_omitted() {
        let mut config = Config::default();
        config.tools.mcp.enabled = false;
        config.tools.code_interpreter.enabled = false;

        let agent = Agent::from_config(&config);
        assert_eq!(
            agent.tools,
            vec![
                HostedTool::WebSearch,
                HostedTool::ImageGeneration {
                    quality: "auto".to_string(),
                    output_format: "jpeg".to_string(),
                    partial_images: 1,
                },
            ]
        );
    }
}
