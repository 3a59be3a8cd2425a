/// Default system prompt: a ReAct agent driving the Firecrawl toolkit.
pub const FIRECRAWL_SYSTEM_PROMPT: &str = include_str!("../prompts/firecrawl.md");
