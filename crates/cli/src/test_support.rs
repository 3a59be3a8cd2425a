use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;

use crate::terminal::Terminal;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Locks process environment mutation for the entire test body.
pub(crate) fn with_locked_env<R>(run: impl FnOnce() -> R) -> R {
    let _guard = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    run()
}

/// Set an environment variable in test contexts.
///
/// # Safety
/// Call sites should use `with_locked_env` to avoid data races between
/// parallel tests.
pub(crate) fn set_env_var(key: &str, value: &str) {
    // SAFETY: serialized by `with_locked_env`.
    unsafe {
        std::env::set_var(key, value);
    }
}

/// Remove an environment variable in test contexts.
///
/// # Safety
/// Call sites should use `with_locked_env` to avoid data races between
/// parallel tests.
pub(crate) fn remove_env_var(key: &str) {
    // SAFETY: serialized by `with_locked_env`.
    unsafe {
        std::env::remove_var(key);
    }
}

/// Terminal fed from a fixed list of input lines. Records every prompt and
/// output line; reports closed input once the script runs out.
#[derive(Default)]
pub(crate) struct ScriptedTerminal {
    input: VecDeque<String>,
    pub prompts: Vec<String>,
    pub output: Vec<String>,
}

impl ScriptedTerminal {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Terminal for ScriptedTerminal {
    async fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.input.pop_front())
    }

    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.output.push(line.to_string());
        Ok(())
    }
}
