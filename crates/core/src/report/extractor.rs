//! # Step Report Extractor
//!
//! Pulls source artifacts out of a pipeline message.
//!
//! Two passes, first match wins:
//! 1. A fenced ```` ```json ```` block holding an array of editor commands.
//!    File-writing commands become `<base name> -> content`.
//! 2. Otherwise every fenced code block, named `block_0.txt`, `block_1.txt`, ...
//!
//! Extraction never fails; malformed input yields whatever was recovered.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Editor commands that write a file
const FILE_WRITE_COMMANDS: [&str; 3] = [
    "Editor.create_file",
    "Editor.edit_file_by_replace",
    "Editor.append_file",
];

const PATH_KEYS: [&str; 2] = ["file_path", "path"];
const CONTENT_KEYS: [&str; 3] = ["file_content", "content", "new_content"];

/// Ordered file name -> content mapping. Re-inserting a name replaces its content
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFiles {
    entries: Vec<(String, String)>,
}

impl ExtractedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        let name = name.into();
        let content = content.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = content,
            None => self.entries.push((name, content)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, content)| content.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn greedy_json_block() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(\[.*\])\s*```").ok())
        .as_ref()
}

fn lazy_json_block() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(\[.*?\])\s*```").ok())
        .as_ref()
}

fn fenced_block() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:\w+)?\s*\n(.*?)\n```").ok())
        .as_ref()
}

/// Extract source artifacts from a message's text.
pub fn extract_files(content: &str) -> ExtractedFiles {
    if let Some(commands) = parse_command_block(content) {
        return files_from_commands(&commands);
    }
    files_from_fenced_blocks(content)
}

/// First JSON command array that parses. The greedy match covers file contents
/// that contain fences of their own; the lazy matches cover messages with
/// several separate blocks.
fn parse_command_block(content: &str) -> Option<Vec<Value>> {
    let greedy = greedy_json_block()
        .and_then(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    let lazy = lazy_json_block()
        .into_iter()
        .flat_map(|re| re.captures_iter(content))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()));

    for candidate in greedy.into_iter().chain(lazy) {
        match serde_json::from_str::<Vec<Value>>(candidate) {
            Ok(commands) => return Some(commands),
            Err(e) => tracing::debug!("skipping unparseable command block: {}", e),
        }
    }
    None
}

fn files_from_commands(commands: &[Value]) -> ExtractedFiles {
    let mut files = ExtractedFiles::new();

    for command in commands {
        let Some(name) = command.get("command_name").and_then(Value::as_str) else {
            continue;
        };
        if !FILE_WRITE_COMMANDS.contains(&name) {
            continue;
        }
        let Some(args) = command.get("args") else {
            continue;
        };
        let (Some(path), Some(body)) = (first_text(args, &PATH_KEYS), first_text(args, &CONTENT_KEYS))
        else {
            continue;
        };
        match base_name(path) {
            Some(file_name) => files.insert(file_name, body),
            None => tracing::debug!(path, "ignoring command without a usable file name"),
        }
    }

    files
}

fn files_from_fenced_blocks(content: &str) -> ExtractedFiles {
    let mut files = ExtractedFiles::new();
    let Some(re) = fenced_block() else {
        return files;
    };

    for (index, caps) in re.captures_iter(content).enumerate() {
        if let Some(block) = caps.get(1) {
            files.insert(format!("block_{}.txt", index), block.as_str());
        }
    }
    files
}

/// First non-empty string among `keys`
fn first_text<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| args.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
}

/// Last path component, accepting both separators. `.` and `..` are rejected.
fn base_name(path: &str) -> Option<&str> {
    let name = path.rsplit(&['/', '\\'][..]).next()?.trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_file_command_strips_directories() {
        let msg = r#"I will create the helper now.
```json
[
  {"command_name": "Editor.create_file", "args": {"file_path": "src/utils/helper.py", "file_content": "x=1"}}
]
```"#;
        let files = extract_files(msg);
        assert_eq!(files.len(), 1);
        assert_eq!(files.get("helper.py"), Some("x=1"));
    }

    #[test]
    fn test_alternate_argument_keys() {
        let msg = r#"```json
[
  {"command_name": "Editor.append_file", "args": {"path": "docs/notes.md", "content": "more"}},
  {"command_name": "Editor.edit_file_by_replace", "args": {"file_path": "app.py", "file_content": "", "new_content": "print()"}}
]
```"#;
        let files = extract_files(msg);
        assert_eq!(files.names(), vec!["notes.md", "app.py"]);
        assert_eq!(files.get("app.py"), Some("print()"));
    }

    #[test]
    fn test_non_write_commands_are_ignored() {
        let msg = r#"```json
[
  {"command_name": "RoleZero.reply_to_human", "args": {"content": "done"}},
  {"command_name": "Editor.create_file", "args": {"file_path": "main.py"}},
  {"command_name": "end"}
]
```"#;
        assert!(extract_files(msg).is_empty());
    }

    #[test]
    fn test_fallback_names_blocks_in_order() {
        let msg = "First:\n```python\nprint('a')\n```\nThen:\n```\nb = 2\n```\n";
        let files = extract_files(msg);
        assert_eq!(files.names(), vec!["block_0.txt", "block_1.txt"]);
        assert_eq!(files.get("block_0.txt"), Some("print('a')"));
        assert_eq!(files.get("block_1.txt"), Some("b = 2"));
    }

    #[test]
    fn test_malformed_json_falls_back_to_blocks() {
        let msg = "```json\n[{\"command_name\": \"Editor.create_file\", \n```\n";
        let files = extract_files(msg);
        assert_eq!(files.names(), vec!["block_0.txt"]);
    }

    #[test]
    fn test_second_json_block_recovered() {
        let msg = "```json\n[not json]\n```\nretry:\n```json\n[{\"command_name\": \"Editor.create_file\", \"args\": {\"file_path\": \"a/b.rs\", \"file_content\": \"fn main() {}\"}}]\n```";
        let files = extract_files(msg);
        assert_eq!(files.get("b.rs"), Some("fn main() {}"));
    }

    #[test]
    fn test_plain_text_yields_nothing() {
        assert!(extract_files("The architect reviewed the PRD.").is_empty());
        assert!(extract_files("").is_empty());
    }

    #[test]
    fn test_traversal_paths_rejected() {
        assert_eq!(base_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(base_name("src\\win\\mod.rs"), Some("mod.rs"));
        assert_eq!(base_name("src/.."), None);
        assert_eq!(base_name("src/"), None);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut files = ExtractedFiles::new();
        files.insert("a.py", "1");
        files.insert("b.py", "2");
        files.insert("a.py", "3");
        assert_eq!(files.names(), vec!["a.py", "b.py"]);
        assert_eq!(files.get("a.py"), Some("3"));
    }
}
