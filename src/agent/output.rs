//! Source files embedded in provider output.
//!
//! A file is a fenced block whose info string carries `file:<path>`:
//!
//! ````text
//! ```ts file:src/sum.ts
//! export const sum = (a: number, b: number) => a + b;
//! ```
//! ````
//!
//! Blocks without a `file:` token are ignored. A later block for the same
//! path replaces an earlier one.

const FENCE: &str = "```";

/// `(path, content)` pairs in first-seen order. Paths are not validated here.
pub fn extract_files(text: &str) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = Vec::new();
    let mut open: Option<(Option<String>, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match open.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix(FENCE) {
                    open = Some((file_token(info), Vec::new()));
                }
            }
            Some((path, mut body)) => {
                if trimmed.trim_end() == FENCE {
                    if let Some(path) = path {
                        let mut content = body.join("\n");
                        content.push('\n');
                        match files.iter_mut().find(|(p, _)| *p == path) {
                            Some(existing) => existing.1 = content,
                            None => files.push((path, content)),
                        }
                    }
                } else {
                    body.push(line);
                    open = Some((path, body));
                }
            }
        }
    }

    files
}

fn file_token(info: &str) -> Option<String> {
    info.split_whitespace()
        .find_map(|word| word.strip_prefix("file:"))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
}
