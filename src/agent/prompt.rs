//! Phase prompts.
//!
//! Every step has a built-in template; `steps.<step>.prompt_template` in
//! agents.yaml replaces it. Templates see these variables:
//!
//! - `{step}`, `{task}`, `{output_id}`, `{project_path}`
//! - `{plan}`, `{spec}` - Output of earlier phases, empty when absent
//! - `{feedback}` - Validation failures the fix phase must address

use super::phase::Step;
use super::template::{TemplateError, render_template};
use crate::error::{GateError, Result};
use std::collections::HashMap;

const PLAN_TEMPLATE: &str = "\
You are planning a code change in the project at {project_path}.

## Task
{task}

Write a short implementation plan: the files to create, modify or delete and
the tests that prove the change works, including failure cases.
";

const SPEC_TEMPLATE: &str = "\
You are writing the specification of a code change.

## Task
{task}

## Plan
{plan}

Describe the public interface, the behavior of every function, the error
cases and the test cases. Do not write the implementation.
";

const IMPLEMENT_TEMPLATE: &str = "\
You are implementing a code change in the project at {project_path}.

## Task
{task}

## Specification
{spec}

Return every file in full inside a fenced block whose info string is
`file:<relative path>`, for example:

```ts file:src/sum.ts
export const sum = (a: number, b: number) => a + b;
```
";

const FIX_TEMPLATE: &str = "\
Your previous change for the task below failed validation.

## Task
{task}

## Specification
{spec}

## Failures
{feedback}

Return only the corrected files, each in full inside a fenced block whose
info string is `file:<relative path>`.
";

/// Built-in template of `step`.
pub fn default_template(step: Step) -> &'static str {
    match step {
        Step::Plan => PLAN_TEMPLATE,
        Step::Spec => SPEC_TEMPLATE,
        Step::Implement => IMPLEMENT_TEMPLATE,
        Step::Fix => FIX_TEMPLATE,
    }
}

/// Values available to a phase prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub task: String,
    pub output_id: String,
    pub project_path: String,
    pub plan: String,
    pub spec: String,
    pub feedback: String,
}

impl PromptContext {
    pub fn to_template_vars(&self, step: Step) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("step".to_string(), step.as_str().to_string());
        vars.insert("task".to_string(), self.task.clone());
        vars.insert("output_id".to_string(), self.output_id.clone());
        vars.insert("project_path".to_string(), self.project_path.clone());
        vars.insert("plan".to_string(), self.plan.clone());
        vars.insert("spec".to_string(), self.spec.clone());
        vars.insert("feedback".to_string(), self.feedback.clone());
        vars
    }
}

/// Render the prompt of `step`, using `custom` instead of the built-in
/// template when given.
///
/// # Errors
///
/// `ConfigError` when a custom template is malformed or names an unknown
/// variable.
pub fn render_prompt(step: Step, ctx: &PromptContext, custom: Option<&str>) -> Result<String> {
    let template = custom
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| default_template(step));
    let vars = ctx.to_template_vars(step);

    render_template(template, &vars).map_err(|e| {
        let hint = match &e {
            TemplateError::UndefinedVariable { .. } => {
                let mut names: Vec<&str> = vars.keys().map(String::as_str).collect();
                names.sort_unstable();
                format!("\nAvailable variables: {}", names.join(", "))
            }
            _ => String::new(),
        };
        GateError::ConfigError(format!(
            "prompt template of step '{}' is invalid: {}{}",
            step, e, hint
        ))
    })
}
