//! Tests for agent prompt loading from config/prompts

use std::fs;

use analyst_bot::agents::prompt::{self, PromptBuilder};

#[test]
fn test_prompt_files_exist() {
    for name in [prompt::PERSONA, prompt::ANALYSIS, prompt::VISUALIZATION, prompt::REPORT] {
        let path = format!("config/prompts/{name}");
        assert!(fs::metadata(&path).is_ok(), "{name} prompt file missing");
    }
}

#[test]
fn test_analysis_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/analysis.txt").unwrap();
    for var in ["{{request}}", "{{summary}}", "{{sample}}"] {
        assert!(text.contains(var), "analysis.txt should contain {var}");
    }
}

#[test]
fn test_visualization_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/visualization.txt").unwrap();
    assert!(text.contains("{{request}}"));
    assert!(text.contains("{{columns}}"));
    for kind in ["\"bar\"", "\"line\"", "\"scatter\"", "\"histogram\""] {
        assert!(text.contains(kind), "visualization.txt should list chart kind {kind}");
    }
}

#[test]
fn test_report_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/report.txt").unwrap();
    for var in ["{{title}}", "{{request}}", "{{analysis}}", "{{charts}}"] {
        assert!(text.contains(var), "report.txt should contain {var}");
    }
}

#[test]
fn test_shipped_prompts_fully_substitute() {
    let built = PromptBuilder::new("config/prompts")
        .layer(prompt::REPORT)
        .var("title", "Q1")
        .var("request", "summarize")
        .var("analysis", "none")
        .var("charts", "none")
        .build();
    assert!(built.contains("titled \"Q1\""));
    assert!(!built.contains("{{"), "unsubstituted placeholder left in: {built}");
}

#[test]
fn test_persona_loads() {
    let persona = prompt::persona(std::path::Path::new("config/prompts"));
    assert!(persona.is_some_and(|p| !p.trim().is_empty()));
}
