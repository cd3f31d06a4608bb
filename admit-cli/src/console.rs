//! Interactive chat console.

use std::fmt::Write as _;

use admit_rag::{PipelineHandle, SearchResult, user_message};
use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

const PROMPT: &str = "you> ";

const HELP: &str = "Commands:
  /sources   toggle printing the passages behind each answer
  /history   show the questions asked so far
  /help      show this help
  /quit      leave (Ctrl-D also works)";

/// One question and the answer shown for it.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Blank,
    Quit,
    ToggleSources,
    History,
    Help,
    Unknown(&'a str),
    Question(&'a str),
}

pub fn parse_line(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }
    match line {
        "/quit" | "/exit" | "/q" => Input::Quit,
        "/sources" => Input::ToggleSources,
        "/history" => Input::History,
        "/help" | "/?" => Input::Help,
        command if command.starts_with('/') => Input::Unknown(command),
        question => Input::Question(question),
    }
}

/// Render retrieved passages as `[n] source (score) preview` lines.
pub fn format_sources(sources: &[SearchResult]) -> String {
    const PREVIEW_CHARS: usize = 160;

    let mut out = String::new();
    for (i, source) in sources.iter().enumerate() {
        let text = source.chunk.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
        if text.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        let _ = writeln!(
            out,
            "  [{}] {} (score {:.3})\n      {}",
            i + 1,
            source.chunk.document_id,
            source.score,
            preview
        );
    }
    out
}

pub fn format_history(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return "No questions yet.\n".to_string();
    }
    let mut out = String::new();
    for (i, turn) in turns.iter().enumerate() {
        let _ = writeln!(out, "{}. {}\n   {}", i + 1, turn.question, turn.answer.trim());
    }
    out
}

/// Run the console until `/quit` or end of input.
pub async fn run(pipeline: PipelineHandle) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to start the line editor")?;
    let mut turns: Vec<ConversationTurn> = Vec::new();
    let mut show_sources = false;

    let stats = pipeline.stats();
    println!("Admission Assistant");
    println!(
        "{} passages from {} documents. Ask a question, or /help for commands.\n",
        stats.chunks, stats.documents
    );

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("(type /quit to leave)");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };

        match parse_line(&line) {
            Input::Blank => {}
            Input::Quit => break,
            Input::ToggleSources => {
                show_sources = !show_sources;
                println!("Sources {}.", if show_sources { "on" } else { "off" });
            }
            Input::History => print!("{}", format_history(&turns)),
            Input::Help => println!("{HELP}"),
            Input::Unknown(command) => println!("Unknown command {command}. Type /help."),
            Input::Question(question) => {
                let _ = editor.add_history_entry(question);
                let (answer, sources) = match pipeline.try_answer(question).await {
                    Ok(answer) => (answer.text, answer.sources),
                    Err(e) => {
                        warn!(error = %e, "question failed");
                        (user_message(&e).to_string(), Vec::new())
                    }
                };

                println!("\n{}\n", answer.trim());
                if show_sources && !sources.is_empty() {
                    println!("Sources:\n{}", format_sources(&sources));
                }
                turns.push(ConversationTurn { question: question.to_string(), answer, sources });
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}
