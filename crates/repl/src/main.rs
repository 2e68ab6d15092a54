//! Schematika CLI
//!
//! `skmr` runs the interactive read-eval-print loop by default, plus
//! batch evaluation, a token dump mode, a parse-only mode, and shell
//! completion generation.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use skm_reader::span::Span;
use skm_reader::tokenizer::Tokenizer;
use skm_vsm::config::VsmConfig;
use skm_vsm::error::VsmError;
use skm_vsm::interp::Schematika;
use std::io::Read;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skmr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Schematika interpreter - read, evaluate, print", long_about = None)]
struct Cli {
    /// Interpreter configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose machine and collector logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive read-eval-print loop (the default)
    Repl,

    /// Evaluate a source file and print each form's value
    Run {
        /// Input source file
        input: PathBuf,
    },

    /// Scan stdin and print one token per line
    Tokens,

    /// Parse stdin and pretty-print each toplevel form without
    /// evaluating
    Parse,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match VsmConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
        None => VsmConfig::default(),
    };
    if cli.debug {
        config.debug_flag = true;
    }

    let default_filter = if config.debug_flag { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => run_repl(config),
        Commands::Run { input } => run_file(config, &input),
        Commands::Tokens => run_tokens(),
        Commands::Parse => run_parse(config),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "skmr", &mut std::io::stdout());
}

fn welcome() {
    eprintln!("read-eval-print loop for schematika expressions");
    eprintln!("  :mem            print per-generation heap usage");
    eprintln!("  :gc             run a full collection");
    eprintln!("  ctrl-d          exit");
    eprintln!();
}

/// Source lines seen this session, for caret displays.
struct LineStore {
    lines: Vec<String>,
}

impl LineStore {
    fn new() -> Self {
        LineStore { lines: Vec::new() }
    }

    fn push_text(&mut self, text: &str) {
        for line in text.split('\n') {
            self.lines.push(line.to_string());
        }
    }

    fn push_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn report(&self, e: &VsmError) -> String {
        match e {
            VsmError::Read(re) => {
                let ix = re.pos().line.saturating_sub(1) as usize;
                match self.lines.get(ix) {
                    Some(line) => re.report(line),
                    None => re.to_string(),
                }
            }
            VsmError::Eval(ee) => ee.to_string(),
        }
    }
}

fn print_results(interp: &Schematika, lines: &LineStore, results: &[skm_vsm::FormResult]) {
    for r in results {
        match r {
            Ok(value) => println!("{}", interp.render_value(*value)),
            Err(e) => eprintln!("{}", lines.report(e)),
        }
    }
}

fn history_path(config: &VsmConfig) -> Option<PathBuf> {
    config
        .repl
        .history_file
        .clone()
        .or_else(|| home::home_dir().map(|h| h.join(".skm_history")))
}

fn run_repl(config: VsmConfig) {
    let mut interp = Schematika::new(config.clone());
    interp.begin_interactive_session();

    let mut rl = match rustyline::Config::builder()
        .max_history_size(config.repl.history_size)
        .map(|b| b.build())
        .and_then(DefaultEditor::with_config)
    {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: cannot initialize line editor: {e}");
            process::exit(1);
        }
    };
    let history = history_path(&config);
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    if config.repl.welcome {
        welcome();
    }

    let mut lines = LineStore::new();
    loop {
        let prompt = if interp.parser_stack_depth() <= 1 {
            "> "
        } else {
            ". "
        };
        match rl.readline(prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());

                // directives apply only between forms
                if interp.parser_stack_depth() <= 1 {
                    match line.trim() {
                        ":mem" => {
                            print_memory(&interp);
                            lines.push_line(&line);
                            continue;
                        }
                        ":gc" => {
                            interp.collect_now();
                            print_memory(&interp);
                            lines.push_line(&line);
                            continue;
                        }
                        _ => {}
                    }
                }

                lines.push_line(&line);
                let input = format!("{line}\n");
                let results = interp.read_eval(&input, false);
                print_results(&interp, &lines, &results);
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                // flush pending scanner and parser state
                let results = interp.read_eval("", true);
                print_results(&interp, &lines, &results);
                break;
            }
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = rl.save_history(path);
    }
}

fn print_memory(interp: &Schematika) {
    for g in interp.memory_stats() {
        println!(
            "gen {}: {} objects, {} / {} bytes, {} collections",
            g.generation, g.n_objects, g.used_z, g.reserve_z, g.n_collections
        );
    }
}

fn run_file(config: VsmConfig, input: &PathBuf) {
    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", input.display(), e);
            process::exit(1);
        }
    };
    let mut interp = Schematika::new(config);
    interp.begin_batch_session();
    let mut lines = LineStore::new();
    lines.push_text(&source);

    let results = interp.eval_source(&source);
    let failed = results.iter().any(Result::is_err);
    print_results(&interp, &lines, &results);
    if failed {
        process::exit(1);
    }
}

fn run_tokens() {
    let mut source = String::new();
    if std::io::stdin().read_to_string(&mut source).is_err() {
        eprintln!("Error: stdin is not valid UTF-8");
        process::exit(1);
    }

    let mut tkz = Tokenizer::new(0);
    let mut rest = Span::all(&source);
    loop {
        let out = tkz.scan(&source, rest);
        rest = rest.suffix_after(out.consumed);
        if let Some(e) = out.error {
            eprintln!("{e}");
            continue;
        }
        match out.token {
            Some(tok) => print_token(&tok),
            None => break,
        }
    }
    match tkz.notify_eof() {
        Ok(Some(tok)) => print_token(&tok),
        Ok(None) => {}
        Err(e) => eprintln!("{e}"),
    }
}

fn print_token(tok: &skm_reader::token::Token) {
    println!(
        "{}:{}\t{:?}\t{}",
        tok.pos().line,
        tok.pos().col,
        tok.ty(),
        tok.untokenize()
    );
}

fn run_parse(config: VsmConfig) {
    let mut source = String::new();
    if std::io::stdin().read_to_string(&mut source).is_err() {
        eprintln!("Error: stdin is not valid UTF-8");
        process::exit(1);
    }

    let mut interp = Schematika::new(config);
    interp.begin_batch_session();
    let mut lines = LineStore::new();
    lines.push_text(&source);

    let mut failed = false;
    for r in interp.parse_source(&source) {
        match r {
            Ok(form) => println!("{}", interp.render_expr(form)),
            Err(e) => {
                failed = true;
                eprintln!("{}", lines.report(&e));
            }
        }
    }
    if failed {
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skm_reader::error::{LexError, ReaderError};
    use skm_reader::token::SourcePos;

    #[test]
    fn test_history_path_prefers_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        let mut cfg = VsmConfig::default();
        cfg.repl.history_file = Some(path.clone());
        assert_eq!(history_path(&cfg), Some(path));
    }

    #[test]
    fn test_line_store_caret_uses_offending_line() {
        let mut lines = LineStore::new();
        lines.push_line("def ok = 1;");
        lines.push_line("def bad = @;");
        let e = VsmError::Read(ReaderError::Lex(LexError::new(
            "tokenizer::scan",
            "stray character '@'",
            SourcePos::new(0, 2, 11),
        )));
        let report = lines.report(&e);
        assert!(report.contains("def bad = @;"));
        assert!(report.lines().last().unwrap().ends_with('^'));
    }

    #[test]
    fn test_line_store_out_of_range_falls_back() {
        let lines = LineStore::new();
        let e = VsmError::Read(ReaderError::Lex(LexError::new(
            "tokenizer::scan",
            "stray character",
            SourcePos::new(0, 9, 1),
        )));
        // no stored line: plain message, no caret display
        assert!(!lines.report(&e).contains('\n'));
    }
}
