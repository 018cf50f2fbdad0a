use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use aether_lang::{Engine, Limits, Optimization};
use clap::Parser;
use miette::IntoDiagnostic;

#[derive(Parser, Debug, Default)]
#[command(name = "aether")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## To run a script file:\n\
    aether script.ae\n\n\
    ## To evaluate an inline program:\n\
    aether -e 'Set X 10\nSet Y 20\n(X + Y)'\n\n\
    ## To run untrusted code with limits:\n\
    aether --max-steps 10000 --max-duration-ms 50 script.ae")]
#[command(
    about = "aether runs programs written in the Aether DSL.",
    long_about = None
)]
pub struct Cli {
    /// Evaluate the given code instead of reading a file
    #[arg(short, long, value_name = "CODE")]
    eval: Option<String>,

    /// Script file to run; reads from stdin when omitted
    file: Option<PathBuf>,

    /// Allow scripts to use the IO builtins
    #[arg(long, default_value_t = false)]
    permissive: bool,

    /// Abort evaluation after this many execution steps
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,

    /// Abort evaluation past this call depth
    #[arg(long, value_name = "N")]
    max_recursion_depth: Option<u32>,

    /// Abort evaluation after this wall-clock budget
    #[arg(long, value_name = "MS")]
    max_duration_ms: Option<u64>,

    /// Disable constant folding
    #[arg(long, default_value_t = false)]
    no_constant_folding: bool,

    /// Disable dead-code elimination
    #[arg(long, default_value_t = false)]
    no_dead_code: bool,

    /// Disable the tail-recursion rewrite
    #[arg(long, default_value_t = false)]
    no_tail_recursion: bool,

    /// Print collected trace records to stderr after the run
    #[arg(long, default_value_t = false)]
    trace: bool,

    /// Print cache and trace statistics as JSON to stderr after the run
    #[arg(long, default_value_t = false)]
    stats: bool,
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        let code = self.read_source()?;
        let engine = if self.permissive {
            Engine::with_permissions()
        } else {
            Engine::new()
        };

        engine.set_limits(Limits {
            max_steps: self.max_steps,
            max_recursion_depth: self.max_recursion_depth,
            max_duration: self.max_duration_ms.map(Duration::from_millis),
        });
        engine.set_optimization(Optimization {
            constant_folding: !self.no_constant_folding,
            dead_code: !self.no_dead_code,
            tail_recursion: !self.no_tail_recursion,
        });

        let result = engine.eval(&code).map_err(miette::Report::new)?;

        if !result.is_null() {
            println!("{}", result);
        }

        if self.trace {
            for line in engine.take_trace() {
                eprintln!("{}", line);
            }
        }

        if self.stats {
            let stats = serde_json::json!({
                "cache": engine.cache_stats(),
                "trace": engine.trace_stats(),
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&stats).into_diagnostic()?
            );
        }

        Ok(())
    }

    fn read_source(&self) -> miette::Result<String> {
        if let Some(code) = &self.eval {
            return Ok(code.clone());
        }

        match &self.file {
            Some(path) => std::fs::read_to_string(path).into_diagnostic(),
            None => {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .into_diagnostic()?;
                Ok(buffer)
            }
        }
    }
}
