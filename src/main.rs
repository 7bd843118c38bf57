use std::path::PathBuf;
use std::{env, io::IsTerminal};

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zexpr_eval::{
    Address, AssemblyContext, Evaluation, ExprConfig, ExprError, Expression, RenderOptions,
    StringEncoding, SymbolTable, load_config, render_error,
};

#[derive(Debug, Parser)]
#[command(
    name = "zexpr",
    version,
    about = "Expression evaluator of the Z80/Z280 relocating assembler",
    long_about = None,
    after_help = "Examples:\n  zexpr eval \"3 + 4 * 5\"\n  zexpr eval -D START=100h:code \"HIGH (START + 2)\"\n  zexpr postfix \"-(-3-4 MOD 5)\"\n  zexpr link -x PRINT --byte \"LOW PRINT\"\n  zexpr --help"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Evaluate an expression and print the outcome.
    Eval(EvalArgs),
    /// Print the postfix form of an expression.
    Postfix(ExprArgs),
    /// Print the extended link items of an expression.
    Link(ExprArgs),
}

#[derive(Debug, Args)]
struct EvalArgs {
    #[command(flatten)]
    expr: ExprArgs,
    /// How unknown symbols are handled.
    #[arg(short = 'm', long = "mode", value_enum, default_value_t = Mode::Strict)]
    mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Unknown symbols are errors.
    Strict,
    /// Unknown symbols leave the expression unresolved.
    Try,
    /// Any symbol leaves the expression unresolved.
    Lookahead,
}

#[derive(Debug, Args)]
struct ExprArgs {
    /// Expression text.
    #[arg(value_name = "EXPRESSION", allow_hyphen_values = true)]
    expression: String,
    /// Expression config file in RON format.
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Default radix for numbers without a suffix (2-16).
    #[arg(short = 'r', long = "radix", value_name = "RADIX")]
    radix: Option<u32>,
    /// Output encoding of string literals (ascii, latin1, utf8).
    #[arg(short = 'e', long = "encoding", value_name = "ENCODING")]
    encoding: Option<StringEncoding>,
    /// Honor backslash escapes in double-quoted strings.
    #[arg(long = "escapes")]
    escapes: bool,
    /// Define a symbol: NAME=VALUE[:code|:data|:absolute|:common=BLOCK].
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    defines: Vec<String>,
    /// Declare a symbol of another module.
    #[arg(short = 'x', long = "external", value_name = "NAME")]
    externals: Vec<String>,
    /// Value of `$`, with the same syntax as a definition value.
    #[arg(short = 'l', long = "location", value_name = "VALUE")]
    location: Option<String>,
    /// Module whose name prefixes non-root symbols.
    #[arg(long = "module", value_name = "NAME")]
    module: Option<String>,
    /// Lex string literals as DEFB data.
    #[arg(long = "defb")]
    defb: bool,
    /// The expression is stored as a single byte.
    #[arg(long = "byte")]
    byte: bool,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Eval(args)) => eval_command(args),
        Some(Commands::Postfix(args)) => postfix_command(args),
        Some(Commands::Link(args)) => link_command(args),
        None => {
            print_banner();
            println!();
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn print_banner() {
    println!("ZEXPR, version {}.", env!("CARGO_PKG_VERSION"));
    println!("Expression evaluator of the Z80/Z280 relocating macro assembler.");
    println!("License: 0BSD - free to use, copy, modify, and distribute.");
    println!("Provided AS IS, without warranty or liability.");
}

fn stderr_supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if let Some(force) = env::var_os("CLICOLOR_FORCE") {
        return force != "0";
    }

    if let Some(choice) = env::var_os("CLICOLOR")
        && choice == "0"
    {
        return false;
    }

    std::io::stderr().is_terminal()
}

fn render_options() -> RenderOptions {
    if stderr_supports_color() {
        RenderOptions::colored()
    } else {
        RenderOptions::plain()
    }
}

/// Turns an expression error into a report underlining `text`.
fn expr_error(text: &str, error: ExprError) -> anyhow::Error {
    anyhow::anyhow!(render_error(text, &error, render_options()))
}

/// Everything an expression is parsed and evaluated against.
struct Session {
    context: AssemblyContext,
    symbols: SymbolTable,
}

impl Session {
    fn from_args(args: &ExprArgs) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => load_config(path)?,
            None => ExprConfig::default(),
        };
        if let Some(radix) = args.radix {
            config.default_radix = radix;
        }
        if let Some(encoding) = args.encoding {
            config.encoding = encoding;
        }
        if args.escapes {
            config.escapes_enabled = true;
        }

        let mut session = Self {
            context: AssemblyContext::new(config)?,
            symbols: SymbolTable::new(),
        };
        session.symbols.set_module(args.module.as_deref());

        for name in &args.externals {
            session.symbols.declare_external(name);
        }
        if let Some(location) = &args.location {
            let address = session
                .value(location)
                .with_context(|| format!("invalid location '{location}'"))?;
            session.symbols.set_location(address);
        }
        for definition in &args.defines {
            let (name, value) = definition
                .split_once('=')
                .with_context(|| format!("invalid definition '{definition}': expected NAME=VALUE"))?;
            let address = session
                .value(value)
                .with_context(|| format!("invalid value for symbol '{name}'"))?;
            debug!(name, %address, "defined symbol");
            session.symbols.define(name.trim(), address);
        }
        Ok(session)
    }

    fn parse(&mut self, text: &str, for_defb: bool, is_byte: bool) -> anyhow::Result<Expression> {
        self.context
            .parse(text, for_defb, is_byte, &self.symbols)
            .map_err(|error| expr_error(text, error))
    }

    /// Evaluates a definition value such as `100h:code` or `4:common=BUF`.
    fn value(&mut self, text: &str) -> anyhow::Result<Address> {
        let (text, segment) = split_segment(text)?;
        let expression = self.parse(text, false, false)?;
        let address = match expression
            .evaluate(&mut self.symbols)
            .map_err(|error| expr_error(text, error))?
        {
            Evaluation::Resolved(address) => address,
            outcome => anyhow::bail!("'{text}' has no value: {}", describe_outcome(&outcome)),
        };
        Ok(match segment {
            None => address,
            Some(Segment::Absolute) => Address::absolute(address.value()),
            Some(Segment::Code) => Address::code(address.value()),
            Some(Segment::Data) => Address::data(address.value()),
            Some(Segment::Common(block)) => Address::common(block, address.value()),
        })
    }
}

enum Segment {
    Absolute,
    Code,
    Data,
    Common(String),
}

fn split_segment(text: &str) -> anyhow::Result<(&str, Option<Segment>)> {
    let Some((value, tag)) = text.rsplit_once(':') else {
        return Ok((text, None));
    };
    // A leading ':' marks a root symbol, not a segment.
    if value.trim().is_empty() {
        return Ok((text, None));
    }
    let lower = tag.trim().to_ascii_lowercase();
    let segment = match lower.as_str() {
        "absolute" | "abs" => Segment::Absolute,
        "code" => Segment::Code,
        "data" => Segment::Data,
        _ => match lower.strip_prefix("common=") {
            Some(block) if !block.is_empty() => Segment::Common(block.to_ascii_uppercase()),
            _ => anyhow::bail!(
                "unknown segment '{tag}': expected code, data, absolute or common=BLOCK"
            ),
        },
    };
    Ok((value, Some(segment)))
}

fn describe_outcome(outcome: &Evaluation) -> String {
    match outcome {
        Evaluation::Resolved(address) => format!("{address} ({})", address.value()),
        Evaluation::NotYetResolvable => "not yet resolvable".to_string(),
        Evaluation::DeferredByte => "deferred: relocatable byte expression".to_string(),
        Evaluation::ContainsExternal => "contains external references".to_string(),
    }
}

fn eval_command(args: EvalArgs) -> anyhow::Result<()> {
    let mut session = Session::from_args(&args.expr)?;
    let text = args.expr.expression.as_str();
    let expression = session.parse(text, args.expr.defb, args.expr.byte)?;

    if let Some(bytes) = expression.raw_bytes() {
        let hex: Vec<String> = bytes.iter().map(|byte| format!("{byte:02X}h")).collect();
        println!("BYTES {}", hex.join(" "));
        return Ok(());
    }

    let outcome = match args.mode {
        Mode::Strict => expression.evaluate(&mut session.symbols),
        Mode::Try => expression.try_evaluate(&mut session.symbols),
        Mode::Lookahead => expression.evaluate_if_no_symbols(),
    }
    .map_err(|error| expr_error(text, error))?;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

fn postfix_command(args: ExprArgs) -> anyhow::Result<()> {
    let mut session = Session::from_args(&args)?;
    let expression = session.parse(&args.expression, args.defb, args.byte)?;
    println!("{expression}");
    Ok(())
}

fn link_command(args: ExprArgs) -> anyhow::Result<()> {
    let mut session = Session::from_args(&args)?;
    let text = args.expression.as_str();
    let expression = session.parse(text, args.defb, args.byte)?;
    if expression.raw_bytes().is_some() {
        anyhow::bail!("'{text}' is a string of more than two bytes and has no link items");
    }

    let items = expression
        .to_link_items(&mut session.symbols)
        .map_err(|error| expr_error(text, error))?;
    for item in items {
        println!("{item}");
    }
    Ok(())
}
