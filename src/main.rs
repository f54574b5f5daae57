use clap::Parser as _;
use clap::Subcommand;
use equation_solver::{ErrorClass, Lexer, Limits, SolveError, lex, simplify::simplify};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(clap::Parser, Debug)]
#[command(version, about = "Solve single-variable algebraic equations")]
struct Args {
    /// Log pipeline stages at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the token stream
    Tokenize { equation: String },
    /// Print the parsed tree in `lhs - rhs = 0` form
    Parse {
        equation: String,
        #[arg(long, default_value = "x")]
        var: String,
    },
    /// Print the simplified tree
    Simplify {
        equation: String,
        #[arg(long, default_value = "x")]
        var: String,
    },
    /// Solve for a variable
    Solve {
        equation: String,
        #[arg(long, default_value = "x")]
        var: String,
        #[arg(long)]
        max_degree: Option<usize>,
        #[arg(long)]
        max_len: Option<usize>,
    },
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(args.command) {
        let code = match e.class() {
            ErrorClass::InvalidInput => 65,
            ErrorClass::CouldNotSolve => 70,
        };
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(code);
    }
}

fn run(command: Commands) -> Result<(), SolveError> {
    match command {
        Commands::Tokenize { equation } => {
            let normalized = lex::normalize(&equation);
            for token in Lexer::new(None, &normalized).with_user_text(&equation) {
                println!("{}", token?);
            }
        }
        Commands::Parse { equation, var } => {
            let normalized = lex::normalize(&equation);
            let parsed = equation_solver::Parser::new(None, &normalized)
                .with_variable(&var)
                .with_user_text(&equation)
                .parse()?;
            println!("{parsed}");
            println!("equation: {}", parsed.is_equation);
        }
        Commands::Simplify { equation, var } => {
            let normalized = lex::normalize(&equation);
            let parsed = equation_solver::Parser::new(None, &normalized)
                .with_variable(&var)
                .with_user_text(&equation)
                .parse()?;
            let simplified = simplify(&parsed.expr, &Limits::default())?;
            if parsed.is_equation {
                println!("{simplified} = 0");
            } else {
                println!("{simplified}");
            }
        }
        Commands::Solve {
            equation,
            var,
            max_degree,
            max_len,
        } => {
            let mut limits = Limits::default();
            if let Some(max_degree) = max_degree {
                limits.max_degree = max_degree;
            }
            if let Some(max_len) = max_len {
                limits.max_input_len = max_len;
            }
            println!("{}", equation_solver::solve_with(&equation, &var, &limits)?);
        }
    }
    Ok(())
}
