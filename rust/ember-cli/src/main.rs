//! Ember CLI: build core images and inspect the core environment.

mod config;

use clap::{Parser as ClapParser, Subcommand};
use ember_rt::corelib::bootstrap::ImageBootstrap;
use ember_rt::corelib::make_image;
use ember_rt::{Runtime, Value, Vm};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}
fn gray(s: &str) -> String {
    format!("\x1b[90m{}\x1b[0m", s)
}
fn status_label(label: &str) -> String {
    format!("\x1b[1;32m{:>12}\x1b[0m", label)
}

#[derive(ClapParser)]
#[command(name = "ember", version, about = "The Ember core environment")]
struct Cli {
    /// Boot from this core image instead of the configured bootstrap
    #[arg(long, global = true)]
    image: Option<PathBuf>,

    /// Config file (default: nearest ember.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the core environment from source and write its image
    Image {
        /// Output path
        #[arg(short, long, default_value = "core.image")]
        out: PathBuf,
    },
    /// Show the documentation of a binding
    Doc {
        /// Binding name
        name: String,
    },
    /// List the bindings of the core environment
    List {
        /// Only names starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Disassemble a bytecode function
    Disasm {
        /// Binding name
        name: String,
    },
    /// Evaluate an expression in the core environment
    Eval {
        /// Source text
        expr: String,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember_cli=info,ember_rt=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => config::EmberConfig::load_from(path),
        None => config::EmberConfig::load(),
    }
    .unwrap_or_else(|e| fail(&e));
    let image = cli.image.clone().or_else(|| cfg.boot.image.clone());

    match cli.command {
        Commands::Image { out } => cmd_image(&cfg, &out),
        Commands::Doc { name } => cmd_doc(&boot(&cfg, image.as_deref()), &name),
        Commands::List { prefix } => cmd_list(&boot(&cfg, image.as_deref()), prefix.as_deref()),
        Commands::Disasm { name } => cmd_disasm(&boot(&cfg, image.as_deref()), &name),
        Commands::Eval { expr } => cmd_eval(boot(&cfg, image.as_deref()), &expr),
    }
}

fn fail(msg: &str) -> ! {
    eprintln!("{} {}", red("error:"), msg);
    std::process::exit(1);
}

fn boot(cfg: &config::EmberConfig, image: Option<&Path>) -> Runtime {
    let result = match image {
        Some(path) => {
            let bytes = std::fs::read(path)
                .unwrap_or_else(|e| fail(&format!("cannot read image '{}': {}", path.display(), e)));
            tracing::info!(path = %path.display(), "booting from image");
            Runtime::with_bootstrap(cfg.runtime.clone(), &ImageBootstrap::from_bytes(bytes))
        }
        None => Runtime::new(cfg.runtime.clone()),
    };
    result.unwrap_or_else(|e| fail(&e.to_string()))
}

fn cmd_image(cfg: &config::EmberConfig, out: &Path) {
    println!("{} core image", status_label("Building"));
    let bytes = make_image(&mut Vm::new(cfg.runtime.clone())).unwrap_or_else(|e| fail(&e.to_string()));
    std::fs::write(out, &bytes)
        .unwrap_or_else(|e| fail(&format!("writing to '{}': {}", out.display(), e)));
    println!("{} {} ({} bytes)", status_label("Wrote"), out.display(), bytes.len());
}

fn cmd_doc(rt: &Runtime, name: &str) {
    let Some(binding) = rt.env().binding(name) else {
        fail(&format!("unknown symbol {}", name));
    };
    println!("{}", binding.doc.as_deref().unwrap_or("no documentation"));
    if let Some(src) = binding.source {
        println!("{}", gray(&format!("defined at {}:{}:{}", src.file, src.line, src.column)));
    }
}

fn cmd_list(rt: &Runtime, prefix: Option<&str>) {
    for name in rt.env().names() {
        if !matches!(prefix, Some(p) if !name.starts_with(p)) {
            println!("{}", name);
        }
    }
}

fn cmd_disasm(rt: &Runtime, name: &str) {
    match rt.lookup(name) {
        Some(Value::Function(f)) => {
            let def = &f.def;
            println!(
                "{} {} {}",
                status_label("Function"),
                def.name,
                gray(&format!("arity {} slots {}", def.arity.describe(), def.slot_count))
            );
            if let Some(tag) = f.intrinsic() {
                println!("{}", gray(&format!("intrinsic {}", tag.name())));
            }
            print!("{}", def.disassemble());
        }
        Some(other) => fail(&format!("{} is a {}, not a bytecode function", name, other.type_name())),
        None => fail(&format!("unknown symbol {}", name)),
    }
}

fn cmd_eval(mut rt: Runtime, expr: &str) {
    match rt.eval_str(expr) {
        Ok(v) => println!("{}", v.describe()),
        Err(e) => fail(&e.to_string()),
    }
}
